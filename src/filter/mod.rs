//! Per-batch result reduction.
//!
//! Each search batch is narrowed to the publication types the harvest cares
//! about, collapsed so that every distinct title is represented by a single
//! document, and ranked. Free-text title searches keep only their best match.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::models::{PubClass, RawDocument, SearchMode};
use crate::query::score_relevance;

/// Publication types that survive filtering.
pub const ALLOWED_TYPES: [PubClass; 4] = [
    PubClass::Article,
    PubClass::Preprint,
    PubClass::Book,
    PubClass::Chapter,
];

fn is_allowed(doc: &RawDocument) -> bool {
    doc.pub_class().is_some_and(|class| ALLOWED_TYPES.contains(&class))
}

fn by_score_desc(a: &RawDocument, b: &RawDocument) -> Ordering {
    b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal)
}

// First element with the maximum API score.
fn max_by_score(docs: impl IntoIterator<Item = RawDocument>) -> Option<RawDocument> {
    docs.into_iter().fold(None, |best, doc| match best {
        Some(current) if current.score() >= doc.score() => Some(current),
        _ => Some(doc),
    })
}

/// Group documents by title key, preserving first-appearance order.
///
/// Documents whose cleaned title is empty are dropped.
pub fn group_by_title(documents: Vec<RawDocument>) -> Vec<(String, Vec<RawDocument>)> {
    let mut groups: Vec<(String, Vec<RawDocument>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in documents {
        let key = doc.title_key();
        if key.is_empty() {
            debug!("Dropping document without a usable title: {:?}", doc.id());
            continue;
        }
        match index.get(&key) {
            Some(&slot) => groups[slot].1.push(doc),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![doc]));
            }
        }
    }

    groups
}

/// Pick one representative from documents sharing a title.
///
/// The first non-empty type bucket in [`PubClass::PRIORITY`] order supplies
/// the candidates and the highest API score among them wins; ties keep the
/// earlier document. A group with no recognised type falls back to the
/// highest score overall. Returns `None` only for an empty group.
pub fn resolve(group: Vec<RawDocument>) -> Option<RawDocument> {
    if group.len() <= 1 {
        return group.into_iter().next();
    }

    let mut buckets: HashMap<PubClass, Vec<RawDocument>> = HashMap::new();
    let mut unclassified = Vec::new();
    for doc in group {
        match doc.pub_class() {
            Some(class) => buckets.entry(class).or_default().push(doc),
            None => unclassified.push(doc),
        }
    }

    for class in PubClass::PRIORITY {
        if let Some(bucket) = buckets.remove(&class) {
            return max_by_score(bucket);
        }
    }

    max_by_score(unclassified)
}

/// Group documents by title and resolve every group.
pub fn resolve_all(documents: Vec<RawDocument>) -> Vec<RawDocument> {
    group_by_title(documents)
        .into_iter()
        .filter_map(|(_, group)| resolve(group))
        .collect()
}

/// Reduce one search batch.
///
/// 1. Drops documents whose `pub_class_id` is not in [`ALLOWED_TYPES`]
/// 2. Collapses same-title documents to one representative
/// 3. Keyword mode: sorts by API score, highest first, and keeps everything
/// 4. Text-query mode: scores each representative against the query, sorts by
///    combined relevance then API score, and keeps only the best one
pub fn filter_batch(documents: Vec<RawDocument>, mode: &SearchMode) -> Vec<RawDocument> {
    let input = documents.len();
    let allowed: Vec<RawDocument> = documents.into_iter().filter(is_allowed).collect();
    let typed = allowed.len();

    let mut representatives = resolve_all(allowed);
    debug!(
        "Batch reduced: {} input, {} allowed types, {} distinct titles",
        input,
        typed,
        representatives.len()
    );

    match mode {
        SearchMode::Keyword => {
            representatives.sort_by(by_score_desc);
            representatives
        }
        SearchMode::TextQuery(query) => {
            for doc in representatives.iter_mut() {
                doc.relevance = Some(score_relevance(doc, query));
            }
            representatives.sort_by(|a, b| {
                b.combined_score()
                    .partial_cmp(&a.combined_score())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| by_score_desc(a, b))
            });
            representatives.truncate(1);
            representatives
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    fn doc(id: Value, title: &str, class: &str, score: f64) -> RawDocument {
        RawDocument::from_value(json!({
            "id": id,
            "title": title,
            "pub_class_id": class,
            "score": score
        }))
    }

    fn ids(docs: &[RawDocument]) -> Vec<String> {
        docs.iter().filter_map(RawDocument::id).collect()
    }

    #[test]
    fn test_article_priority_beats_higher_score() {
        let docs = vec![
            doc(json!(1), "Foo Bar Study", "article", 5.0),
            doc(json!(2), "foo bar study", "preprint", 9.0),
        ];
        let out = filter_batch(docs, &SearchMode::Keyword);
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn test_resolve_priority_order() {
        let group = vec![
            doc(json!("p"), "T", "preprint", 50.0),
            doc(json!("c"), "T", "chapter", 20.0),
            doc(json!("b1"), "T", "book", 1.0),
            doc(json!("b2"), "T", "book", 3.0),
        ];
        assert_eq!(resolve(group).and_then(|d| d.id()).as_deref(), Some("b2"));

        let group = vec![
            doc(json!("p"), "T", "preprint", 50.0),
            doc(json!("c"), "T", "chapter", 20.0),
        ];
        assert_eq!(resolve(group).and_then(|d| d.id()).as_deref(), Some("c"));
    }

    #[test]
    fn test_resolve_single_and_empty() {
        let single = vec![doc(json!("only"), "T", "dataset", 0.0)];
        assert_eq!(resolve(single).and_then(|d| d.id()).as_deref(), Some("only"));
        assert!(resolve(Vec::new()).is_none());
    }

    #[test]
    fn test_resolve_unknown_types_fall_back_to_score() {
        let group = vec![
            doc(json!("x"), "T", "dataset", 2.0),
            doc(json!("y"), "T", "grant", 7.0),
            doc(json!("z"), "T", "patent", 7.0),
        ];
        assert_eq!(resolve(group).and_then(|d| d.id()).as_deref(), Some("y"));
    }

    #[test]
    fn test_resolve_tie_keeps_first() {
        let group = vec![
            doc(json!("first"), "T", "article", 4.0),
            doc(json!("second"), "T", "article", 4.0),
        ];
        assert_eq!(resolve(group).and_then(|d| d.id()).as_deref(), Some("first"));
    }

    #[test]
    fn test_disallowed_types_are_discarded() {
        let docs = vec![
            doc(json!("a"), "Alpha", "article", 1.0),
            doc(json!("d"), "Delta", "dataset", 9.0),
            doc(json!("g"), "Gamma", "proceeding", 9.0),
            RawDocument::from_value(json!({"id": "n", "title": "No type", "score": 9.0})),
        ];
        let out = filter_batch(docs, &SearchMode::Keyword);
        assert_eq!(ids(&out), vec!["a"]);
        for d in &out {
            assert!(ALLOWED_TYPES.contains(&d.pub_class().unwrap()));
        }
    }

    #[test]
    fn test_grouping_counts_distinct_titles() {
        let docs = vec![
            doc(json!(1), "Alpha", "article", 1.0),
            doc(json!(2), " alpha ", "book", 2.0),
            doc(json!(3), "<b>ALPHA</b>", "chapter", 3.0),
            doc(json!(4), "Beta", "preprint", 1.0),
            doc(json!(5), "", "article", 1.0),
            doc(json!(6), "<i></i>", "article", 1.0),
        ];
        let input_len = docs.len();
        let resolved = resolve_all(docs.clone());
        assert!(resolved.len() <= input_len);

        let distinct: HashSet<String> = docs
            .iter()
            .map(RawDocument::title_key)
            .filter(|k| !k.is_empty())
            .collect();
        assert_eq!(resolved.len(), distinct.len());
        assert_eq!(ids(&resolved), vec!["1", "4"]);
    }

    #[test]
    fn test_group_order_is_first_appearance() {
        let docs = vec![
            doc(json!("b"), "Beta", "article", 1.0),
            doc(json!("a"), "Alpha", "article", 1.0),
            doc(json!("b2"), "beta", "article", 5.0),
        ];
        let groups = group_by_title(docs);
        let keys: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["beta", "alpha"]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_keyword_mode_sorts_by_api_score() {
        let docs = vec![
            doc(json!("low"), "Low", "article", 1.0),
            doc(json!("high"), "High", "preprint", 8.0),
            doc(json!("mid"), "Mid", "book", 4.0),
        ];
        let out = filter_batch(docs, &SearchMode::Keyword);
        assert_eq!(ids(&out), vec!["high", "mid", "low"]);
        assert!(out.iter().all(|d| d.relevance.is_none()));
    }

    #[test]
    fn test_text_query_keeps_best_match_only() {
        let docs = vec![
            doc(json!("weak"), "Climate of Opinion", "article", 30.0),
            doc(json!("best"), "Regional Climate Models for Africa", "article", 5.0),
            doc(json!("other"), "Ocean Models", "preprint", 12.0),
        ];
        let mode = SearchMode::TextQuery("\"Regional Climate Models\"".to_string());
        let out = filter_batch(docs, &mode);
        assert_eq!(ids(&out), vec!["best"]);
        let relevance = out[0].relevance.expect("breakdown attached");
        assert!(relevance.combined_score > 10.0);
    }

    #[test]
    fn test_text_query_ties_broken_by_api_score() {
        let docs = vec![
            doc(json!("a"), "Unrelated Alpha", "article", 1.0),
            doc(json!("b"), "Unrelated Beta", "article", 6.0),
        ];
        let mode = SearchMode::TextQuery("the of".to_string());
        let out = filter_batch(docs, &mode);
        assert_eq!(ids(&out), vec!["b"]);
        assert_eq!(out[0].combined_score(), 0.0);
    }

    #[test]
    fn test_stop_word_query_in_keyword_mode_keeps_all() {
        let docs = vec![
            doc(json!("a"), "The Of", "article", 0.0),
            doc(json!("b"), "Another", "article", 0.0),
        ];
        let out = filter_batch(docs, &SearchMode::Keyword);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_text_query_empty_batch() {
        let out = filter_batch(Vec::new(), &SearchMode::TextQuery("anything".to_string()));
        assert!(out.is_empty());
    }

    // Batches drawn from a small title pool so same-title groups are common.
    // Ids are the document's position, so every id is distinct.
    fn batch() -> impl Strategy<Value = Vec<RawDocument>> {
        prop::collection::vec(
            (
                prop::sample::select(vec![
                    "Alpha",
                    " alpha ",
                    "<b>ALPHA</b>",
                    "<span class=\"search-keyword\">Beta</span> Waves",
                    "beta waves",
                    "Gamma Rays",
                    "",
                    "<i></i>",
                ]),
                prop::sample::select(vec![
                    "article",
                    "book",
                    "chapter",
                    "preprint",
                    "proceeding",
                    "",
                ]),
                0u32..20,
            ),
            0..16,
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (title, class, score))| doc(json!(i), title, class, f64::from(score)))
                .collect()
        })
    }

    fn distinct_titles(docs: &[RawDocument]) -> HashSet<String> {
        docs.iter()
            .map(RawDocument::title_key)
            .filter(|k| !k.is_empty())
            .collect()
    }

    proptest! {
        #[test]
        fn resolve_keeps_one_per_distinct_title(docs in batch()) {
            let expected = distinct_titles(&docs);
            let resolved = resolve_all(docs.clone());

            prop_assert!(resolved.len() <= docs.len());
            prop_assert_eq!(resolved.len(), expected.len());
            let keys: HashSet<String> = resolved.iter().map(RawDocument::title_key).collect();
            prop_assert_eq!(keys, expected);
        }

        #[test]
        fn text_query_keeps_at_most_one_allowed_document(
            docs in batch(),
            query in prop::sample::select(vec!["alpha", "\"beta waves\"", "the of", "gamma rays study"]),
        ) {
            let out = filter_batch(docs, &SearchMode::TextQuery(query.to_string()));
            prop_assert!(out.len() <= 1);
            prop_assert!(out.iter().all(is_allowed));
            prop_assert!(out.iter().all(|d| d.relevance.is_some()));
        }

        #[test]
        fn keyword_mode_matches_title_dedup(docs in batch()) {
            let allowed: Vec<RawDocument> = docs.iter().filter(|d| is_allowed(d)).cloned().collect();
            let expected: HashSet<String> = resolve_all(allowed.clone()).iter().filter_map(RawDocument::id).collect();

            let out = filter_batch(docs, &SearchMode::Keyword);
            prop_assert!(out.iter().all(is_allowed));
            prop_assert_eq!(out.len(), distinct_titles(&allowed).len());
            prop_assert!(out.windows(2).all(|pair| pair[0].score() >= pair[1].score()));

            let ids: HashSet<String> = out.iter().filter_map(RawDocument::id).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
