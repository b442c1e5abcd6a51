//! End-to-end retrieval over the help-center corpus.

use crate::common::{document, help_center, test_settings};
use kbsearch::semantic::thresholds;
use kbsearch::{KnowledgeBase, KnowledgeBaseError, QueryOptions};
use tempfile::TempDir;

fn build(dir: &TempDir) -> KnowledgeBase {
    KnowledgeBase::build(&help_center(), test_settings(dir)).unwrap()
}

#[test]
fn focused_article_wins_single_term_query() {
    let dir = TempDir::new().unwrap();
    let kb = build(&dir);

    let results = kb.search("search", &QueryOptions::default()).unwrap();
    assert_eq!(results[0].id, "search-basics");
    assert_eq!(results[0].title, "IntelliSearch vs Advanced Search");
    assert!(results.len() <= QueryOptions::default().max_results);
}

#[test]
fn category_restricts_results() {
    let dir = TempDir::new().unwrap();
    let kb = build(&dir);

    let options = QueryOptions::default()
        .with_max_results(10)
        .with_category("account");
    let results = kb.search("password reset", &options).unwrap();

    assert_eq!(results[0].id, "account-password");
    assert!(
        results
            .iter()
            .all(|p| p.category.as_deref() == Some("account"))
    );
}

#[test]
fn threshold_drops_weak_matches() {
    let dir = TempDir::new().unwrap();
    let kb = build(&dir);

    let loose = kb
        .search("billing invoice", &QueryOptions::default().with_max_results(10))
        .unwrap();
    let strict = kb
        .search(
            "billing invoice",
            &QueryOptions::default()
                .with_max_results(10)
                .with_min_similarity(thresholds::SIMILAR),
        )
        .unwrap();

    assert!(strict.len() <= loose.len());
    assert!(strict.iter().all(|p| p.similarity >= thresholds::SIMILAR));
}

#[test]
fn snippets_quote_the_matching_sentence() {
    let dir = TempDir::new().unwrap();
    let kb = build(&dir);

    let results = kb
        .search("forgot password", &QueryOptions::default())
        .unwrap();
    let top = &results[0];
    assert_eq!(top.id, "account-password");
    assert!(top.snippet.contains("forgot password"));
    assert!(top.snippet.chars().count() <= kb.settings().search.snippet_chars + 3);
}

#[test]
fn similar_passages_exclude_the_source() {
    let dir = TempDir::new().unwrap();
    let kb = build(&dir);

    let results = kb.similar("billing-refunds", 3).unwrap();
    assert!(results.len() <= 3);
    assert!(results.iter().all(|p| p.id != "billing-refunds"));
}

#[test]
fn corpus_validation() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        KnowledgeBase::build(&[], test_settings(&dir)),
        Err(KnowledgeBaseError::EmptyCorpus)
    ));

    let docs = vec![
        document("same", "One", "first", "x"),
        document("same", "Two", "second", "x"),
    ];
    match KnowledgeBase::build(&docs, test_settings(&dir)) {
        Err(KnowledgeBaseError::DuplicateDocument { id }) => assert_eq!(id, "same"),
        other => panic!("expected duplicate error, got {other:?}"),
    }
}

#[test]
fn capacity_limit_fails_the_build() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir);
    settings.store.max_vectors = 3;

    assert!(matches!(
        KnowledgeBase::build(&help_center(), settings),
        Err(KnowledgeBaseError::Store(kbsearch::StoreError::CapacityExceeded { max: 3 }))
    ));
}
