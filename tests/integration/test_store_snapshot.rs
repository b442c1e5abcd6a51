//! Store behavior with real TF-IDF vectors, including a JSON snapshot trip.

use crate::common::help_center;
use kbsearch::semantic::TfIdfVectorizer;
use kbsearch::vector::magnitude;
use kbsearch::{Encoder, RecordMetadata, SearchOptions, Snapshot, StoreConfig, VectorStore};

const DIMENSION: usize = 64;

fn indexed_store() -> (TfIdfVectorizer, VectorStore) {
    let docs = help_center();
    let texts: Vec<String> = docs.iter().map(|d| d.embedding_text()).collect();
    let encoder = TfIdfVectorizer::fit(&texts, DIMENSION);

    let store = VectorStore::new(StoreConfig::in_memory(DIMENSION)).unwrap();
    for (doc, text) in docs.iter().zip(&texts) {
        let keywords = encoder.keywords(text);
        store
            .add(
                doc.id.clone(),
                encoder.embed(text),
                RecordMetadata::from_document(doc, keywords),
            )
            .unwrap();
    }
    (encoder, store)
}

#[test]
fn stored_vectors_are_unit_or_zero() {
    let (_, store) = indexed_store();
    for id in store.ids() {
        let record = store.get(&id).unwrap();
        let norm = magnitude(&record.vector);
        assert!(
            norm == 0.0 || (norm - 1.0).abs() < 1e-5,
            "{id} has norm {norm}"
        );
    }
}

#[test]
fn search_results_are_bounded_and_sorted() {
    let (encoder, store) = indexed_store();
    for query in ["invoice pdf", "password reset", "search filters", "account billing"] {
        let vector = encoder.embed(query);
        for k in [1, 3, 20] {
            let hits = store.search(&vector, &SearchOptions::new(k)).unwrap();
            assert!(hits.len() <= k);
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
        }
    }
}

#[test]
fn category_lookup_is_exact() {
    let (_, store) = indexed_store();
    let billing = store.get_by_category("billing");
    let ids: Vec<_> = billing.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["billing-invoices", "billing-payment", "billing-refunds"]
    );
    assert!(
        billing
            .iter()
            .all(|r| r.metadata.category.as_deref() == Some("billing"))
    );
    assert!(store.get_by_category("unknown").is_empty());
}

#[test]
fn category_filter_only_returns_that_category() {
    let (encoder, store) = indexed_store();
    let query = encoder.embed("download invoice for my account");

    let hits = store
        .search(&query, &SearchOptions::new(10).with_category("account"))
        .unwrap();
    assert!(!hits.is_empty());
    assert!(
        hits.iter()
            .all(|h| h.metadata.category.as_deref() == Some("account"))
    );
}

#[test]
fn json_snapshot_round_trip_preserves_rankings() {
    let (encoder, store) = indexed_store();
    let json = serde_json::to_string(&store.export(true)).unwrap();

    let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
    let restored = VectorStore::new(StoreConfig::in_memory(DIMENSION)).unwrap();
    let report = restored.import(snapshot).unwrap();
    assert_eq!(report.imported, store.len());
    assert_eq!(restored.categories(), store.categories());
    assert_eq!(restored.keywords(), store.keywords());

    for query in ["refund invoice", "reset password", "advanced search"] {
        let vector = encoder.embed(query);
        let options = SearchOptions::new(5);
        assert_eq!(
            restored.search(&vector, &options).unwrap(),
            store.search(&vector, &options).unwrap(),
            "rankings differ for '{query}'"
        );
    }
}

#[test]
fn deleted_records_leave_no_index_entries() {
    let (_, store) = indexed_store();
    let keywords = store.get("search-filters").unwrap().metadata.keywords;
    assert!(store.delete("search-filters"));

    assert!(
        store
            .get_by_category("search")
            .iter()
            .all(|r| r.id != "search-filters")
    );
    for keyword in keywords {
        assert!(
            store
                .get_by_keyword(&keyword)
                .iter()
                .all(|r| r.id != "search-filters")
        );
    }

    let snapshot = store.export(false);
    assert!(
        snapshot
            .category_index
            .values()
            .chain(snapshot.keyword_index.values())
            .all(|ids| !ids.iter().any(|id| id == "search-filters"))
    );
}
