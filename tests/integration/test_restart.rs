//! Saving, restarting and reloading a knowledge base.

use crate::common::{help_center, test_settings};
use kbsearch::{Encoder, KnowledgeBase, QueryOptions, TfIdfVectorizer};
use std::time::Duration;
use tempfile::TempDir;

const QUERIES: &[&str] = &[
    "download invoice",
    "reset password",
    "advanced search",
    "delete account",
];

fn top_three(kb: &KnowledgeBase, query: &str) -> Vec<(String, f32)> {
    kb.search(query, &QueryOptions::default().with_max_results(3))
        .unwrap()
        .into_iter()
        .map(|p| (p.id, p.similarity))
        .collect()
}

#[test]
fn save_restart_load_reproduces_results() {
    let dir = TempDir::new().unwrap();

    let (count, expected) = {
        let kb = KnowledgeBase::build(&help_center(), test_settings(&dir)).unwrap();
        kb.save().unwrap();
        let expected: Vec<_> = QUERIES.iter().map(|q| top_three(&kb, q)).collect();
        (kb.stats().count, expected)
    };

    let settings = test_settings(&dir);
    assert!(settings.model_path().exists());
    assert!(settings.store_config().persistence_path.unwrap().exists());

    let reopened = KnowledgeBase::open(settings).unwrap();
    assert_eq!(reopened.stats().count, count);
    assert!(!reopened.stats().dirty);
    for (query, expected) in QUERIES.iter().zip(expected) {
        assert_eq!(top_three(&reopened, query), expected, "query '{query}'");
    }
}

#[test]
fn dropping_the_store_flushes_pending_autosave() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir);
    settings.store.auto_save = true;
    // Long enough that only the shutdown flush can write
    settings.store.save_delay_ms = 60_000;

    {
        let kb = KnowledgeBase::build(&help_center(), settings.clone()).unwrap();
        kb.encoder().save(&settings.model_path()).unwrap();
        assert!(kb.stats().dirty);
    }

    let reopened = KnowledgeBase::open(settings).unwrap();
    assert_eq!(reopened.stats().count, help_center().len());
}

#[test]
fn autosave_writes_after_quiet_period() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir);
    settings.store.auto_save = true;
    settings.store.save_delay_ms = 20;

    let kb = KnowledgeBase::build(&help_center(), settings.clone()).unwrap();
    let snapshot = settings.store_config().persistence_path.unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while kb.stats().dirty && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!kb.stats().dirty);
    assert!(snapshot.exists());
}

#[test]
fn reloaded_model_embeds_identically() {
    let dir = TempDir::new().unwrap();
    let kb = KnowledgeBase::build(&help_center(), test_settings(&dir)).unwrap();
    kb.save().unwrap();

    let model = TfIdfVectorizer::load(&kb.settings().model_path()).unwrap();
    assert_eq!(model.vocabulary(), kb.encoder().vocabulary());
    for query in QUERIES {
        assert_eq!(model.embed(query), kb.encoder().embed(query));
    }
}
