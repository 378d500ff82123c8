//! Ledger behavior against a real SQLite file: idempotent upserts,
//! concurrent dedup, and completion-mark semantics.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use wikiscribe::config::{AnalysisConfig, ChatConfig, Config, DbConfig, WikiConfig};
use wikiscribe::db;
use wikiscribe::ledger::Ledger;
use wikiscribe::migrate;
use wikiscribe::models::SourceMessage;

fn test_config(dir: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: dir.path().join("ledger.sqlite"),
        },
        chat: ChatConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            chat_id: 42,
            self_id: 99,
            page_size: 100,
            queue_capacity: 8,
            poll_timeout_secs: 1,
        },
        analysis: AnalysisConfig {
            url: "http://127.0.0.1:1".to_string(),
            model: "test".to_string(),
            timeout_secs: 1,
        },
        wiki: WikiConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            username: "bot".to_string(),
            timeout_secs: 1,
            edit_summary: "bot update".to_string(),
        },
    }
}

async fn open_ledger(dir: &TempDir) -> Ledger {
    let config = test_config(dir);
    migrate::run_migrations(&config).await.unwrap();
    Ledger::new(db::connect(&config).await.unwrap())
}

fn msg(id: i64, text: &str) -> SourceMessage {
    SourceMessage {
        id,
        chat_id: 42,
        author_id: 7,
        text: text.to_string(),
        date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn upsert_twice_returns_the_same_record() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let first = ledger.upsert_if_absent(&msg(1, "hello")).await.unwrap();
    let second = ledger
        .upsert_if_absent(&msg(1, "different text, same id"))
        .await
        .unwrap();

    assert_eq!(first.message_id, second.message_id);
    assert_eq!(first.created_at, second.created_at);
    // The second call did not overwrite the stored text.
    assert_eq!(second.text, "hello");
    assert!(!second.processed);

    let counts = ledger.counts().await.unwrap();
    assert_eq!(counts.total, 1);
}

#[tokio::test]
async fn concurrent_upserts_create_exactly_one_record() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.upsert_if_absent(&msg(77, "race")).await.unwrap()
        }));
    }

    for handle in handles {
        let record = handle.await.unwrap();
        assert_eq!(record.message_id, 77);
        assert!(!record.processed);
    }

    let counts = ledger.counts().await.unwrap();
    assert_eq!(counts.total, 1);
}

#[tokio::test]
async fn mark_processed_sets_page_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.upsert_if_absent(&msg(5, "text")).await.unwrap();
    assert!(!ledger.is_processed(5).await.unwrap());

    assert!(ledger.mark_processed(5, "Some_Page").await.unwrap());
    assert!(ledger.is_processed(5).await.unwrap());

    let record = ledger.get(5).await.unwrap().unwrap();
    assert!(record.processed);
    assert_eq!(record.wiki_page.as_deref(), Some("Some_Page"));

    // Same title again: still true, still processed.
    assert!(ledger.mark_processed(5, "Some_Page").await.unwrap());

    // Different title: refused, record untouched.
    assert!(!ledger.mark_processed(5, "Another_Page").await.unwrap());
    let record = ledger.get(5).await.unwrap().unwrap();
    assert_eq!(record.wiki_page.as_deref(), Some("Some_Page"));
}

#[tokio::test]
async fn mark_processed_on_missing_record_is_refused() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    assert!(!ledger.mark_processed(404, "Nope").await.unwrap());
}

#[tokio::test]
async fn processed_ids_only_lists_published_messages() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    for id in 1..=4 {
        ledger.upsert_if_absent(&msg(id, "t")).await.unwrap();
    }
    ledger.mark_processed(2, "P2").await.unwrap();
    ledger.mark_processed(4, "P4").await.unwrap();

    let ids = ledger.processed_ids().await.unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&2) && ids.contains(&4));

    let counts = ledger.counts().await.unwrap();
    assert_eq!(counts.total, 4);
    assert_eq!(counts.published, 2);
    assert_eq!(counts.pending, 2);
}

#[tokio::test]
async fn analysis_blob_is_stored_for_audit() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.upsert_if_absent(&msg(9, "text")).await.unwrap();
    ledger
        .record_analysis(9, &serde_json::json!({"title": "T", "tags": ["a"]}))
        .await
        .unwrap();

    let record = ledger.get(9).await.unwrap().unwrap();
    let blob: serde_json::Value =
        serde_json::from_str(record.analysis_json.as_deref().unwrap()).unwrap();
    assert_eq!(blob["title"], "T");
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    migrate::run_migrations(&config).await.unwrap();
    migrate::run_migrations(&config).await.unwrap();

    let ledger = Ledger::new(db::connect(&config).await.unwrap());
    assert_eq!(ledger.counts().await.unwrap().total, 0);
}
