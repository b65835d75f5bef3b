//! Send and scan flows against the SQLite store.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use whisper_core::{
    harness::InMemoryLedger, sqlite_store::SqliteStore, store::Store, Address, Identity,
    ScanEngine, SendFlow,
};

const PROGRAM: Address = Address::new([0x4d; 32]);

#[tokio::test]
async fn test_checkpoint_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("whisper.db");

    let ledger = Arc::new(InMemoryLedger::new());
    let alice = Identity::generate();
    let bob = Identity::generate();

    let outbox = Arc::new(SqliteStore::new_in_memory().unwrap());
    let send = SendFlow::new(ledger.clone(), outbox, PROGRAM);
    send.send(&alice, &bob.address().to_string(), "first").await.unwrap();

    {
        let store = Arc::new(SqliteStore::new(&db).unwrap());
        let report = ScanEngine::new(ledger.clone(), store, PROGRAM)
            .run_pass(&bob)
            .await
            .unwrap();
        assert_eq!(report.records.len(), 1);
    }

    send.send(&alice, &bob.address().to_string(), "second").await.unwrap();

    let store = Arc::new(SqliteStore::new(&db).unwrap());
    let report = ScanEngine::new(ledger.clone(), store.clone(), PROGRAM)
        .run_pass(&bob)
        .await
        .unwrap();
    assert_eq!(report.inspected(), 1);
    assert_eq!(report.records[0].text, "second");

    let history = store.list_messages().await.unwrap();
    let texts: Vec<_> = history.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn test_dyn_store_and_ledger() {
    let ledger = Arc::new(InMemoryLedger::new());
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new_in_memory().unwrap());
    let alice = Identity::generate();

    let flow = SendFlow::new(ledger.clone(), store.clone(), PROGRAM);
    flow.send(&alice, &alice.address().to_string(), "note to self")
        .await
        .unwrap();

    // Messages to self come back on scan as incoming copies of the same
    // transaction and are deduplicated by signature.
    let report = ScanEngine::new(ledger, store.clone(), PROGRAM)
        .run_pass(&alice)
        .await
        .unwrap();
    assert!(report.records.is_empty());
    assert_eq!(store.list_messages().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_two_identities_share_one_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("whisper.db");

    let ledger = Arc::new(InMemoryLedger::new());
    let alice = Identity::generate();
    let bob = Identity::generate();
    let friend = Identity::generate();

    let outbox = Arc::new(SqliteStore::new_in_memory().unwrap());
    let send = SendFlow::new(ledger.clone(), outbox, PROGRAM);
    send.send(&friend, &bob.address().to_string(), "for bob").await.unwrap();
    send.send(&friend, &alice.address().to_string(), "for alice").await.unwrap();

    let store = Arc::new(SqliteStore::new(&db).unwrap());
    let alice_pass = ScanEngine::new(ledger.clone(), store.clone(), PROGRAM)
        .run_pass(&alice)
        .await
        .unwrap();
    assert_eq!(alice_pass.records.len(), 1);

    // Reopen, as a second invocation with another keypair would.
    let store = Arc::new(SqliteStore::new(&db).unwrap());
    let bob_pass = ScanEngine::new(ledger, store.clone(), PROGRAM)
        .run_pass(&bob)
        .await
        .unwrap();
    assert_eq!(bob_pass.records.len(), 1);
    assert_eq!(bob_pass.records[0].text, "for bob");
    assert_eq!(
        store.load_checkpoint(&bob.address()).await.unwrap(),
        store.load_checkpoint(&alice.address()).await.unwrap()
    );
}
