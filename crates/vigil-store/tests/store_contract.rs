// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::Ordering;
use std::time::Duration;

use vigil_core::ErrorCode;
use vigil_store::{ObjectStore, FakeStore, FAKE_CONTRACT_ID};

#[tokio::test]
async fn fake_store_lists_only_the_namespace() {
    let store = FakeStore::default();
    store.insert("default", "data/a.data", vec![1; 10]).await;
    store.insert("default", "data/b.data", vec![2; 20]).await;
    store.insert("default", "database/c.data", vec![3; 30]).await;
    store.insert("other", "data/d.data", vec![4; 40]).await;

    let mut listed = store.list_objects("default", "data").await.expect("list");
    listed.sort_by(|a, b| a.key.cmp(&b.key));
    let keys: Vec<_> = listed.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["data/a.data", "data/b.data"]);
}

#[tokio::test]
async fn deletes_become_prunable_then_reclaimable() {
    let store = FakeStore::default().with_redundancy(10, 30);
    store.insert("default", "data/a.data", vec![0; 100]).await;
    store
        .delete_object("default", "data/a.data", false)
        .await
        .expect("delete");

    let contracts = store.prunable_space().await.expect("prunable");
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].prunable, 300);

    let outcome = store
        .reclaim(FAKE_CONTRACT_ID, Duration::from_secs(1))
        .await
        .expect("reclaim");
    assert_eq!(outcome.reclaimed, 300);
    assert!(store.prunable_space().await.expect("prunable").is_empty());
}

#[tokio::test]
async fn recursive_delete_wipes_prefix_and_missing_is_not_found() {
    let store = FakeStore::default();
    store.insert("default", "data/a.data", vec![0; 1]).await;
    store.insert("default", "data/b.data", vec![0; 1]).await;
    store
        .delete_object("default", "data", true)
        .await
        .expect("recursive delete");
    assert_eq!(store.object_count().await, 0);

    let err = store
        .delete_object("default", "data", true)
        .await
        .expect_err("nothing left");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn corrupt_changes_stored_bytes() {
    let store = FakeStore::default();
    store.insert("default", "data/a.data", vec![7; 4]).await;
    assert!(store.corrupt("default", "data/a.data").await);
    assert_eq!(
        store.bytes("default", "data/a.data").await,
        Some(vec![7 ^ 0xff, 7, 7, 7])
    );
    assert!(!store.corrupt("default", "data/missing.data").await);
}

#[tokio::test]
async fn unreachable_store_fails_every_call() {
    let store = FakeStore::default();
    assert_eq!(store.backend_tag(), "fake");
    store.unreachable.store(true, Ordering::Relaxed);
    let err = store.ping().await.expect_err("unreachable");
    assert_eq!(err.code, ErrorCode::StoreUnreachable);
    assert!(store.list_objects("default", "data").await.is_err());
}

#[tokio::test]
async fn put_failure_injection_counts_calls() {
    let store = FakeStore::default().with_put_failure_after(1);
    let dir = tempfile::tempdir().expect("tmp");
    let path = dir.path().join("x.data");
    tokio::fs::write(&path, b"abc").await.expect("write");

    let first = tokio::fs::File::open(&path).await.expect("open");
    assert_eq!(store.put_object("default", "data/x.data", first).await.expect("put"), 3);
    let second = tokio::fs::File::open(&path).await.expect("open");
    let err = store
        .put_object("default", "data/y.data", second)
        .await
        .expect_err("injected");
    assert_eq!(err.code, ErrorCode::Store);
    assert_eq!(store.put_calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn delete_failure_injection_rejects_later_deletes() {
    let store = FakeStore::default().with_delete_failure_after(1);
    store.insert("default", "data/a.data", vec![0; 4]).await;
    store.insert("default", "data/b.data", vec![0; 4]).await;
    store
        .delete_object("default", "data/a.data", false)
        .await
        .expect("first delete");
    let err = store
        .delete_object("default", "data/b.data", false)
        .await
        .expect_err("injected");
    assert_eq!(err.code, ErrorCode::Store);
    assert_eq!(store.object_count().await, 1);
}

#[tokio::test]
async fn extra_contracts_are_listed_and_reclaimed_individually() {
    let store = FakeStore::default()
        .with_contracts(&[("a", 10), ("z", 0), ("b", 10)])
        .with_failing_contract("b");
    let ids: Vec<_> = store
        .prunable_space()
        .await
        .expect("prunable")
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["a", "z", "b"]);

    let outcome = store.reclaim("a", Duration::from_secs(1)).await.expect("a");
    assert_eq!(outcome.reclaimed, 10);
    assert_eq!(store.contract_prunable("a").await, Some(0));
    let err = store
        .reclaim("b", Duration::from_secs(1))
        .await
        .expect_err("b fails");
    assert_eq!(err.code, ErrorCode::Store);
    assert_eq!(store.contract_prunable("b").await, Some(10));
    assert_eq!(*store.reclaim_log.lock().await, vec!["a", "b"]);
}
