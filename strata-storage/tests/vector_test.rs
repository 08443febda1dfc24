//! Integration tests for the vector store

use uuid::Uuid;

use strata_core::storage::VectorBackend;
use strata_storage::VectorStore;

async fn open_store() -> VectorStore {
    VectorStore::open_in_memory(4).await.expect("open")
}

#[tokio::test]
async fn upsert_query_and_remove() {
    let store = open_store().await;
    let near = Uuid::new_v4();
    let far = Uuid::new_v4();

    store
        .upsert(near, &[1.0, 0.0, 0.0, 0.0], "f1")
        .await
        .expect("upsert");
    store
        .upsert(far, &[0.0, 1.0, 0.0, 0.0], "f2")
        .await
        .expect("upsert");

    let hits = store
        .query_by_vector(&[0.9, 0.1, 0.0, 0.0], 10)
        .await
        .expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, near);
    assert!(hits[0].score > hits[1].score);
    assert!(hits[0].score > 0.0);

    store.remove(&[near]).await.expect("remove");
    assert_eq!(store.count().await.expect("count"), 1);
    let ids = store.ids().await.expect("ids");
    assert_eq!(ids, vec![far]);
}

#[tokio::test]
async fn upsert_replaces_in_place() {
    let store = open_store().await;
    let chunk_id = Uuid::new_v4();

    store
        .upsert(chunk_id, &[1.0, 0.0, 0.0, 0.0], "f1")
        .await
        .expect("upsert");
    store
        .upsert(chunk_id, &[0.0, 0.0, 0.0, 1.0], "f1")
        .await
        .expect("upsert");

    assert_eq!(store.count().await.expect("count"), 1);
    let hits = store
        .query_by_vector(&[0.0, 0.0, 0.0, 1.0], 1)
        .await
        .expect("query");
    assert_eq!(hits[0].chunk_id, chunk_id);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn dimension_mismatch_is_a_programmer_error() {
    let store = open_store().await;
    let result = store.upsert(Uuid::new_v4(), &[1.0, 2.0], "f1").await;
    assert!(matches!(
        result,
        Err(strata_core::error::Error::Programmer(_))
    ));
}

#[tokio::test]
async fn query_on_empty_store_returns_nothing() {
    let store = open_store().await;
    let hits = store
        .query_by_vector(&[1.0, 0.0, 0.0, 0.0], 5)
        .await
        .expect("query");
    assert!(hits.is_empty());
}
