//! Unit tests for the key-value backends and the user-link repository.

use std::sync::Arc;

use excels_autobot::models::user_link::{EmployeeIdentity, LastMessage, UserLink};
use excels_autobot::persistence::db;
use excels_autobot::persistence::kv::{KvStore, MemoryKvStore, SqliteKvStore};
use excels_autobot::persistence::user_links::{UserLinks, ANNOUNCEMENT_KEY};

async fn sqlite_store() -> SqliteKvStore {
    let pool = db::connect("sqlite::memory:").await.expect("db connect");
    SqliteKvStore::new(pool)
}

async fn exercise_backend(kv: &dyn KvStore) {
    assert_eq!(kv.get("U1").await.expect("get"), None);

    kv.put("U1", "first".into()).await.expect("put");
    assert_eq!(kv.get("U1").await.expect("get").as_deref(), Some("first"));

    kv.put("U1", "second".into()).await.expect("overwrite");
    assert_eq!(kv.get("U1").await.expect("get").as_deref(), Some("second"));

    kv.delete("U1").await.expect("delete");
    assert_eq!(kv.get("U1").await.expect("get"), None);

    kv.delete("never-set").await.expect("deleting a missing key is fine");
}

#[tokio::test]
async fn memory_backend_get_put_delete() {
    exercise_backend(&MemoryKvStore::new()).await;
}

#[tokio::test]
async fn sqlite_backend_get_put_delete() {
    exercise_backend(&sqlite_store().await).await;
}

fn identity() -> EmployeeIdentity {
    EmployeeIdentity {
        employee_id: "usrA".into(),
        employee_display_name: "Ana".into(),
    }
}

#[tokio::test]
async fn links_round_trip_with_last_message() {
    let links = UserLinks::new(Arc::new(sqlite_store().await));
    let mut link = UserLink::new(identity());
    link.last_message = Some(LastMessage {
        ts: "1760000000.000100".into(),
        channel: "D1".into(),
    });

    links.put("U1", &link).await.expect("put");
    assert_eq!(links.get("U1").await.expect("get"), Some(link));
}

#[tokio::test]
async fn require_fails_with_missing_identity() {
    let links = UserLinks::new(Arc::new(MemoryKvStore::new()));
    let err = links.require("U404").await.expect_err("unlinked");
    assert_eq!(err.kind(), "MissingIdentity");
}

#[tokio::test]
async fn delete_removes_the_link() {
    let links = UserLinks::new(Arc::new(MemoryKvStore::new()));
    links.put("U1", &UserLink::new(identity())).await.expect("put");
    links.delete("U1").await.expect("delete");
    assert_eq!(links.get("U1").await.expect("get"), None);
}

#[tokio::test]
async fn stored_links_use_the_camel_case_layout() {
    let kv = Arc::new(MemoryKvStore::new());
    kv.put(
        "U1",
        r#"{"employeeId":"usrB","employeeDisplayName":"Bea","lastMessage":{"ts":"1.0","channel":"D2"}}"#
            .into(),
    )
    .await
    .expect("put raw");

    let link = UserLinks::new(kv)
        .get("U1")
        .await
        .expect("get")
        .expect("link present");
    assert_eq!(link.identity.employee_display_name, "Bea");
    assert_eq!(link.last_message.map(|m| m.channel).as_deref(), Some("D2"));
}

#[tokio::test]
async fn unreadable_link_is_a_kv_error() {
    let kv = Arc::new(MemoryKvStore::new());
    kv.put("U1", "not json".into()).await.expect("put raw");

    let err = UserLinks::new(kv).get("U1").await.expect_err("unreadable");
    assert_eq!(err.kind(), "KvError");
}

#[tokio::test]
async fn blank_announcement_is_treated_as_absent() {
    let kv = Arc::new(MemoryKvStore::new());
    let links = UserLinks::new(Arc::clone(&kv) as Arc<dyn KvStore>);
    assert_eq!(links.announcement().await.expect("read"), None);

    kv.put(ANNOUNCEMENT_KEY, "   ".into()).await.expect("put");
    assert_eq!(links.announcement().await.expect("read"), None);

    kv.put(ANNOUNCEMENT_KEY, "Demo on Friday".into())
        .await
        .expect("put");
    assert_eq!(
        links.announcement().await.expect("read").as_deref(),
        Some("Demo on Friday")
    );
}
