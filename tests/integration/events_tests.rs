//! Event callbacks through `/slack/actions`.

use serde_json::json;

use excels_autobot::persistence::kv::KvStore;
use excels_autobot::persistence::user_links::ANNOUNCEMENT_KEY;

use super::test_helpers::{ana, Harness};

fn home_opened(user: &str) -> serde_json::Value {
    json!({
        "type": "event_callback",
        "event": { "type": "app_home_opened", "user": user, "tab": "home" },
    })
}

#[tokio::test]
async fn url_verification_echoes_the_challenge() {
    let harness = Harness::new();
    let response = harness
        .post_event(&json!({ "type": "url_verification", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P" }))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
    );
    assert!(harness.chat.calls().is_empty());
}

#[tokio::test]
async fn unlinked_user_sees_the_selector() {
    let harness = Harness::new();
    let response = harness.post_event(&home_opened("U7")).await;

    assert_eq!(response.status, 200);
    let views = harness.chat.home_views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0]["type"], "home");
    assert!(views[0].to_string().contains("select_employee"));
    assert!(harness.store.calls().is_empty());
}

#[tokio::test]
async fn linked_user_sees_loading_then_latest_row() {
    let harness = Harness::new();
    harness.store.insert(json!({
        "Week": 202_642,
        "Employee": { "id": "usrA", "name": "Ana" },
        "Performance": "4",
    }));
    harness.link("U1", ana()).await;

    let response = harness.post_event(&home_opened("U1")).await;

    assert_eq!(response.status, 200);
    let views = harness.chat.home_views();
    assert_eq!(views.len(), 2);
    assert!(views[0].to_string().contains("Loading data from the spreadsheet..."));
    let linked = views[1].to_string();
    assert!(linked.contains("You have a row this week with:"));
    assert!(linked.contains("*Performance*:\\n4"));
}

#[tokio::test]
async fn announcement_is_pinned_on_top() {
    let harness = Harness::new();
    harness
        .kv
        .put(ANNOUNCEMENT_KEY, "Demo on Friday".into())
        .await
        .expect("announcement");

    harness.post_event(&home_opened("U7")).await;

    let views = harness.chat.home_views();
    assert_eq!(
        views[0]["blocks"][0]["text"]["text"],
        "*Announcement*: Demo on Friday"
    );
}

#[tokio::test]
async fn linked_user_without_rows_gets_the_empty_home() {
    let harness = Harness::new();
    harness.link("U1", ana()).await;

    let response = harness.post_event(&home_opened("U1")).await;

    assert_eq!(response.status, 200);
    let views = harness.chat.home_views();
    assert!(views[1]
        .to_string()
        .contains("It looks like you don't have any rows yet."));
    assert!(harness.reporter.reports().is_empty());
}

#[tokio::test]
async fn other_events_are_reported_as_unrecognized() {
    let harness = Harness::new();
    let response = harness
        .post_event(&json!({
            "type": "event_callback",
            "event": { "type": "message", "user": "U1", "text": "hi" },
        }))
        .await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body, "UnrecognizedEvent");
    assert_eq!(harness.reporter.reports()[0].kind, "UnrecognizedEvent");
}
