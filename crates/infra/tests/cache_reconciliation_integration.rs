//! Integration tests for reconciling server responses into the SQLite cache
//!
//! **Coverage:**
//! - Stale rows are deleted, new rows inserted, existing rows overwritten
//! - Scopes: per-account goals and unread messages leave other rows alone
//! - Repeating a refresh changes nothing
//! - Undecodable messages are skipped without failing the page
//! - Single-record updates and background refresh completions
//!
//! **Infrastructure:**
//! - Real SQLite database (tempdir)
//! - WireMock HTTP server for the resource endpoints

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use finsync_domain::{CacheEvent, GoalStatus, GoalUpdate, MessageContent};
use finsync_infra::MessageFilter;
use parking_lot::Mutex;
use serde_json::json;
use support::*;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Validates the core reconciliation rule on a real database.
///
/// Assertions:
/// - Cache {1,2,3,4} reconciled with server {1,3,5} becomes {1,3,5}
/// - The report counts one insert, two updates and deletes 2 and 4
#[tokio::test]
async fn stale_records_are_removed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ok_json(json!([account(1), account(2), account(3), account(4)])))
        .mount(&server)
        .await;
    let first = test.session.accounts().refresh_accounts().await.unwrap();
    assert_eq!(first.inserted, 4);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ok_json(json!([account(1), account(3), account(5)])))
        .mount(&server)
        .await;
    let report = test.session.accounts().refresh_accounts().await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 2);
    assert_eq!(report.deleted_ids, vec![2, 4]);

    let ids: Vec<i64> =
        test.session.accounts().fetch_accounts().await.unwrap().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 3, 5]);
}

/// Validates that an empty response clears the scope and that repeating a
/// refresh is a no-op.
#[tokio::test]
async fn repeated_and_empty_refreshes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ok_json(json!([account(1), account(2)])))
        .mount(&server)
        .await;
    test.session.accounts().refresh_accounts().await.unwrap();
    let again = test.session.accounts().refresh_accounts().await.unwrap();
    assert!(again.is_noop());
    assert_eq!(again.updated, 2);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ok_json(json!([])))
        .mount(&server)
        .await;
    let emptied = test.session.accounts().refresh_accounts().await.unwrap();
    assert_eq!(emptied.deleted_ids, vec![1, 2]);
    assert!(test.session.accounts().fetch_accounts().await.unwrap().is_empty());
}

/// Validates that refreshing one account's goals never touches another
/// account's goals.
#[tokio::test]
async fn goal_refresh_is_scoped_per_account() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    Mock::given(method("GET"))
        .and(path("/goals"))
        .and(query_param("account_id", "7"))
        .respond_with(ok_json(json!([goal(1, 7), goal(2, 7)])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/goals"))
        .and(query_param("account_id", "8"))
        .respond_with(ok_json(json!([goal(3, 8)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/goals"))
        .and(query_param("account_id", "7"))
        .respond_with(ok_json(json!([])))
        .mount(&server)
        .await;

    test.session.goals().refresh_goals(Some(7)).await.unwrap();
    test.session.goals().refresh_goals(Some(8)).await.unwrap();
    let report = test.session.goals().refresh_goals(Some(7)).await.unwrap();

    assert_eq!(report.deleted_ids, vec![1, 2]);
    assert!(test.session.goals().fetch_goals(Some(7)).await.unwrap().is_empty());
    let remaining = test.session.goals().fetch_goals(None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].account_id, 8);
}

/// Validates the unread scope and tolerance for unknown content types.
///
/// Assertions:
/// - An unread refresh only deletes unread messages the server dropped
/// - Read messages survive an unread refresh
/// - A message with an unknown content type is skipped, not fatal
#[tokio::test]
async fn unread_refresh_skips_undecodable_messages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    Mock::given(method("GET"))
        .and(path("/messages"))
        .and(query_param("status", "unread"))
        .respond_with(ok_json(json!([
            text_message(1, false),
            {"id": 9, "title": "Hologram", "content_type": "hologram", "content": {}},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/messages"))
        .respond_with(ok_json(json!([
            text_message(1, false),
            text_message(2, true),
            text_message(3, false),
        ])))
        .mount(&server)
        .await;

    let messages = test.session.messages();
    messages.refresh_messages(MessageFilter::All).await.unwrap();
    assert_eq!(messages.unread_count().await.unwrap(), 2);

    let report = messages.refresh_messages(MessageFilter::Unread).await.unwrap();
    assert_eq!(report.deleted_ids, vec![3]);
    assert_eq!(report.inserted, 0);

    let all: Vec<i64> =
        messages.fetch_messages(MessageFilter::All).await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(all, vec![1, 2]);
    let unread = messages.fetch_messages(MessageFilter::Unread).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].content, MessageContent::Text { body: "hello".into() });
}

/// Validates that marking a message read moves it between scopes and
/// publishes an update event.
#[tokio::test]
async fn mark_read_updates_cache_and_notifies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    Mock::given(method("GET"))
        .and(path("/messages"))
        .respond_with(ok_json(json!([text_message(4, false)])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/messages/4"))
        .and(body_json(json!({"read": true})))
        .respond_with(ok_json(text_message(4, true)))
        .expect(1)
        .mount(&server)
        .await;

    let messages = test.session.messages();
    messages.refresh_messages(MessageFilter::All).await.unwrap();
    let mut events = test.session.subscribe_cache();

    let updated = messages.mark_read(4, true).await.unwrap();
    assert!(updated.read);
    assert_eq!(messages.unread_count().await.unwrap(), 0);
    assert_eq!(
        events.recv().await.unwrap(),
        CacheEvent::Updated { entity: "message".into(), id: 4 }
    );
}

#[tokio::test]
async fn goal_update_sends_only_changed_fields() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    let mut completed = goal(5, 7);
    completed["status"] = json!("completed");
    Mock::given(method("PUT"))
        .and(path("/goals/5"))
        .and(body_json(json!({"status": "completed"})))
        .respond_with(ok_json(completed))
        .expect(1)
        .mount(&server)
        .await;

    let update = GoalUpdate { status: Some(GoalStatus::Completed), ..GoalUpdate::default() };
    let goal = test.session.goals().update_goal(5, &update).await.unwrap();

    assert_eq!(goal.status, GoalStatus::Completed);
    assert_eq!(test.session.goals().fetch_goals(Some(7)).await.unwrap(), vec![goal]);
}

/// Validates that a background refresh delivers its outcome through the
/// callback queue, not on the worker task.
#[tokio::test(flavor = "multi_thread")]
async fn background_refresh_completes_through_callback_queue() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let test = sqlite_session(&server, dir.path(), Some(credential("access", "refresh", 3600)));

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ok_json(json!([account(1), account(2)])))
        .mount(&server)
        .await;

    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    let handle = test.session.accounts().refresh_accounts_with(Box::new(move |result| {
        *sink.lock() = Some(result.map(|report| report.inserted));
    }));
    handle.await.unwrap();

    assert!(outcome.lock().is_none(), "completion must wait for the callback queue");
    let delivered = tokio::time::timeout(Duration::from_secs(1), test.session.callbacks().drain_next())
        .await
        .unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(*outcome.lock(), Some(Ok(2)));
}
