//! Shared fakes and a request harness for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use slack_morphism::prelude::{SlackBlock, SlackView};

use excels_autobot::clock::FixedClock;
use excels_autobot::config::GlobalConfig;
use excels_autobot::models::record::RecordRow;
use excels_autobot::models::user_link::{EmployeeIdentity, LastMessage, UserLink};
use excels_autobot::persistence::kv::MemoryKvStore;
use excels_autobot::persistence::user_links::UserLinks;
use excels_autobot::records::store::{RecordFuture, RecordPage, RecordQuery, RecordStore};
use excels_autobot::records::RecordGateway;
use excels_autobot::routing::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use excels_autobot::routing::{WebhookRequest, WebhookResponse};
use excels_autobot::server::{AppState, WebhookServer};
use excels_autobot::slack::client::{ChatApi, ChatFuture};
use excels_autobot::telemetry::{ErrorReport, ErrorReporter, ReportFuture};
use excels_autobot::AppError;

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const DM_CHANNEL: &str = "D_TEST";

/// Saturday 2026-10-17 12:00 UTC, inside week 202642.
pub fn saturday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
        .single()
        .expect("valid instant")
}

pub fn test_config() -> GlobalConfig {
    let mut config = GlobalConfig::from_toml_str(
        r#"
environment = "test"

[slack]
verify_signatures = true

[record_store]
base_id = "appTEST"

[kv]
backend = "memory"

[telemetry]
mode = "inline"
"#,
    )
    .expect("test config");
    config.slack.signing_secret = SIGNING_SECRET.into();
    config
}

pub fn ana() -> EmployeeIdentity {
    EmployeeIdentity {
        employee_id: "usrA".into(),
        employee_display_name: "Ana".into(),
    }
}

// ---- chat ----

#[derive(Debug, Clone)]
pub enum ChatCall {
    PublishHome { user: String, view: Value },
    PostMessage { user: String, blocks: Vec<Value> },
    DeleteMessage(LastMessage),
    OpenModal { trigger_id: String, view: Value },
}

#[derive(Debug, Default)]
pub struct FakeChat {
    calls: Mutex<Vec<ChatCall>>,
    fail_deletes: bool,
}

impl FakeChat {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(String, Vec<Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::PostMessage { user, blocks } => Some((user, blocks)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<LastMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::DeleteMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn home_views(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::PublishHome { view, .. } => Some(view),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ChatCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn view_json(view: &SlackView) -> Value {
    serde_json::to_value(view).expect("serialize view")
}

impl ChatApi for FakeChat {
    fn publish_home<'a>(&'a self, user: &'a str, view: SlackView) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            self.record(ChatCall::PublishHome {
                user: user.to_owned(),
                view: view_json(&view),
            });
            Ok(())
        })
    }

    fn post_message<'a>(
        &'a self,
        user: &'a str,
        blocks: Vec<SlackBlock>,
    ) -> ChatFuture<'a, LastMessage> {
        Box::pin(async move {
            let blocks = blocks
                .iter()
                .map(|block| serde_json::to_value(block).expect("serialize block"))
                .collect();
            let mut calls = self.calls.lock().unwrap();
            calls.push(ChatCall::PostMessage {
                user: user.to_owned(),
                blocks,
            });
            Ok(LastMessage {
                ts: format!("{}.000100", saturday().timestamp() + calls.len() as i64),
                channel: DM_CHANNEL.into(),
            })
        })
    }

    fn delete_message<'a>(&'a self, message: &'a LastMessage) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            self.record(ChatCall::DeleteMessage(message.clone()));
            if self.fail_deletes {
                return Err(AppError::Slack {
                    status: Some(200),
                    message: "failed to delete message: message_not_found".into(),
                });
            }
            Ok(())
        })
    }

    fn open_modal<'a>(&'a self, trigger_id: &'a str, view: SlackView) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            self.record(ChatCall::OpenModal {
                trigger_id: trigger_id.to_owned(),
                view: view_json(&view),
            });
            Ok(())
        })
    }
}

// ---- record store ----

#[derive(Debug, Clone)]
pub enum StoreCall {
    Select(RecordQuery),
    Create(Map<String, Value>),
    Update(String, Map<String, Value>),
}

/// In-memory table understanding the handful of formulas the gateway emits.
#[derive(Debug, Default)]
pub struct FakeRecordStore {
    rows: Mutex<Vec<(String, Map<String, Value>)>>,
    names: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<StoreCall>>,
    page_size: Option<usize>,
    reject_with: Option<u16>,
}

impl FakeRecordStore {
    pub fn paged(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    /// Add a row. `fields` uses record-store column names; an `Employee`
    /// object with `id` and `name` teaches the fake that employee's name.
    pub fn insert(&self, fields: Value) -> String {
        let Value::Object(fields) = fields else {
            panic!("row fields must be an object");
        };
        if let Some(employee) = fields.get("Employee") {
            if let (Some(id), Some(name)) = (employee["id"].as_str(), employee["name"].as_str()) {
                self.names
                    .lock()
                    .unwrap()
                    .insert(id.to_owned(), name.to_owned());
            }
        }
        let mut rows = self.rows.lock().unwrap();
        let id = format!("rec{}", rows.len() + 1);
        rows.push((id.clone(), fields));
        id
    }

    /// Make `identity` known as a collaborator of the base.
    pub fn learn(&self, identity: &EmployeeIdentity) {
        self.names.lock().unwrap().insert(
            identity.employee_id.clone(),
            identity.employee_display_name.clone(),
        );
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<Map<String, Value>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Create(fields) => Some(fields),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Update(id, fields) => Some((id, fields)),
                _ => None,
            })
            .collect()
    }

    pub fn selects(&self) -> Vec<RecordQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Select(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<RecordRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|(id, fields)| to_row(id, fields))
            .collect()
    }

    fn check(&self) -> Result<(), AppError> {
        match self.reject_with {
            Some(status) => Err(AppError::upstream("record store", status, "rejected by fake")),
            None => Ok(()),
        }
    }

    fn matches(formula: &str, row: &RecordRow) -> bool {
        if let Some(week) = number_after(formula, "Week=") {
            if row.fields.week.map(|w| w.as_number()) != Some(week) {
                return false;
            }
        }
        if let Some(name) = quoted_after(formula, "Employee='") {
            if row.fields.employee.as_ref().map(|e| e.name.as_str()) != Some(name) {
                return false;
            }
        }
        true
    }
}

fn to_row(id: &str, fields: &Map<String, Value>) -> RecordRow {
    serde_json::from_value(json!({ "id": id, "fields": fields })).expect("fake row")
}

fn number_after(formula: &str, marker: &str) -> Option<i64> {
    let start = formula.find(marker)? + marker.len();
    let digits: String = formula[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn quoted_after<'a>(formula: &'a str, marker: &str) -> Option<&'a str> {
    let start = formula.find(marker)? + marker.len();
    let len = formula[start..].find('\'')?;
    Some(&formula[start..start + len])
}

impl RecordStore for FakeRecordStore {
    fn select<'a>(&'a self, query: &'a RecordQuery) -> RecordFuture<'a, RecordPage> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(StoreCall::Select(query.clone()));
            self.check()?;

            let mut rows: Vec<RecordRow> = self
                .rows()
                .into_iter()
                .filter(|row| Self::matches(&query.formula, row))
                .collect();
            if query.newest_first {
                rows.sort_by(|a, b| b.fields.week.cmp(&a.fields.week));
            }
            if let Some(max) = query.max_records {
                rows.truncate(max as usize);
            }

            let start: usize = query
                .offset
                .as_deref()
                .map_or(0, |offset| offset.parse().expect("fake offset"));
            let Some(page_size) = self.page_size else {
                return Ok(RecordPage {
                    records: rows.split_off(start.min(rows.len())),
                    offset: None,
                });
            };
            let end = (start + page_size).min(rows.len());
            Ok(RecordPage {
                records: rows[start..end].to_vec(),
                offset: (end < rows.len()).then(|| end.to_string()),
            })
        })
    }

    fn create(&self, fields: Map<String, Value>) -> RecordFuture<'_, ()> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(StoreCall::Create(fields.clone()));
            self.check()?;

            let mut stored = fields;
            if let Some(Value::Object(employee)) = stored.get_mut("Employee") {
                let id = employee.get("id").and_then(Value::as_str).map(str::to_owned);
                if let Some(name) = id.and_then(|id| self.names.lock().unwrap().get(&id).cloned())
                {
                    employee.insert("name".into(), Value::String(name));
                }
            }
            self.insert(Value::Object(stored));
            Ok(())
        })
    }

    fn update<'a>(&'a self, id: &'a str, fields: Map<String, Value>) -> RecordFuture<'a, ()> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(StoreCall::Update(id.to_owned(), fields.clone()));
            self.check()?;

            let mut rows = self.rows.lock().unwrap();
            let (_, row) = rows
                .iter_mut()
                .find(|(row_id, _)| row_id == id)
                .ok_or_else(|| AppError::upstream("record store", 404, "no such record"))?;
            row.extend(fields);
            Ok(())
        })
    }
}

// ---- telemetry ----

#[derive(Debug, Default)]
pub struct FakeReporter {
    reports: Mutex<Vec<ErrorReport>>,
}

impl FakeReporter {
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorReporter for FakeReporter {
    fn report(&self, report: ErrorReport) -> ReportFuture<'_> {
        Box::pin(async move {
            self.reports.lock().unwrap().push(report);
        })
    }
}

// ---- harness ----

pub struct Harness {
    pub state: Arc<AppState>,
    pub server: WebhookServer,
    pub chat: Arc<FakeChat>,
    pub store: Arc<FakeRecordStore>,
    pub reporter: Arc<FakeReporter>,
    pub kv: Arc<MemoryKvStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(test_config(), FakeRecordStore::default(), FakeChat::default(), saturday())
    }

    pub fn with_store(store: FakeRecordStore) -> Self {
        Self::build(test_config(), store, FakeChat::default(), saturday())
    }

    pub fn build(
        config: GlobalConfig,
        store: FakeRecordStore,
        chat: FakeChat,
        now: DateTime<Utc>,
    ) -> Self {
        let chat = Arc::new(chat);
        let store = Arc::new(store);
        let reporter = Arc::new(FakeReporter::default());
        let clock = Arc::new(FixedClock(now));
        let kv = Arc::new(MemoryKvStore::new());

        let state = Arc::new(AppState {
            config: Arc::new(config),
            links: UserLinks::new(Arc::clone(&kv) as _),
            records: RecordGateway::new(Arc::clone(&store) as _, Arc::clone(&clock) as _),
            chat: Arc::clone(&chat) as _,
            clock,
            reporter: Arc::clone(&reporter) as _,
        });
        Self {
            server: WebhookServer::new(Arc::clone(&state)),
            state,
            chat,
            store,
            reporter,
            kv,
        }
    }

    pub async fn link(&self, user: &str, identity: EmployeeIdentity) {
        self.store.learn(&identity);
        self.state
            .links
            .put(user, &UserLink::new(identity))
            .await
            .expect("store link");
    }

    pub async fn link_with_prompt(&self, user: &str, identity: EmployeeIdentity, sent: DateTime<Utc>) {
        self.store.learn(&identity);
        let mut link = UserLink::new(identity);
        link.last_message = Some(LastMessage {
            ts: format!("{}.000200", sent.timestamp()),
            channel: DM_CHANNEL.into(),
        });
        self.state.links.put(user, &link).await.expect("store link");
    }

    pub async fn stored_link(&self, user: &str) -> Option<UserLink> {
        self.state.links.get(user).await.expect("read link")
    }

    pub async fn send(&self, req: WebhookRequest) -> WebhookResponse {
        self.server.handle(&req).await
    }

    /// Signed form post of `payload` to `path`.
    pub async fn post_payload(&self, path: &str, payload: &Value) -> WebhookResponse {
        let body = serde_urlencoded::to_string([("payload", payload.to_string())])
            .expect("form encode");
        self.send(signed("POST", path, body.into_bytes())).await
    }

    /// Signed JSON post to `/slack/actions`.
    pub async fn post_event(&self, event: &Value) -> WebhookResponse {
        self.send(signed("POST", "/slack/actions", event.to_string().into_bytes()))
            .await
    }
}

pub fn signed(method: &str, path: &str, body: Vec<u8>) -> WebhookRequest {
    let timestamp = saturday().timestamp().to_string();
    let signature = SignatureVerifier::sign(SIGNING_SECRET, &timestamp, &body);
    WebhookRequest::new(method, path)
        .with_header(TIMESTAMP_HEADER, timestamp)
        .with_header(SIGNATURE_HEADER, signature)
        .with_body(body)
}
