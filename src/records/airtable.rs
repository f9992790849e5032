//! Airtable REST client implementing [`RecordStore`].

use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::RecordStoreConfig;
use crate::models::record::{RecordRow, WEEK_COLUMN};
use crate::{AppError, Result};

use super::store::{RecordFuture, RecordPage, RecordQuery, RecordStore};

const SERVICE: &str = "record store";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RecordRow>,
    #[serde(default)]
    offset: Option<String>,
}

/// Client bound to one base, table and view.
#[derive(Clone)]
pub struct AirtableClient {
    http: Client,
    table_url: Url,
    view: String,
    api_key: String,
}

impl std::fmt::Debug for AirtableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableClient")
            .field("table_url", &self.table_url.as_str())
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl AirtableClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when `base_url` is not a usable URL.
    pub fn new(config: &RecordStoreConfig) -> Result<Self> {
        let mut table_url = Url::parse(&config.base_url)
            .map_err(|err| AppError::Config(format!("invalid record_store.base_url: {err}")))?;
        table_url
            .path_segments_mut()
            .map_err(|()| AppError::Config("record_store.base_url cannot be a base".into()))?
            .pop_if_empty()
            .push(&config.base_id)
            .push(&config.table);

        Ok(Self {
            http: Client::new(),
            table_url,
            view: config.view.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn select_url(&self, query: &RecordQuery) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("view", &self.view);
            pairs.append_pair("filterByFormula", &query.formula);
            if let Some(max) = query.max_records {
                pairs.append_pair("maxRecords", &max.to_string());
            }
            if query.newest_first {
                pairs.append_pair("sort[0][field]", WEEK_COLUMN);
                pairs.append_pair("sort[0][direction]", "desc");
            }
            for field in &query.fields {
                pairs.append_pair("fields[]", field);
            }
            if let Some(offset) = &query.offset {
                pairs.append_pair("offset", offset);
            }
        }
        url
    }

    async fn write(&self, method: reqwest::Method, body: Value) -> Result<()> {
        let response = self
            .http
            .request(method.clone(), self.table_url.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(unreachable_store)?;
        ensure_success(response).await?;
        debug!(%method, "record store write accepted");
        Ok(())
    }
}

impl RecordStore for AirtableClient {
    fn select<'a>(&'a self, query: &'a RecordQuery) -> RecordFuture<'a, RecordPage> {
        Box::pin(async move {
            let response = self
                .http
                .get(self.select_url(query))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(unreachable_store)?;
            let list: ListResponse = ensure_success(response)
                .await?
                .json()
                .await
                .map_err(|err| AppError::Upstream {
                    service: SERVICE,
                    status: None,
                    body: format!("unreadable list response: {err}"),
                })?;
            debug!(
                formula = %query.formula,
                records = list.records.len(),
                more = list.offset.is_some(),
                "record store select"
            );
            Ok(RecordPage {
                records: list.records,
                offset: list.offset,
            })
        })
    }

    fn create(&self, fields: Map<String, Value>) -> RecordFuture<'_, ()> {
        Box::pin(self.write(
            reqwest::Method::POST,
            json!({ "records": [{ "fields": fields }] }),
        ))
    }

    fn update<'a>(&'a self, id: &'a str, fields: Map<String, Value>) -> RecordFuture<'a, ()> {
        Box::pin(self.write(
            reqwest::Method::PATCH,
            json!({ "records": [{ "id": id, "fields": fields }] }),
        ))
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), %body, "record store rejected request");
    Err(AppError::upstream(SERVICE, status.as_u16(), body))
}

#[allow(clippy::needless_pass_by_value)]
fn unreachable_store(err: reqwest::Error) -> AppError {
    AppError::Upstream {
        service: SERVICE,
        status: None,
        body: err.to_string(),
    }
}
