//! Transport-neutral record-store interface.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::models::record::RecordRow;
use crate::Result;

/// Boxed future returned by [`RecordStore`] methods.
pub type RecordFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Read request against the configured table and view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// `filterByFormula` expression.
    pub formula: String,
    /// Upper bound on returned rows.
    pub max_records: Option<u32>,
    /// Newest week first.
    pub newest_first: bool,
    /// Restrict returned columns; empty means all.
    pub fields: Vec<String>,
    /// Continuation token from a previous page.
    pub offset: Option<String>,
}

impl RecordQuery {
    /// Query matching `formula`.
    pub fn matching(formula: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            ..Self::default()
        }
    }

    /// Same query, continuing at `offset`.
    #[must_use]
    pub fn continue_at(&self, offset: String) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }
}

/// One page of a [`RecordQuery`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    /// Rows on this page.
    pub records: Vec<RecordRow>,
    /// Present when more pages follow.
    pub offset: Option<String>,
}

/// Table-level operations the gateway needs.
pub trait RecordStore: Send + Sync {
    /// Fetch one page of rows.
    fn select<'a>(&'a self, query: &'a RecordQuery) -> RecordFuture<'a, RecordPage>;

    /// Insert a row with `fields`.
    fn create(&self, fields: Map<String, Value>) -> RecordFuture<'_, ()>;

    /// Overwrite `fields` of row `id`; other columns keep their values.
    fn update<'a>(&'a self, id: &'a str, fields: Map<String, Value>) -> RecordFuture<'a, ()>;
}
