//! Domain operations over the record store.
//!
//! One row per (employee, week) is maintained by looking the row up before
//! writing. The lookup and the write are not atomic; two concurrent writes
//! for the same week can both create a row.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};
use tracing::debug;

use crate::clock::Clock;
use crate::models::record::{Employee, RecordPatch, RecordRow, EMPLOYEE_COLUMN, WEEK_COLUMN};
use crate::models::user_link::EmployeeIdentity;
use crate::week::WeekId;
use crate::Result;

use super::store::{RecordQuery, RecordStore};

/// Record-store operations used by the dispatcher.
#[derive(Clone)]
pub struct RecordGateway {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl RecordGateway {
    /// Create a gateway over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Most recent row of `employee`, by week.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` if the store rejects the query.
    pub async fn find_latest(&self, employee: &EmployeeIdentity) -> Result<Option<RecordRow>> {
        let query = RecordQuery {
            max_records: Some(1),
            newest_first: true,
            ..RecordQuery::matching(employee_formula(employee))
        };
        Ok(self.store.select(&query).await?.records.into_iter().next())
    }

    /// Row of `employee` for `week`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` if the store rejects the query.
    pub async fn find_for_week(
        &self,
        employee: &EmployeeIdentity,
        week: WeekId,
    ) -> Result<Option<RecordRow>> {
        let query = RecordQuery {
            max_records: Some(1),
            newest_first: true,
            ..RecordQuery::matching(format!(
                "AND({}, {WEEK_COLUMN}={})",
                employee_formula(employee),
                week.as_number()
            ))
        };
        Ok(self.store.select(&query).await?.records.into_iter().next())
    }

    /// Write `patch` into the row of `employee` for `week`, creating the
    /// row when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` if the store rejects the lookup or write.
    pub async fn upsert(
        &self,
        employee: &EmployeeIdentity,
        week: WeekId,
        patch: &RecordPatch,
    ) -> Result<()> {
        if patch.is_empty() {
            debug!(employee = %employee.employee_id, %week, "empty patch, nothing to write");
            return Ok(());
        }

        let mut fields = patch.to_fields();
        match self.find_for_week(employee, week).await? {
            Some(row) => {
                debug!(record = %row.id, %week, "updating existing row");
                self.store.update(&row.id, fields).await
            }
            None => {
                debug!(employee = %employee.employee_id, %week, "creating row");
                fields.insert(WEEK_COLUMN.to_owned(), Value::from(week.as_number()));
                fields.insert(
                    EMPLOYEE_COLUMN.to_owned(),
                    json!({ "id": employee.employee_id }),
                );
                self.store.create(fields).await
            }
        }
    }

    /// Employees with a row in the week that contained `now - 7 days`,
    /// deduplicated by id in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` if any page fails.
    pub async fn list_recent_collaborators(&self) -> Result<Vec<Employee>> {
        let week = WeekId::containing(self.clock.now() - Duration::days(7));
        let mut query = RecordQuery {
            fields: vec![EMPLOYEE_COLUMN.to_owned()],
            ..RecordQuery::matching(format!("{WEEK_COLUMN}={}", week.as_number()))
        };

        let mut seen = HashSet::new();
        let mut employees = Vec::new();
        loop {
            let page = self.store.select(&query).await?;
            for employee in page.records.into_iter().filter_map(|row| row.fields.employee) {
                if seen.insert(employee.id.clone()) {
                    employees.push(employee);
                }
            }
            match page.offset {
                Some(offset) => query = query.continue_at(offset),
                None => break,
            }
        }

        debug!(%week, count = employees.len(), "recent collaborators listed");
        Ok(employees)
    }
}

fn employee_formula(employee: &EmployeeIdentity) -> String {
    format!(
        "{EMPLOYEE_COLUMN}='{}'",
        escape_formula_string(&employee.employee_display_name)
    )
}

/// Escape a value for a single-quoted formula string literal.
#[must_use]
pub fn escape_formula_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}
