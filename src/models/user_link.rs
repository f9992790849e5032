//! Binding between a Slack user and a record-store employee.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days a sent score prompt stays eligible for deletion.
pub const DELETE_GRACE_DAYS: i64 = 7;

/// Employee identity chosen from the typeahead selector.
///
/// Serialized as the option value of the selector, then stored as part of
/// the [`UserLink`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeIdentity {
    /// Record-store collaborator id.
    pub employee_id: String,
    /// Display name, used in record-store formulas.
    pub employee_display_name: String,
}

/// Back-reference to the last score prompt sent to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    /// Slack message timestamp (`"1712345678.000200"`).
    pub ts: String,
    /// DM channel the prompt was posted to.
    pub channel: String,
}

impl LastMessage {
    /// A prompt is still deletable while `ts + DELETE_GRACE_DAYS` lies in the future.
    ///
    /// Unparseable or out-of-range timestamps are treated as expired.
    #[must_use]
    pub fn is_still_deletable(&self, now: DateTime<Utc>) -> bool {
        let Some(seconds) = self.ts.parse::<f64>().ok().filter(|s| s.is_finite()) else {
            return false;
        };
        #[allow(clippy::cast_possible_truncation)]
        let sent_ms = (seconds * 1000.0) as i64;
        DateTime::from_timestamp_millis(sent_ms)
            .and_then(|sent| sent.checked_add_signed(Duration::days(DELETE_GRACE_DAYS)))
            .is_some_and(|deadline| deadline > now)
    }
}

/// Stored session context for one Slack user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserLink {
    /// Linked employee.
    #[serde(flatten)]
    pub identity: EmployeeIdentity,
    /// Last score prompt sent, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
}

impl UserLink {
    /// Fresh link with no prompt history.
    #[must_use]
    pub fn new(identity: EmployeeIdentity) -> Self {
        Self {
            identity,
            last_message: None,
        }
    }
}
