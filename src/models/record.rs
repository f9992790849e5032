//! Weekly self-assessment rows as stored in the record store.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::week::WeekId;

/// Record-store column holding the week identifier.
pub const WEEK_COLUMN: &str = "Week";
/// Record-store column holding free-text notes.
pub const NOTES_COLUMN: &str = "Notes";
/// Record-store column linking the row to an employee.
pub const EMPLOYEE_COLUMN: &str = "Employee";

/// One of the four scored axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScoreField {
    /// Own performance, 1–4.
    Performance,
    /// Team health, 1–4.
    Team,
    /// Work environment, 1–4.
    Environment,
    /// Personal growth, 1–3.
    Growth,
}

impl ScoreField {
    /// Every field, in display order.
    pub const ALL: [Self; 4] = [Self::Performance, Self::Team, Self::Environment, Self::Growth];

    /// Column name in the record store, also used as block id suffix.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Performance => "Performance",
            Self::Team => "Team",
            Self::Environment => "Environment",
            Self::Growth => "Growth",
        }
    }

    /// Highest selectable score.
    #[must_use]
    pub fn max_score(self) -> u8 {
        match self {
            Self::Growth => 3,
            Self::Performance | Self::Team | Self::Environment => 4,
        }
    }

    /// Reverse of [`ScoreField::column`].
    #[must_use]
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.column() == column)
    }
}

/// Collaborator identity embedded in a row's `Employee` column.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Employee {
    /// Record-store collaborator id.
    pub id: String,
    /// Work email, when the store exposes it.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name; absent in write payloads that only carry the id.
    #[serde(default)]
    pub name: String,
}

/// Column values of a row. Every column may be blank.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RecordFields {
    /// Week the row belongs to; `None` when blank or not a week id.
    #[serde(rename = "Week", default, deserialize_with = "week")]
    pub week: Option<WeekId>,
    /// Free-text notes.
    #[serde(rename = "Notes", default)]
    pub notes: Option<String>,
    /// Owning employee.
    #[serde(rename = "Employee", default)]
    pub employee: Option<Employee>,
    /// Performance score.
    #[serde(rename = "Performance", default, deserialize_with = "score")]
    pub performance: Option<String>,
    /// Team score.
    #[serde(rename = "Team", default, deserialize_with = "score")]
    pub team: Option<String>,
    /// Environment score.
    #[serde(rename = "Environment", default, deserialize_with = "score")]
    pub environment: Option<String>,
    /// Growth score.
    #[serde(rename = "Growth", default, deserialize_with = "score")]
    pub growth: Option<String>,
}

/// A fetched row snapshot. Never cached across requests.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RecordRow {
    /// Opaque record-store id.
    pub id: String,
    /// Column values.
    #[serde(default)]
    pub fields: RecordFields,
}

impl RecordRow {
    /// Value of a score column, ignoring blanks.
    #[must_use]
    pub fn score(&self, field: ScoreField) -> Option<&str> {
        let value = match field {
            ScoreField::Performance => &self.fields.performance,
            ScoreField::Team => &self.fields.team,
            ScoreField::Environment => &self.fields.environment,
            ScoreField::Growth => &self.fields.growth,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Notes text, ignoring blanks.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.fields.notes.as_deref().filter(|v| !v.is_empty())
    }

    /// Whether this row belongs to `week`.
    #[must_use]
    pub fn is_for_week(&self, week: &WeekId) -> bool {
        self.fields.week.as_ref() == Some(week)
    }
}

/// Subset of columns to write in an upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// Score columns to set.
    pub scores: BTreeMap<ScoreField, String>,
    /// Notes to set, when present.
    pub notes: Option<String>,
}

impl RecordPatch {
    /// Patch that only sets notes.
    pub fn notes(text: impl Into<String>) -> Self {
        Self {
            scores: BTreeMap::new(),
            notes: Some(text.into()),
        }
    }

    /// Whether the patch would write nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.notes.is_none()
    }

    /// Record-store `fields` object for this patch.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields: Map<String, Value> = self
            .scores
            .iter()
            .map(|(field, value)| (field.column().to_owned(), Value::String(value.clone())))
            .collect();
        if let Some(notes) = &self.notes {
            fields.insert(NOTES_COLUMN.to_owned(), Value::String(notes.clone()));
        }
        fields
    }
}

/// Rows are typed by hand, so an unusable week blanks the column instead of
/// failing the whole page.
fn week<'de, D>(deserializer: D) -> std::result::Result<Option<WeekId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if s.is_empty() => return Ok(None),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        None | Some(Value::Null) => return Ok(None),
        Some(other) => other.to_string(),
    };
    match raw.parse() {
        Ok(week) => Ok(Some(week)),
        Err(err) => {
            warn!(value = %raw, %err, "ignoring unreadable week column");
            Ok(None)
        }
    }
}

/// Single-select columns come back as strings, numeric columns as numbers.
fn score<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
