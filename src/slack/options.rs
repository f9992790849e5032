//! Typeahead options for the employee selector.

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::record::Employee;
use crate::models::user_link::EmployeeIdentity;
use crate::Result;

/// Lower-case `text` and strip diacritics (NFD, then drop combining marks).
#[must_use]
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Employees whose folded name contains the folded `query`.
pub fn matching<'a>(roster: &'a [Employee], query: &str) -> Vec<&'a Employee> {
    let needle = fold(query);
    roster
        .iter()
        .filter(|employee| fold(&employee.name).contains(&needle))
        .collect()
}

/// Plain-text label of an option.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OptionText {
    #[serde(rename = "type")]
    kind: &'static str,
    /// Visible label.
    pub text: String,
}

/// One selectable option.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SelectOption {
    /// Visible label.
    pub text: OptionText,
    /// Serialized [`EmployeeIdentity`].
    pub value: String,
}

/// Response body of an options-load request.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OptionsResponse {
    /// Matching options, roster order.
    pub options: Vec<SelectOption>,
}

impl OptionsResponse {
    /// Options for every employee in `roster` matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` if an identity cannot be serialized.
    pub fn build(roster: &[Employee], query: &str) -> Result<Self> {
        let options = matching(roster, query)
            .into_iter()
            .map(|employee| {
                let identity = EmployeeIdentity {
                    employee_id: employee.id.clone(),
                    employee_display_name: employee.name.clone(),
                };
                Ok(SelectOption {
                    text: OptionText {
                        kind: "plain_text",
                        text: employee.name.clone(),
                    },
                    value: serde_json::to_string(&identity)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { options })
    }
}
