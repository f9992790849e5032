//! Inbound Slack webhook payloads.
//!
//! Raw shapes are deserialized leniently, then converted into closed enums
//! ([`BlockAction`], [`EventEnvelope`]) so dispatch is an exhaustive match.
//! Unknown discriminators are rejected rather than ignored.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::debug;

use crate::models::record::{RecordPatch, ScoreField};
use crate::models::user_link::EmployeeIdentity;
use crate::week::{WeekBlockId, WeekId};
use crate::{AppError, Result};

/// Action id of the plain-text input inside the notes modal.
pub const NOTES_INPUT_ACTION: &str = "notes_input";

/// Every `action_id` this service renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Typeahead selector on the unlinked home tab.
    SelectEmployee,
    /// Home-tab button removing the link.
    Unlink,
    /// Home-tab button asking for a score prompt.
    SubmitScores,
    /// Prompt button opening the notes modal.
    OpenNotes,
    /// Score select inside the prompt.
    PickScore,
}

impl ActionKind {
    /// Wire value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectEmployee => "select_employee",
            Self::Unlink => "unlink",
            Self::SubmitScores => "submit_scores",
            Self::OpenNotes => "open_notes",
            Self::PickScore => "pick_score",
        }
    }

    /// Parse a wire value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownAction` for ids this service never renders.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "select_employee" => Ok(Self::SelectEmployee),
            "unlink" => Ok(Self::Unlink),
            "submit_scores" => Ok(Self::SubmitScores),
            "open_notes" => Ok(Self::OpenNotes),
            "pick_score" => Ok(Self::PickScore),
            other => Err(AppError::UnknownAction(other.to_owned())),
        }
    }
}

/// Slack user reference.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadUser {
    /// Slack user id.
    pub id: String,
}

/// Chosen option of a select element.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    /// Option value.
    pub value: String,
}

/// One element's current value inside `state.values`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateValue {
    /// Text inputs.
    #[serde(default)]
    pub value: Option<String>,
    /// Selects.
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

/// `state.values`: block id → action id → value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewState {
    /// Values keyed by block id, then action id.
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, StateValue>>,
}

/// Block reference inside a view.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewBlock {
    /// Block id, when the block declared one.
    #[serde(default)]
    pub block_id: Option<String>,
}

/// View context carried by an interaction.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadView {
    /// `home` or `modal`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Blocks of the view.
    #[serde(default)]
    pub blocks: Vec<ViewBlock>,
    /// Input state of the view.
    #[serde(default)]
    pub state: Option<ViewState>,
}

/// Action entry of a `block_actions` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAction {
    /// Discriminator.
    pub action_id: String,
    /// Block the element lives in.
    #[serde(default)]
    pub block_id: Option<String>,
    /// Button value.
    #[serde(default)]
    pub value: Option<String>,
    /// Select value.
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

/// `block_actions` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockActionsPayload {
    /// Acting user.
    pub user: PayloadUser,
    /// Short-lived id needed to open a modal.
    #[serde(default)]
    pub trigger_id: Option<String>,
    /// Triggered actions; only the first is used.
    #[serde(default)]
    pub actions: Vec<RawAction>,
    /// Message state (score prompt selects).
    #[serde(default)]
    pub state: Option<ViewState>,
    /// Surrounding view, for home-tab interactions.
    #[serde(default)]
    pub view: Option<PayloadView>,
}

/// `view_submission` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewSubmissionPayload {
    /// Submitting user.
    pub user: PayloadUser,
    /// Submitted modal.
    pub view: PayloadView,
}

/// Body of the `payload` form field on `/slack/interactive`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionPayload {
    /// Button or select interaction.
    BlockActions(BlockActionsPayload),
    /// Modal submit.
    ViewSubmission(ViewSubmissionPayload),
}

impl InteractionPayload {
    /// Parse the JSON carried in the `payload` form field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` for malformed JSON or an unknown `type`.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| AppError::Payload(format!("unreadable interaction payload: {err}")))
    }

    /// Acting user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::BlockActions(payload) => &payload.user.id,
            Self::ViewSubmission(payload) => &payload.user.id,
        }
    }

    /// Whether the interaction happened on the home tab.
    #[must_use]
    pub fn is_from_home(&self) -> bool {
        let view = match self {
            Self::BlockActions(payload) => payload.view.as_ref(),
            Self::ViewSubmission(payload) => Some(&payload.view),
        };
        view.is_some_and(|view| view.kind == "home")
    }
}

/// A `block_actions` payload reduced to what dispatch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockAction {
    /// Link the acting user to this employee.
    SelectEmployee(EmployeeIdentity),
    /// Remove the acting user's link.
    Unlink,
    /// Send a score prompt to `target_user` (acting user when `None`).
    SubmitScores {
        /// Button value naming the user to prompt.
        target_user: Option<String>,
    },
    /// Open the notes modal for `week`.
    OpenNotes {
        /// Week encoded in the button's block id.
        week: WeekId,
    },
    /// Store selected scores for `week`.
    PickScore {
        /// Week encoded in the first state block id.
        week: WeekId,
        /// Selected scores.
        patch: RecordPatch,
    },
}

impl BlockActionsPayload {
    /// Interpret the first action.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownAction` for unknown ids and
    /// `AppError::Payload` when the action lacks the data it needs.
    pub fn action(&self) -> Result<BlockAction> {
        let action = self
            .actions
            .first()
            .ok_or_else(|| AppError::Payload("block_actions without actions".into()))?;

        match ActionKind::parse(&action.action_id)? {
            ActionKind::SelectEmployee => {
                let option = action.selected_option.as_ref().ok_or_else(|| {
                    AppError::Payload("select_employee without selected_option".into())
                })?;
                let identity: EmployeeIdentity = serde_json::from_str(&option.value)
                    .map_err(|err| AppError::Payload(format!("invalid employee option: {err}")))?;
                Ok(BlockAction::SelectEmployee(identity))
            }
            ActionKind::Unlink => Ok(BlockAction::Unlink),
            ActionKind::SubmitScores => Ok(BlockAction::SubmitScores {
                target_user: action.value.clone().filter(|v| !v.is_empty()),
            }),
            ActionKind::OpenNotes => {
                let block_id = action
                    .block_id
                    .as_deref()
                    .ok_or_else(|| AppError::Payload("open_notes without block_id".into()))?;
                Ok(BlockAction::OpenNotes {
                    week: WeekBlockId::parse(block_id)?.week,
                })
            }
            ActionKind::PickScore => self.picked_scores(),
        }
    }

    fn picked_scores(&self) -> Result<BlockAction> {
        let state = self
            .state
            .as_ref()
            .or_else(|| self.view.as_ref().and_then(|view| view.state.as_ref()))
            .ok_or_else(|| AppError::Payload("pick_score without state".into()))?;

        // Sorted so "first block" is deterministic.
        let blocks: BTreeMap<&String, &HashMap<String, StateValue>> = state.values.iter().collect();
        let first = blocks
            .keys()
            .next()
            .ok_or_else(|| AppError::Payload("pick_score with empty state".into()))?;
        let week = WeekBlockId::parse(first)?.week;

        let mut patch = RecordPatch::default();
        for (block_id, elements) in blocks {
            let Some(selected) = elements
                .get(ActionKind::PickScore.as_str())
                .and_then(|element| element.selected_option.as_ref())
            else {
                debug!(block_id, "score block without selection");
                continue;
            };
            let parsed = WeekBlockId::parse(block_id)?;
            let field = ScoreField::from_column(&parsed.field).ok_or_else(|| {
                AppError::Payload(format!("unknown score field: {}", parsed.field))
            })?;
            let in_range = selected
                .value
                .parse::<u8>()
                .is_ok_and(|score| (1..=field.max_score()).contains(&score));
            if !in_range {
                return Err(AppError::Payload(format!(
                    "score {:?} out of range for {}",
                    selected.value,
                    field.column()
                )));
            }
            patch.scores.insert(field, selected.value.clone());
        }

        Ok(BlockAction::PickScore { week, patch })
    }
}

impl ViewSubmissionPayload {
    /// Week and notes text of a submitted notes modal.
    ///
    /// A cleared input yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` when the modal has no week block.
    pub fn notes(&self) -> Result<(WeekId, String)> {
        let block_id = self
            .view
            .blocks
            .first()
            .and_then(|block| block.block_id.as_deref())
            .ok_or_else(|| AppError::Payload("view_submission without block id".into()))?;
        let week = WeekBlockId::parse(block_id)?.week;
        let text = self
            .view
            .state
            .as_ref()
            .and_then(|state| state.values.get(block_id))
            .and_then(|elements| elements.get(NOTES_INPUT_ACTION))
            .and_then(|element| element.value.clone())
            .unwrap_or_default();
        Ok((week, text))
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    event: Option<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: Option<String>,
}

/// JSON body of `/slack/actions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEnvelope {
    /// Endpoint ownership check; echo the challenge.
    UrlVerification {
        /// Token to echo back verbatim.
        challenge: String,
    },
    /// A user opened the app's home tab.
    AppHomeOpened {
        /// User whose home tab to refresh.
        user: String,
    },
}

impl EventEnvelope {
    /// Parse and classify an event-callback body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` for malformed JSON and
    /// `AppError::UnrecognizedEvent` for any envelope or event type other
    /// than the two handled ones.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_slice(body)
            .map_err(|err| AppError::Payload(format!("unreadable event body: {err}")))?;

        match raw.kind.as_str() {
            "url_verification" => {
                let challenge = raw.challenge.ok_or_else(|| {
                    AppError::Payload("url_verification without challenge".into())
                })?;
                Ok(Self::UrlVerification { challenge })
            }
            "event_callback" => {
                let event = raw
                    .event
                    .ok_or_else(|| AppError::Payload("event_callback without event".into()))?;
                match event.kind.as_str() {
                    "app_home_opened" => {
                        let user = event.user.ok_or_else(|| {
                            AppError::Payload("app_home_opened without user".into())
                        })?;
                        Ok(Self::AppHomeOpened { user })
                    }
                    other => Err(AppError::UnrecognizedEvent(other.to_owned())),
                }
            }
            other => Err(AppError::UnrecognizedEvent(other.to_owned())),
        }
    }
}

/// Body of the `payload` form field on `/slack/options-load`.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsRequest {
    /// Element asking for options.
    pub action_id: String,
    /// Text typed so far.
    #[serde(default)]
    pub value: String,
}

impl OptionsRequest {
    /// Parse the JSON carried in the `payload` form field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` for malformed JSON.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| AppError::Payload(format!("unreadable options payload: {err}")))
    }
}
