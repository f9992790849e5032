//! Interaction state machine.
//!
//! Maps parsed payloads onto the fixed set of operations: link, unlink,
//! send a score prompt, open the notes modal, store scores or notes, and
//! refresh the home tab.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::models::payload::{
    ActionKind, BlockAction, BlockActionsPayload, EventEnvelope, InteractionPayload,
    OptionsRequest, ViewSubmissionPayload,
};
use crate::models::record::RecordPatch;
use crate::models::user_link::{EmployeeIdentity, UserLink};
use crate::routing::WebhookResponse;
use crate::server::AppState;
use crate::slack::blocks::{self, HomeIntro};
use crate::slack::options::OptionsResponse;
use crate::week::WeekId;
use crate::{AppError, Result};

/// Executes interactions against the capabilities in [`AppState`].
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<AppState>,
}

impl Dispatcher {
    /// Create a dispatcher over `state`.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn current_week(&self) -> WeekId {
        WeekId::containing(self.state.clock.now())
    }

    /// Handle a `block_actions` or `view_submission` payload.
    ///
    /// # Errors
    ///
    /// Propagates payload, identity, store and Slack failures.
    pub async fn interaction(&self, payload: &InteractionPayload) -> Result<()> {
        let user = payload.user_id().to_owned();
        match payload {
            InteractionPayload::BlockActions(actions) => {
                let action = actions.action()?;
                self.block_action(actions, action)
                    .instrument(info_span!("block_action", %user))
                    .await?;
            }
            InteractionPayload::ViewSubmission(submission) => {
                self.view_submission(submission)
                    .instrument(info_span!("view_submission", %user))
                    .await?;
            }
        }

        if payload.is_from_home() {
            self.refresh_home(&user).await?;
        }
        Ok(())
    }

    async fn block_action(&self, payload: &BlockActionsPayload, action: BlockAction) -> Result<()> {
        let user = payload.user.id.as_str();
        match action {
            BlockAction::SelectEmployee(identity) => self.link(user, identity).await,
            BlockAction::Unlink => {
                self.state.links.delete(user).await?;
                info!(user, "user unlinked");
                Ok(())
            }
            BlockAction::SubmitScores { target_user } => {
                self.send_score_prompt(target_user.as_deref().unwrap_or(user))
                    .await
            }
            BlockAction::OpenNotes { week } => {
                let trigger_id = payload.trigger_id.as_deref().ok_or_else(|| {
                    AppError::Payload(format!(
                        "{} without trigger_id",
                        ActionKind::OpenNotes.as_str()
                    ))
                })?;
                self.open_notes(user, trigger_id, week).await
            }
            BlockAction::PickScore { week, patch } => self.store(user, week, &patch).await,
        }
    }

    async fn view_submission(&self, submission: &ViewSubmissionPayload) -> Result<()> {
        let (week, notes) = submission.notes()?;
        self.store(&submission.user.id, week, &RecordPatch::notes(notes))
            .await
    }

    async fn link(&self, user: &str, identity: EmployeeIdentity) -> Result<()> {
        info!(user, employee = %identity.employee_id, "linking user");
        self.state.links.put(user, &UserLink::new(identity)).await
    }

    async fn store(&self, user: &str, week: WeekId, patch: &RecordPatch) -> Result<()> {
        let link = self.state.links.require(user).await?;
        self.state
            .records
            .upsert(&link.identity, week, patch)
            .await?;
        info!(user, %week, fields = patch.to_fields().len(), "record updated");
        Ok(())
    }

    async fn open_notes(&self, user: &str, trigger_id: &str, week: WeekId) -> Result<()> {
        let link = self.state.links.require(user).await?;
        let row = self
            .state
            .records
            .find_for_week(&link.identity, week)
            .await?;
        let view = blocks::notes_modal(week, row.as_ref().and_then(|row| row.notes()));
        self.state.chat.open_modal(trigger_id, view).await
    }

    /// Send `target` a fresh score prompt, replacing the previous one while
    /// it is still deletable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MissingIdentity` when `target` is not linked, or
    /// propagates store and Slack failures.
    pub async fn send_score_prompt(&self, target: &str) -> Result<()> {
        let mut link = self.state.links.require(target).await?;
        let last = self.state.records.find_latest(&link.identity).await?;
        let prompt = blocks::score_prompt(last.as_ref(), self.current_week());

        if let Some(previous) = &link.last_message {
            if previous.is_still_deletable(self.state.clock.now()) {
                if let Err(err) = self.state.chat.delete_message(previous).await {
                    warn!(user = target, %err, "could not delete previous prompt");
                }
            }
        }

        let sent = self.state.chat.post_message(target, prompt).await?;
        info!(user = target, ts = %sent.ts, "score prompt sent");
        link.last_message = Some(sent);
        self.state.links.put(target, &link).await
    }

    /// Re-render the home tab of `user`.
    ///
    /// # Errors
    ///
    /// Propagates KV, store and Slack failures.
    pub async fn refresh_home(&self, user: &str) -> Result<()> {
        let (announcement, link) =
            tokio::try_join!(self.state.links.announcement(), self.state.links.get(user))?;
        let intro = HomeIntro::new(&self.state.config.home, announcement);

        let Some(link) = link else {
            let view = blocks::home_view(blocks::home_unlinked(&intro));
            return self.state.chat.publish_home(user, view).await;
        };

        let loading = blocks::home_view(blocks::home_loading(&intro));
        let ((), last) = tokio::try_join!(
            self.state.chat.publish_home(user, loading),
            self.state.records.find_latest(&link.identity),
        )?;
        if last.is_none() {
            warn!(
                user,
                employee = %link.identity.employee_id,
                "linked employee has no rows"
            );
        }

        let view = blocks::home_view(blocks::home_linked(
            &intro,
            user,
            last.as_ref(),
            self.current_week(),
        ));
        self.state.chat.publish_home(user, view).await
    }

    /// Handle an event callback.
    ///
    /// # Errors
    ///
    /// Propagates home refresh failures.
    pub async fn event(&self, envelope: EventEnvelope) -> Result<WebhookResponse> {
        match envelope {
            EventEnvelope::UrlVerification { challenge } => {
                Ok(WebhookResponse::text(200, challenge))
            }
            EventEnvelope::AppHomeOpened { user } => {
                self.refresh_home(&user).await?;
                Ok(WebhookResponse::ok())
            }
        }
    }

    /// Options for the employee selector.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownAction` for any element other than the
    /// employee selector, or propagates store failures.
    pub async fn options(&self, request: &OptionsRequest) -> Result<OptionsResponse> {
        if ActionKind::parse(&request.action_id)? != ActionKind::SelectEmployee {
            return Err(AppError::UnknownAction(request.action_id.clone()));
        }
        let roster = self.state.records.list_recent_collaborators().await?;
        OptionsResponse::build(&roster, &request.value)
    }
}
