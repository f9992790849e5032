//! Per-user session context stored as JSON in the key-value store.

use std::sync::Arc;

use tracing::debug;

use crate::models::user_link::UserLink;
use crate::{AppError, Result};

use super::kv::KvStore;

/// KV key of the home-tab announcement.
pub const ANNOUNCEMENT_KEY: &str = "announcement";

/// Repository of [`UserLink`] values keyed by Slack user id.
#[derive(Clone)]
pub struct UserLinks {
    kv: Arc<dyn KvStore>,
}

impl UserLinks {
    /// Create a new repository over `kv`.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Link of `user`, `None` when the user never linked.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Kv` if the store fails or the stored value is not
    /// a valid link.
    pub async fn get(&self, user: &str) -> Result<Option<UserLink>> {
        let Some(raw) = self.kv.get(user).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| AppError::Kv(format!("unreadable link for {user}: {err}")))
    }

    /// Link of `user`, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MissingIdentity` when the user is not linked.
    pub async fn require(&self, user: &str) -> Result<UserLink> {
        self.get(user)
            .await?
            .ok_or_else(|| AppError::MissingIdentity(format!("no linked employee for {user}")))
    }

    /// Store `link` for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Kv` if the store write fails.
    pub async fn put(&self, user: &str, link: &UserLink) -> Result<()> {
        let raw = serde_json::to_string(link)
            .map_err(|err| AppError::Kv(format!("unserializable link: {err}")))?;
        self.kv.put(user, raw).await?;
        debug!(user, employee = %link.identity.employee_id, "link stored");
        Ok(())
    }

    /// Remove the link of `user`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Kv` if the store delete fails.
    pub async fn delete(&self, user: &str) -> Result<()> {
        self.kv.delete(user).await?;
        debug!(user, "link removed");
        Ok(())
    }

    /// Announcement text shown on the home tab, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Kv` if the store read fails.
    pub async fn announcement(&self) -> Result<Option<String>> {
        Ok(self
            .kv
            .get(ANNOUNCEMENT_KEY)
            .await?
            .filter(|text| !text.trim().is_empty()))
    }
}
