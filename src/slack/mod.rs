//! Slack bridge layer modules.

pub mod blocks;
pub mod client;
pub mod dispatch;
pub mod options;
pub mod webhooks;
