//! Slack Web API calls used by the dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use slack_morphism::prelude::{
    SlackApiChatDeleteRequest, SlackApiChatPostMessageRequest, SlackApiToken, SlackApiTokenType,
    SlackApiTokenValue, SlackApiViewsOpenRequest, SlackApiViewsPublishRequest, SlackBlock,
    SlackChannelId, SlackClient, SlackClientHyperHttpsConnector, SlackClientSession,
    SlackMessageContent, SlackTriggerId, SlackTs, SlackUserId, SlackView,
};
use tracing::info;

use crate::models::user_link::LastMessage;
use crate::{config::SlackConfig, AppError, Result};

/// Boxed future returned by [`ChatApi`] methods.
pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Outbound chat-platform operations.
pub trait ChatApi: Send + Sync {
    /// Replace the home tab of `user`.
    fn publish_home<'a>(&'a self, user: &'a str, view: SlackView) -> ChatFuture<'a, ()>;

    /// Send a direct message to `user`; returns where it landed.
    fn post_message<'a>(
        &'a self,
        user: &'a str,
        blocks: Vec<SlackBlock>,
    ) -> ChatFuture<'a, LastMessage>;

    /// Delete a previously sent message.
    fn delete_message<'a>(&'a self, message: &'a LastMessage) -> ChatFuture<'a, ()>;

    /// Open a modal using a short-lived trigger id.
    fn open_modal<'a>(&'a self, trigger_id: &'a str, view: SlackView) -> ChatFuture<'a, ()>;
}

/// Message to be delivered to Slack via chat.postMessage.
#[derive(Debug, Clone)]
pub struct SlackMessage {
    /// Channel or user id to post to.
    pub channel: SlackChannelId,
    /// Fallback text for notifications.
    pub text: Option<String>,
    /// Block Kit content.
    pub blocks: Option<Vec<SlackBlock>>,
}

impl SlackMessage {
    /// Blocks sent as a direct message; posting to a user id opens the DM.
    #[must_use]
    pub fn direct(user: &str, blocks: Vec<SlackBlock>) -> Self {
        Self {
            channel: SlackChannelId(user.to_owned()),
            text: Some("Time to fill in this week's scores".to_owned()),
            blocks: Some(blocks),
        }
    }

    fn into_request(self) -> SlackApiChatPostMessageRequest {
        let content = SlackMessageContent {
            text: self.text,
            blocks: self.blocks,
            attachments: None,
            upload: None,
            files: None,
            reactions: None,
            metadata: None,
        };

        SlackApiChatPostMessageRequest {
            channel: self.channel,
            content,
            as_user: None,
            icon_emoji: None,
            icon_url: None,
            link_names: None,
            parse: None,
            thread_ts: None,
            username: None,
            reply_broadcast: None,
            unfurl_links: None,
            unfurl_media: None,
        }
    }
}

/// slack-morphism client authenticated with the bot token.
pub struct SlackService {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
}

impl SlackService {
    /// Create the HTTPS client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTPS connector cannot be created.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Config(format!("failed to init slack connector: {err}")))?;
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };
        info!("slack web api client ready");
        Ok(Self {
            client: Arc::new(SlackClient::new(connector)),
            bot_token,
        })
    }

    fn http_session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }
}

impl ChatApi for SlackService {
    fn publish_home<'a>(&'a self, user: &'a str, view: SlackView) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiViewsPublishRequest::new(SlackUserId(user.to_owned()), view);
            self.http_session()
                .views_publish(&request)
                .await
                .map_err(|err| AppError::slack("publish home", &err))?;
            Ok(())
        })
    }

    fn post_message<'a>(
        &'a self,
        user: &'a str,
        blocks: Vec<SlackBlock>,
    ) -> ChatFuture<'a, LastMessage> {
        Box::pin(async move {
            let request = SlackMessage::direct(user, blocks).into_request();
            let response = self
                .http_session()
                .chat_post_message(&request)
                .await
                .map_err(|err| AppError::slack("post message", &err))?;
            Ok(LastMessage {
                ts: response.ts.0,
                channel: response.channel.0,
            })
        })
    }

    fn delete_message<'a>(&'a self, message: &'a LastMessage) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiChatDeleteRequest::new(
                SlackChannelId(message.channel.clone()),
                SlackTs(message.ts.clone()),
            );
            self.http_session()
                .chat_delete(&request)
                .await
                .map_err(|err| AppError::slack("delete message", &err))?;
            Ok(())
        })
    }

    fn open_modal<'a>(&'a self, trigger_id: &'a str, view: SlackView) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiViewsOpenRequest::new(SlackTriggerId(trigger_id.to_owned()), view);
            self.http_session()
                .views_open(&request)
                .await
                .map_err(|err| AppError::slack("open modal", &err))?;
            Ok(())
        })
    }
}
