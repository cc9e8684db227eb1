// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram messaging gateway for the Entoforce dispatch service.
//!
//! Implements [`MessagingGateway`] for the Telegram Bot API via teloxide.
//! Each bot serves one conversation kind: clients talk to one bot,
//! technicians to another. Long polling feeds decoded updates into an
//! internal channel that [`MessagingGateway::receive`] drains.

pub mod handler;
pub mod keyboard;

use async_trait::async_trait;
use entoforce_config::model::TelegramConfig;
use entoforce_core::{
    AdapterType, ConversationKind, EntoforceError, GatewayCapabilities, HealthStatus,
    InboundEvent, MessageId, MessagingGateway, OutboundMessage, PluginAdapter,
};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MAX_MESSAGE_LENGTH: usize = 4096;

/// A Telegram bot bound to one conversation kind.
pub struct TelegramGateway {
    bot: Bot,
    kind: ConversationKind,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundEvent>>,
    /// Moved into the dispatcher's handlers on connect(), so the channel
    /// closes when polling ends.
    inbound_tx: Option<mpsc::Sender<InboundEvent>>,
    shutdown_token: Option<ShutdownToken>,
}

impl TelegramGateway {
    /// Creates the gateway for `kind` from its token in `config`.
    pub fn new(kind: ConversationKind, config: &TelegramConfig) -> Result<Self, EntoforceError> {
        let (key, token) = match kind {
            ConversationKind::ClientIntake => {
                ("telegram.client_bot_token", config.client_bot_token.as_deref())
            }
            ConversationKind::TechnicianIntake => (
                "telegram.technician_bot_token",
                config.technician_bot_token.as_deref(),
            ),
        };
        let token = token
            .ok_or_else(|| EntoforceError::Config(format!("{key} is required for {kind}")))?;
        if token.is_empty() {
            return Err(EntoforceError::Config(format!("{key} cannot be empty")));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(100);
        Ok(Self {
            bot: Bot::new(token),
            kind,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx: Some(inbound_tx),
            shutdown_token: None,
        })
    }

    pub fn kind(&self) -> ConversationKind {
        self.kind
    }
}

#[async_trait]
impl PluginAdapter for TelegramGateway {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, EntoforceError> {
        // getMe doubles as a token check.
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), EntoforceError> {
        debug!(kind = %self.kind, "Telegram gateway shutting down");
        if let Some(token) = &self.shutdown_token {
            match token.shutdown() {
                Ok(stopped) => stopped.await,
                Err(_) => debug!(kind = %self.kind, "dispatcher was not running"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    fn capabilities(&self) -> GatewayCapabilities {
        GatewayCapabilities {
            supports_choices: true,
            supports_contact_request: true,
            max_message_length: Some(MAX_MESSAGE_LENGTH),
        }
    }

    async fn connect(&mut self) -> Result<(), EntoforceError> {
        let Some(message_tx) = self.inbound_tx.take() else {
            return Ok(()); // Already connected
        };

        let kind = self.kind;
        let callback_tx = message_tx.clone();

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(move |msg: Message| {
                let tx = message_tx.clone();
                async move {
                    if !handler::is_dm(&msg) {
                        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
                        return respond(());
                    }
                    match handler::message_payload(&msg) {
                        Some(payload) => {
                            let event = handler::to_inbound_event(msg.chat.id, kind, payload);
                            if tx.send(event).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        None => debug!(msg_id = msg.id.0, "ignoring unsupported message type"),
                    }
                    respond(())
                }
            }))
            .branch(
                Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
                    let tx = callback_tx.clone();
                    async move {
                        // Stop the button's loading spinner whatever happens next.
                        if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                            debug!(error = %e, "failed to answer callback query");
                        }
                        if let Some(payload) = handler::callback_payload(&query) {
                            let chat = handler::callback_chat(&query);
                            let event = handler::to_inbound_event(chat, kind, payload);
                            if tx.send(event).await.is_err() {
                                warn!("inbound channel closed, dropping button press");
                            }
                        }
                        respond(())
                    }
                }),
            );

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {}) // Silently ignore other updates
            .build();
        self.shutdown_token = Some(dispatcher.shutdown_token());

        info!(kind = %kind, "starting Telegram long polling");
        tokio::spawn(async move {
            dispatcher.dispatch().await;
            info!(kind = %kind, "Telegram long polling stopped");
        });
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, EntoforceError> {
        let chat_id = parse_chat_id(&msg)?;
        let mut request = self.bot.send_message(chat_id, &msg.text);
        if let Some(markup) = keyboard::reply_markup(&msg) {
            request = request.reply_markup(markup);
        }

        let sent = request.await.map_err(|e| EntoforceError::Delivery {
            recipient: msg.recipient.to_string(),
            message: format!("failed to send message: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn receive(&self) -> Result<InboundEvent, EntoforceError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| EntoforceError::Internal("Telegram inbound channel closed".into()))
    }
}

/// Party IDs on Telegram are chat IDs.
fn parse_chat_id(msg: &OutboundMessage) -> Result<ChatId, EntoforceError> {
    msg.recipient
        .as_str()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| EntoforceError::Delivery {
            recipient: msg.recipient.to_string(),
            message: format!("invalid chat_id: {e}"),
            source: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entoforce_core::PartyId;

    fn config() -> TelegramConfig {
        TelegramConfig {
            client_bot_token: Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11".into()),
            technician_bot_token: None,
        }
    }

    #[test]
    fn new_requires_token_for_kind() {
        assert!(TelegramGateway::new(ConversationKind::ClientIntake, &config()).is_ok());
        let err = TelegramGateway::new(ConversationKind::TechnicianIntake, &config())
            .err()
            .unwrap();
        assert!(err.to_string().contains("telegram.technician_bot_token"));
    }

    #[test]
    fn new_rejects_empty_token() {
        let config = TelegramConfig {
            client_bot_token: Some(String::new()),
            technician_bot_token: None,
        };
        assert!(TelegramGateway::new(ConversationKind::ClientIntake, &config).is_err());
    }

    #[test]
    fn capabilities_and_metadata() {
        let gateway = TelegramGateway::new(ConversationKind::ClientIntake, &config()).unwrap();
        let caps = gateway.capabilities();
        assert!(caps.supports_choices);
        assert!(caps.supports_contact_request);
        assert_eq!(caps.max_message_length, Some(4096));
        assert_eq!(gateway.name(), "telegram");
        assert_eq!(gateway.adapter_type(), AdapterType::Gateway);
        assert_eq!(gateway.kind(), ConversationKind::ClientIntake);
    }

    #[test]
    fn chat_id_comes_from_recipient() {
        let msg = OutboundMessage::text(
            ConversationKind::ClientIntake,
            PartyId::new("12345"),
            "hello",
        );
        assert_eq!(parse_chat_id(&msg).unwrap(), ChatId(12345));

        let msg = OutboundMessage::text(
            ConversationKind::ClientIntake,
            PartyId::new("tech-ivan"),
            "hello",
        );
        assert!(matches!(
            parse_chat_id(&msg),
            Err(EntoforceError::Delivery { .. })
        ));
    }

    #[tokio::test]
    async fn receive_fails_once_the_handlers_are_gone() {
        let mut gateway = TelegramGateway::new(ConversationKind::ClientIntake, &config()).unwrap();
        // What connect() hands to the dispatcher; dropping it stands in for polling ending.
        drop(gateway.inbound_tx.take());

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), gateway.receive())
            .await
            .expect("receive should not wait on a closed channel");
        assert!(matches!(result, Err(EntoforceError::Internal(_))));
    }

    #[tokio::test]
    async fn shutdown_before_connect_is_a_noop() {
        let gateway = TelegramGateway::new(ConversationKind::ClientIntake, &config()).unwrap();
        gateway.shutdown().await.unwrap();
    }
}
