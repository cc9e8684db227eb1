// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Update decoding: Telegram messages and button presses to [`InboundEvent`]s.
//!
//! Only private chats are served. The chat ID doubles as the party ID, so
//! replies go back to the same chat.

use entoforce_core::{ConversationKind, EventPayload, InboundEvent, PartyId};
use teloxide::types::{CallbackQuery, ChatId, ChatKind, Message};

/// Checks whether the message is from a private (DM) chat.
///
/// Group, supergroup, and channel messages return `false`.
pub fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Decode a `/command [argument]` line. Non-command text returns `None`.
///
/// `/start@bot_name token` is accepted the same as `/start token`.
pub fn parse_command(text: &str) -> Option<EventPayload> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, argument) = match rest.split_once(char::is_whitespace) {
        Some((head, argument)) => (head, argument.trim()),
        None => (rest, ""),
    };
    let command = head.split('@').next().unwrap_or(head);

    match command.to_ascii_lowercase().as_str() {
        "start" => Some(EventPayload::Start(
            (!argument.is_empty()).then(|| argument.to_string()),
        )),
        "cancel" => Some(EventPayload::Cancel),
        _ => None,
    }
}

/// Payload of a chat message. Stickers, photos and the like yield `None`.
pub fn message_payload(msg: &Message) -> Option<EventPayload> {
    if let Some(contact) = msg.contact() {
        return Some(EventPayload::Contact(contact.phone_number.clone()));
    }

    let text = msg.text()?;
    Some(parse_command(text).unwrap_or_else(|| EventPayload::Text(text.to_string())))
}

/// The chat a button press came from.
///
/// Falls back to the sender's ID when the original message is no longer
/// accessible; in a private chat both are the same.
pub fn callback_chat(query: &CallbackQuery) -> ChatId {
    match &query.message {
        Some(message) => message.chat().id,
        None => ChatId(query.from.id.0 as i64),
    }
}

/// Payload of an inline button press: the button's option value.
pub fn callback_payload(query: &CallbackQuery) -> Option<EventPayload> {
    query
        .data
        .as_ref()
        .filter(|data| !data.is_empty())
        .map(|data| EventPayload::Choice(data.clone()))
}

pub fn to_inbound_event(chat: ChatId, kind: ConversationKind, payload: EventPayload) -> InboundEvent {
    InboundEvent::new(PartyId::new(chat.0.to_string()), kind, payload)
}
