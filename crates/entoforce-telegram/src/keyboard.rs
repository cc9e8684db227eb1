// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply markup for outbound messages.

use entoforce_core::{ChoiceOption, OutboundMessage};
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    ReplyMarkup,
};

const SHARE_CONTACT_LABEL: &str = "Share phone number";

/// One button per row; values travel back as callback data.
pub fn inline_keyboard(choices: &[ChoiceOption]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(choices.iter().map(|choice| {
        [InlineKeyboardButton::callback(
            choice.label.clone(),
            choice.value.clone(),
        )]
    }))
}

/// A one-time keyboard whose single button shares the user's phone number.
pub fn contact_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new([[KeyboardButton::new(SHARE_CONTACT_LABEL).request(ButtonRequest::Contact)]])
        .resize_keyboard()
        .one_time_keyboard()
}

/// Markup for `msg`, if any. A contact request wins over choices.
pub fn reply_markup(msg: &OutboundMessage) -> Option<ReplyMarkup> {
    if msg.request_contact {
        Some(contact_keyboard().into())
    } else if !msg.choices.is_empty() {
        Some(inline_keyboard(&msg.choices).into())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entoforce_core::{ConversationKind, PartyId};
    use teloxide::types::InlineKeyboardButtonKind;

    fn message() -> OutboundMessage {
        OutboundMessage::text(
            ConversationKind::ClientIntake,
            PartyId::new("12345"),
            "How many insects have you found?",
        )
    }

    #[test]
    fn inline_keyboard_has_one_row_per_choice() {
        let markup = inline_keyboard(&[
            ChoiceOption::new("Just a few", "few"),
            ChoiceOption::new("Very many", "many"),
        ]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "Very many");
        assert!(matches!(
            &button.kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "many"
        ));
    }

    #[test]
    fn plain_message_has_no_markup() {
        assert!(reply_markup(&message()).is_none());
    }

    #[test]
    fn choices_become_inline_keyboard() {
        let msg = message().with_choices(vec![ChoiceOption::new("Yes", "yes")]);
        assert!(matches!(
            reply_markup(&msg),
            Some(ReplyMarkup::InlineKeyboard(_))
        ));
    }

    #[test]
    fn contact_request_becomes_reply_keyboard() {
        let mut msg = message();
        msg.request_contact = true;
        match reply_markup(&msg) {
            Some(ReplyMarkup::Keyboard(keyboard)) => {
                assert_eq!(keyboard.keyboard[0][0].text, SHARE_CONTACT_LABEL);
                assert!(keyboard.one_time_keyboard);
            }
            other => panic!("expected a reply keyboard, got {other:?}"),
        }
    }
}
