// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Choice values attached to offer messages and parsed back from technician replies.

use std::fmt;
use std::str::FromStr;

use entoforce_core::{ChoiceOption, OrderId};

/// What a technician can do with an order from a message button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Accept(OrderId),
    Decline(OrderId),
    Complete(OrderId),
}

impl OfferAction {
    pub fn order_id(self) -> OrderId {
        match self {
            OfferAction::Accept(id) | OfferAction::Decline(id) | OfferAction::Complete(id) => id,
        }
    }

    /// The button carrying this action.
    pub fn choice(self) -> ChoiceOption {
        let label = match self {
            OfferAction::Accept(_) => "Accept",
            OfferAction::Decline(_) => "Decline",
            OfferAction::Complete(_) => "Mark completed",
        };
        ChoiceOption::new(label, self.to_string())
    }
}

impl fmt::Display for OfferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferAction::Accept(id) => write!(f, "accept:{id}"),
            OfferAction::Decline(id) => write!(f, "decline:{id}"),
            OfferAction::Complete(id) => write!(f, "complete:{id}"),
        }
    }
}

impl FromStr for OfferAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, id) = s.split_once(':').ok_or(())?;
        let id = OrderId(id.parse().map_err(|_| ())?);
        match verb {
            "accept" => Ok(OfferAction::Accept(id)),
            "decline" => Ok(OfferAction::Decline(id)),
            "complete" => Ok(OfferAction::Complete(id)),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_what_it_prints() {
        for action in [
            OfferAction::Accept(OrderId(7)),
            OfferAction::Decline(OrderId(8)),
            OfferAction::Complete(OrderId(9)),
        ] {
            assert_eq!(action.to_string().parse::<OfferAction>(), Ok(action));
        }
    }

    #[test]
    fn rejects_foreign_values() {
        assert!("apartment".parse::<OfferAction>().is_err());
        assert!("accept:x".parse::<OfferAction>().is_err());
        assert!("cancel:3".parse::<OfferAction>().is_err());
    }
}
