// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client intake conversation.
//!
//! `Name -> Greeted -> ObjectType -> InsectQuantity -> Experience -> Phone
//! -> Address -> commit`. `/start` at any point restarts from `Name`.
//! Commit goes through [`IntakeService::submit_order`], so the conversation
//! and the HTTP surface create orders the same way.

use std::sync::Arc;

use async_trait::async_trait;

use entoforce_config::model::IntakeConfig;
use entoforce_core::{ConversationKind, EntoforceError, EventPayload, PartyId};
use entoforce_dispatch::AssignOutcome;

use crate::flow::{ConversationFlow, Prompt, Transition};
use crate::intake::{IntakeService, OrderRequest};
use crate::options::{self, OptionSet};
use crate::validate;

const PICK_AN_OPTION: &str = "Please pick one of the options below.";
const TEXT_EXPECTED: &str = "Please answer with a text message.";

/// Where a client is in the intake, with everything collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIntake {
    AwaitingName,
    Greeted {
        name: String,
    },
    AwaitingObjectType {
        name: String,
    },
    AwaitingQuantity {
        name: String,
        object_type: &'static str,
    },
    AwaitingExperience {
        name: String,
        object_type: &'static str,
        insect_quantity: &'static str,
    },
    AwaitingPhone {
        name: String,
        object_type: &'static str,
        insect_quantity: &'static str,
        has_experience: bool,
    },
    AwaitingAddress {
        name: String,
        object_type: &'static str,
        insect_quantity: &'static str,
        has_experience: bool,
        phone: String,
    },
}

impl ClientIntake {
    pub fn tag(&self) -> &'static str {
        match self {
            ClientIntake::AwaitingName => "name",
            ClientIntake::Greeted { .. } => "greeted",
            ClientIntake::AwaitingObjectType { .. } => "object_type",
            ClientIntake::AwaitingQuantity { .. } => "insect_quantity",
            ClientIntake::AwaitingExperience { .. } => "experience",
            ClientIntake::AwaitingPhone { .. } => "phone",
            ClientIntake::AwaitingAddress { .. } => "address",
        }
    }

    /// The question asked on entering this state.
    pub fn prompt(&self) -> Prompt {
        match self {
            ClientIntake::AwaitingName => Prompt::new("Good afternoon! How should we address you?"),
            ClientIntake::Greeted { name } => Prompt::new(format!(
                "{name}, please answer a few questions so we can estimate the cost of pest control."
            ))
            .with_choices(options::choices(options::GREETING)),
            ClientIntake::AwaitingObjectType { .. } => {
                Prompt::new("Tell us more about the premises. You have:")
                    .with_choices(options::choices(options::OBJECT_TYPES))
            }
            ClientIntake::AwaitingQuantity { .. } => Prompt::new("How many insects have you found?")
                .with_choices(options::choices(options::INSECT_QUANTITIES)),
            ClientIntake::AwaitingExperience { .. } => {
                Prompt::new("Have you had pest control done before?")
                    .with_choices(options::choices(options::EXPERIENCE))
            }
            ClientIntake::AwaitingPhone { .. } => {
                Prompt::new("Please send your phone number:").requesting_contact()
            }
            ClientIntake::AwaitingAddress { .. } => Prompt::new("Please enter your home address:"),
        }
    }
}

type Step = Transition<ClientIntake, OrderRequest>;

fn enter(state: ClientIntake) -> Step {
    let prompt = state.prompt();
    Transition::Advance(state, prompt)
}

fn retry(state: ClientIntake, correction: impl Into<String>) -> Step {
    let prompt = state.prompt().retext(correction);
    Transition::Retry(state, prompt)
}

/// Text or button value, whichever the transport delivered.
fn answer(payload: &EventPayload) -> Option<&str> {
    match payload {
        EventPayload::Text(text) | EventPayload::Choice(text) => Some(text),
        _ => None,
    }
}

fn pick(set: OptionSet, payload: &EventPayload) -> Option<&'static str> {
    answer(payload).and_then(|input| options::resolve(set, input))
}

/// A new conversation only starts with `/start`.
pub fn open(payload: &EventPayload) -> Step {
    match payload {
        EventPayload::Start(_) => enter(ClientIntake::AwaitingName),
        _ => Transition::End(Some(Prompt::new(
            "Send /start to request pest control.",
        ))),
    }
}

/// One step of the client intake.
pub fn advance(state: ClientIntake, payload: EventPayload, config: &IntakeConfig) -> Step {
    if matches!(payload, EventPayload::Start(_)) {
        return enter(ClientIntake::AwaitingName);
    }

    match state {
        ClientIntake::AwaitingName => match &payload {
            EventPayload::Text(text) => match validate::validate_name(text) {
                Ok(name) => enter(ClientIntake::Greeted { name }),
                Err(e) => retry(ClientIntake::AwaitingName, e.user_message()),
            },
            _ => retry(ClientIntake::AwaitingName, TEXT_EXPECTED),
        },
        ClientIntake::Greeted { name } => match pick(options::GREETING, &payload) {
            Some(_) => enter(ClientIntake::AwaitingObjectType { name }),
            None => retry(ClientIntake::Greeted { name }, PICK_AN_OPTION),
        },
        ClientIntake::AwaitingObjectType { name } => match pick(options::OBJECT_TYPES, &payload) {
            Some(object_type) => enter(ClientIntake::AwaitingQuantity { name, object_type }),
            None => retry(ClientIntake::AwaitingObjectType { name }, PICK_AN_OPTION),
        },
        ClientIntake::AwaitingQuantity { name, object_type } => {
            match pick(options::INSECT_QUANTITIES, &payload) {
                Some(insect_quantity) => enter(ClientIntake::AwaitingExperience {
                    name,
                    object_type,
                    insect_quantity,
                }),
                None => retry(
                    ClientIntake::AwaitingQuantity { name, object_type },
                    PICK_AN_OPTION,
                ),
            }
        }
        ClientIntake::AwaitingExperience {
            name,
            object_type,
            insect_quantity,
        } => match pick(options::EXPERIENCE, &payload) {
            Some(value) => enter(ClientIntake::AwaitingPhone {
                name,
                object_type,
                insect_quantity,
                has_experience: value == "yes",
            }),
            None => retry(
                ClientIntake::AwaitingExperience {
                    name,
                    object_type,
                    insect_quantity,
                },
                PICK_AN_OPTION,
            ),
        },
        ClientIntake::AwaitingPhone {
            name,
            object_type,
            insect_quantity,
            has_experience,
        } => {
            let phone = match &payload {
                EventPayload::Contact(raw) | EventPayload::Text(raw) => {
                    validate::normalize_phone(raw, config)
                }
                _ => Err(EntoforceError::validation(
                    "phone",
                    "Please enter a valid phone number.",
                )),
            };
            match phone {
                Ok(phone) => enter(ClientIntake::AwaitingAddress {
                    name,
                    object_type,
                    insect_quantity,
                    has_experience,
                    phone,
                }),
                Err(e) => retry(
                    ClientIntake::AwaitingPhone {
                        name,
                        object_type,
                        insect_quantity,
                        has_experience,
                    },
                    e.user_message(),
                ),
            }
        }
        ClientIntake::AwaitingAddress {
            name,
            object_type,
            insect_quantity,
            has_experience,
            phone,
        } => {
            let address = match &payload {
                EventPayload::Text(text) => validate::validate_address(text, config),
                _ => Err(EntoforceError::validation(
                    "address",
                    "Please enter your home address.",
                )),
            };
            match address {
                Ok(address) => Transition::Commit(OrderRequest {
                    client_name: name,
                    phone,
                    address,
                    object_type: object_type.to_string(),
                    insect_quantity: insect_quantity.to_string(),
                    has_experience,
                }),
                Err(e) => retry(
                    ClientIntake::AwaitingAddress {
                        name,
                        object_type,
                        insect_quantity,
                        has_experience,
                        phone,
                    },
                    e.user_message(),
                ),
            }
        }
    }
}

/// Client intake wired to the order-creation entry point.
pub struct ClientIntakeFlow {
    intake: Arc<IntakeService>,
}

impl ClientIntakeFlow {
    pub fn new(intake: Arc<IntakeService>) -> Self {
        Self { intake }
    }
}

#[async_trait]
impl ConversationFlow for ClientIntakeFlow {
    type State = ClientIntake;
    type Output = OrderRequest;

    fn kind(&self) -> ConversationKind {
        ConversationKind::ClientIntake
    }

    fn describe(&self, state: &ClientIntake) -> &'static str {
        state.tag()
    }

    fn open(&self, payload: &EventPayload) -> Step {
        open(payload)
    }

    fn advance(&self, state: ClientIntake, payload: EventPayload) -> Step {
        advance(state, payload, self.intake.config())
    }

    async fn commit(
        &self,
        _party: &PartyId,
        request: OrderRequest,
    ) -> Result<Vec<Prompt>, EntoforceError> {
        let submission = self.intake.submit_order(request).await?;
        let text = match submission.outcome {
            AssignOutcome::Offered { .. } => format!(
                "Thank you! Your request #{} has been accepted and passed to a technician. We will contact you soon.",
                submission.order_id
            ),
            AssignOutcome::NoCapacity => format!(
                "Your request #{} has been accepted, but no technician is available yet. We will contact you later.",
                submission.order_id
            ),
        };
        Ok(vec![Prompt::new(text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> EventPayload {
        EventPayload::Text(s.to_string())
    }

    fn choice(s: &str) -> EventPayload {
        EventPayload::Choice(s.to_string())
    }

    fn next(step: Step) -> ClientIntake {
        match step {
            Transition::Advance(state, _) => state,
            other => panic!("expected advance, got {other:?}"),
        }
    }

    fn at_phone() -> ClientIntake {
        ClientIntake::AwaitingPhone {
            name: "Anna".into(),
            object_type: "apartment",
            insect_quantity: "many",
            has_experience: false,
        }
    }

    #[test]
    fn happy_path_commits_full_request() {
        let config = IntakeConfig::default();
        let mut state = next(open(&EventPayload::Start(None)));
        assert_eq!(state, ClientIntake::AwaitingName);

        for payload in [
            text("Anna"),
            choice("start"),
            choice("apartment"),
            choice("many"),
            choice("no"),
            EventPayload::Contact("+1 555 123 4567".into()),
        ] {
            state = next(advance(state, payload, &config));
        }
        assert_eq!(state.tag(), "address");

        match advance(state, text("12 Elm St"), &config) {
            Transition::Commit(request) => {
                assert_eq!(
                    request,
                    OrderRequest {
                        client_name: "Anna".into(),
                        phone: "15551234567".into(),
                        address: "12 Elm St".into(),
                        object_type: "apartment".into(),
                        insect_quantity: "many".into(),
                        has_experience: false,
                    }
                );
            }
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn invalid_phone_stays_in_phone_state() {
        let config = IntakeConfig::default();
        match advance(at_phone(), text("12-34"), &config) {
            Transition::Retry(state, prompt) => {
                assert_eq!(state, at_phone());
                assert_eq!(prompt.text, "Please enter a valid phone number.");
                assert!(prompt.request_contact);
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn short_address_is_rejected() {
        let config = IntakeConfig::default();
        let state = next(advance(at_phone(), text("5551234567"), &config));
        assert!(matches!(
            advance(state, text("abc"), &config),
            Transition::Retry(ClientIntake::AwaitingAddress { .. }, _)
        ));
    }

    #[test]
    fn labels_are_accepted_as_text() {
        let config = IntakeConfig::default();
        let state = ClientIntake::AwaitingObjectType { name: "Anna".into() };
        assert_eq!(
            next(advance(state, text("Private house"), &config)),
            ClientIntake::AwaitingQuantity {
                name: "Anna".into(),
                object_type: "house",
            }
        );
    }

    #[test]
    fn unknown_option_reprompts_with_the_same_choices() {
        let config = IntakeConfig::default();
        let state = ClientIntake::AwaitingExperience {
            name: "Anna".into(),
            object_type: "office",
            insect_quantity: "few",
        };
        match advance(state.clone(), choice("perhaps"), &config) {
            Transition::Retry(same, prompt) => {
                assert_eq!(same, state);
                assert_eq!(prompt.text, PICK_AN_OPTION);
                assert_eq!(prompt.choices.len(), 2);
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn start_restarts_from_name() {
        let config = IntakeConfig::default();
        assert_eq!(
            next(advance(at_phone(), EventPayload::Start(None), &config)),
            ClientIntake::AwaitingName
        );
    }

    #[test]
    fn only_start_opens_a_conversation() {
        assert!(matches!(open(&text("hello")), Transition::End(Some(_))));
    }
}
