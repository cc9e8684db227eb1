// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The contract a conversation has to fulfil to run on the [`ConversationEngine`].
//!
//! A flow is a tagged state type plus a pure `advance(state, event)` step.
//! Side effects happen only in [`ConversationFlow::commit`] and
//! [`ConversationFlow::intercept`], which the engine calls with the
//! conversation's mailbox still held, so per-party ordering is preserved.
//!
//! [`ConversationEngine`]: crate::engine::ConversationEngine

use async_trait::async_trait;

use entoforce_core::{
    ChoiceOption, ConversationKind, EntoforceError, EventPayload, OutboundMessage, PartyId,
};

/// A reply to the party, addressed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prompt {
    pub text: String,
    pub choices: Vec<ChoiceOption>,
    pub request_contact: bool,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_choices(mut self, choices: Vec<ChoiceOption>) -> Self {
        self.choices = choices;
        self
    }

    pub fn requesting_contact(mut self) -> Self {
        self.request_contact = true;
        self
    }

    /// The same buttons under a different text; used for correction messages.
    pub fn retext(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    pub fn into_message(self, kind: ConversationKind, recipient: PartyId) -> OutboundMessage {
        OutboundMessage {
            channel: kind,
            recipient,
            text: self.text,
            choices: self.choices,
            request_contact: self.request_contact,
        }
    }
}

/// Result of feeding one event to a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<S, O> {
    /// Move to `S` and send the prompt for it.
    Advance(S, Prompt),
    /// Input rejected. Stay in `S` and send a correction.
    Retry(S, Prompt),
    /// Final answer collected; hand `O` to [`ConversationFlow::commit`].
    Commit(O),
    /// No conversation afterwards. The prompt, if any, is still sent.
    End(Option<Prompt>),
}

/// What an intercepted event does to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Takeover<S> {
    /// Leave the active conversation (or its absence) as it is.
    Keep,
    /// Replace the active conversation with a fresh one in `S`.
    Begin(S),
    /// Drop the active conversation without committing.
    End,
}

/// Replies from an intercepted event plus its effect on the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intercepted<S> {
    pub replies: Vec<Prompt>,
    pub takeover: Takeover<S>,
}

impl<S> Intercepted<S> {
    pub fn reply(prompt: Prompt) -> Self {
        Self {
            replies: vec![prompt],
            takeover: Takeover::Keep,
        }
    }

    pub fn begin(state: S, prompt: Prompt) -> Self {
        Self {
            replies: vec![prompt],
            takeover: Takeover::Begin(state),
        }
    }

    pub fn end(prompt: Prompt) -> Self {
        Self {
            replies: vec![prompt],
            takeover: Takeover::End,
        }
    }
}

/// A conversation definition.
#[async_trait]
pub trait ConversationFlow: Send + Sync + 'static {
    /// Sum type over states; each variant carries the fields collected so far.
    type State: Send + Sync + 'static;
    /// What a finished conversation hands to `commit`.
    type Output: Send + 'static;

    fn kind(&self) -> ConversationKind;

    /// Short tag for a state, used in logs and for inspection.
    fn describe(&self, state: &Self::State) -> &'static str;

    /// Events handled outside the state machine (commands, action buttons).
    ///
    /// Returns `None` to pass the event on to [`open`](Self::open) or
    /// [`advance`](Self::advance).
    async fn intercept(
        &self,
        _party: &PartyId,
        _payload: &EventPayload,
        _active: Option<&Self::State>,
    ) -> Result<Option<Intercepted<Self::State>>, EntoforceError> {
        Ok(None)
    }

    /// An event arriving while no conversation is active.
    fn open(&self, payload: &EventPayload) -> Transition<Self::State, Self::Output>;

    /// An event arriving in `state`.
    fn advance(
        &self,
        state: Self::State,
        payload: EventPayload,
    ) -> Transition<Self::State, Self::Output>;

    /// Persist a finished conversation. The returned prompts go to the party.
    async fn commit(
        &self,
        party: &PartyId,
        output: Self::Output,
    ) -> Result<Vec<Prompt>, EntoforceError>;
}
