// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic runner for [`ConversationFlow`]s.
//!
//! Each party gets a mailbox and one task that owns that party's state. The
//! task processes events strictly in arrival order and exits once the
//! conversation has ended and the mailbox is empty. Different parties run
//! independently.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Level, debug, error, info, warn};

use entoforce_core::{EntoforceError, EventPayload, MessagingGateway, PartyId};

use crate::flow::{ConversationFlow, Prompt, Takeover, Transition};

const CANCELLED_TEXT: &str = "Your request has been cancelled.";
const NOTHING_TO_CANCEL_TEXT: &str = "There is nothing to cancel.";

struct Envelope {
    payload: EventPayload,
    done: oneshot::Sender<()>,
}

struct Inner<F: ConversationFlow> {
    flow: F,
    gateway: Arc<dyn MessagingGateway>,
    mailboxes: DashMap<PartyId, mpsc::UnboundedSender<Envelope>>,
    states: DashMap<PartyId, &'static str>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Runs one flow for every party that talks to it.
pub struct ConversationEngine<F: ConversationFlow> {
    inner: Arc<Inner<F>>,
}

impl<F: ConversationFlow> ConversationEngine<F> {
    pub fn new(flow: F, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self {
            inner: Arc::new(Inner {
                flow,
                gateway,
                mailboxes: DashMap::new(),
                states: DashMap::new(),
                cancel: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn flow(&self) -> &F {
        &self.inner.flow
    }

    /// Queue an event for `party`. The receiver fires once it has been handled.
    ///
    /// After [`shutdown`](Self::shutdown) events are dropped and the receiver
    /// reports a closed channel.
    pub fn dispatch(&self, party: PartyId, payload: EventPayload) -> oneshot::Receiver<()> {
        let (done, handled) = oneshot::channel();
        if self.inner.cancel.is_cancelled() {
            debug!(party = %party, "engine stopped, event dropped");
            return handled;
        }

        let mut envelope = Envelope { payload, done };
        // Sends happen under the map entry so a task can only retire while
        // its mailbox is provably empty.
        match self.inner.mailboxes.entry(party.clone()) {
            Entry::Occupied(mut entry) => {
                if let Err(mpsc::error::SendError(returned)) = entry.get().send(envelope) {
                    envelope = returned;
                    let tx = self.spawn_mailbox(party);
                    let _ = tx.send(envelope);
                    entry.insert(tx);
                }
            }
            Entry::Vacant(entry) => {
                let tx = self.spawn_mailbox(party);
                let _ = tx.send(envelope);
                entry.insert(tx);
            }
        }
        handled
    }

    /// Queue an event and wait until it has been handled.
    pub async fn handle(&self, party: PartyId, payload: EventPayload) {
        let _ = self.dispatch(party, payload).await;
    }

    /// The state tag of `party`'s active conversation.
    pub fn current_state(&self, party: &PartyId) -> Option<&'static str> {
        self.inner.states.get(party).map(|tag| *tag)
    }

    /// Number of parties with an active conversation.
    pub fn active_conversations(&self) -> usize {
        self.inner.states.len()
    }

    /// Stop accepting events and wait for in-flight steps to finish.
    ///
    /// Active conversations are dropped; they are never persisted.
    pub async fn shutdown(&self) {
        let active = self.active_conversations();
        self.inner.cancel.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.mailboxes.clear();
        self.inner.states.clear();
        info!(kind = %self.inner.flow.kind(), dropped = active, "conversation engine stopped");
    }

    fn spawn_mailbox(&self, party: PartyId) -> mpsc::UnboundedSender<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(run_mailbox(inner, party, rx));
        tx
    }
}

async fn run_mailbox<F: ConversationFlow>(
    inner: Arc<Inner<F>>,
    party: PartyId,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
) {
    let mut state: Option<F::State> = None;
    loop {
        let envelope = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        state = inner.step(&party, state, envelope.payload).await;
        match &state {
            Some(current) => {
                inner
                    .states
                    .insert(party.clone(), inner.flow.describe(current));
            }
            None => {
                inner.states.remove(&party);
            }
        }
        let _ = envelope.done.send(());

        if state.is_none()
            && inner
                .mailboxes
                .remove_if(&party, |_, _| rx.is_empty())
                .is_some()
        {
            break;
        }
    }
}

impl<F: ConversationFlow> Inner<F> {
    async fn step(
        &self,
        party: &PartyId,
        state: Option<F::State>,
        payload: EventPayload,
    ) -> Option<F::State> {
        let kind = self.flow.kind();
        debug!(
            party = %party,
            kind = %kind,
            state = state.as_ref().map_or("idle", |s| self.flow.describe(s)),
            "conversation event"
        );

        if payload == EventPayload::Cancel {
            let text = if state.is_some() {
                info!(party = %party, kind = %kind, "conversation cancelled");
                CANCELLED_TEXT
            } else {
                NOTHING_TO_CANCEL_TEXT
            };
            self.reply(party, Prompt::new(text)).await;
            return None;
        }

        match self.flow.intercept(party, &payload, state.as_ref()).await {
            Ok(Some(intercepted)) => {
                for prompt in intercepted.replies {
                    self.reply(party, prompt).await;
                }
                return match intercepted.takeover {
                    Takeover::Keep => state,
                    Takeover::Begin(fresh) => Some(fresh),
                    Takeover::End => None,
                };
            }
            Ok(None) => {}
            Err(e) => {
                self.report_failure(party, &e).await;
                return state;
            }
        }

        let transition = match state {
            Some(current) => self.flow.advance(current, payload),
            None => self.flow.open(&payload),
        };

        match transition {
            Transition::Advance(next, prompt) => {
                self.reply(party, prompt).await;
                Some(next)
            }
            Transition::Retry(same, prompt) => {
                debug!(party = %party, kind = %kind, state = self.flow.describe(&same), "input rejected, re-prompting");
                self.reply(party, prompt).await;
                Some(same)
            }
            Transition::Commit(output) => {
                match self.flow.commit(party, output).await {
                    Ok(replies) => {
                        for prompt in replies {
                            self.reply(party, prompt).await;
                        }
                    }
                    Err(e) => self.report_failure(party, &e).await,
                }
                None
            }
            Transition::End(prompt) => {
                if let Some(prompt) = prompt {
                    self.reply(party, prompt).await;
                }
                None
            }
        }
    }

    async fn reply(&self, party: &PartyId, prompt: Prompt) {
        let msg = prompt.into_message(self.flow.kind(), party.clone());
        if let Err(e) = self.gateway.send(msg).await {
            warn!(party = %party, error = %e, "reply delivery failed");
        }
    }

    async fn report_failure(&self, party: &PartyId, e: &EntoforceError) {
        let kind = self.flow.kind();
        let level = failure_level(e);
        if level == Level::DEBUG {
            debug!(party = %party, error = %e, "request rejected");
        } else if level == Level::INFO {
            info!(party = %party, kind = %kind, error = %e, "request no longer applies");
        } else {
            error!(party = %party, kind = %kind, error = %e, "conversation step failed");
        }
        self.reply(party, Prompt::new(e.user_message())).await;
    }
}

/// Bad input and stale buttons are part of normal traffic; only the rest is
/// an operator problem.
fn failure_level(e: &EntoforceError) -> Level {
    match e {
        EntoforceError::Validation { .. } => Level::DEBUG,
        EntoforceError::InvalidTransition { .. } | EntoforceError::NotFound { .. } => Level::INFO,
        _ => Level::ERROR,
    }
}
