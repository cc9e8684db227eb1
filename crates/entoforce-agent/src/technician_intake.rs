// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Technician side of the bot.
//!
//! Outside the state machine: `/start <token>` links the sender to a
//! technician record, and the Accept, Decline and Mark completed buttons
//! drive the coordinator. Accepting starts the field report conversation:
//! `ChemicalType -> Area -> PoisonType -> InsectType -> EstimatedCost -> commit`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use entoforce_core::{
    ConversationKind, EntoforceError, EventPayload, FieldReport, Order, OrderId, PartyId,
    Technician, TechnicianId,
};
use entoforce_dispatch::{AcceptOutcome, Coordinator, DeclineOutcome, OfferAction};

use crate::flow::{ConversationFlow, Intercepted, Prompt, Takeover, Transition};
use crate::options::{self, OptionSet};
use crate::validate;

const PICK_AN_OPTION: &str = "Please pick one of the options below.";
const NOT_LINKED: &str =
    "Your account is not linked yet. Send /start followed by the token you received from the dispatcher.";

/// The order a report is being collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub order_id: OrderId,
    pub technician_id: TechnicianId,
}

/// Where a technician is in the field report, with everything collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechnicianIntake {
    AwaitingChemicalType {
        job: Job,
    },
    AwaitingArea {
        job: Job,
        chemical_type: &'static str,
    },
    AwaitingPoisonType {
        job: Job,
        chemical_type: &'static str,
        area: String,
    },
    AwaitingInsectType {
        job: Job,
        chemical_type: &'static str,
        area: String,
        poison_type: &'static str,
    },
    AwaitingEstimatedCost {
        job: Job,
        chemical_type: &'static str,
        area: String,
        poison_type: &'static str,
        insect_type: &'static str,
    },
}

impl TechnicianIntake {
    pub fn start(job: Job) -> Self {
        TechnicianIntake::AwaitingChemicalType { job }
    }

    pub fn job(&self) -> Job {
        match self {
            TechnicianIntake::AwaitingChemicalType { job }
            | TechnicianIntake::AwaitingArea { job, .. }
            | TechnicianIntake::AwaitingPoisonType { job, .. }
            | TechnicianIntake::AwaitingInsectType { job, .. }
            | TechnicianIntake::AwaitingEstimatedCost { job, .. } => *job,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TechnicianIntake::AwaitingChemicalType { .. } => "chemical_type",
            TechnicianIntake::AwaitingArea { .. } => "area",
            TechnicianIntake::AwaitingPoisonType { .. } => "poison_type",
            TechnicianIntake::AwaitingInsectType { .. } => "insect_type",
            TechnicianIntake::AwaitingEstimatedCost { .. } => "estimated_cost",
        }
    }

    pub fn prompt(&self) -> Prompt {
        match self {
            TechnicianIntake::AwaitingChemicalType { .. } => Prompt::new("Specify the chemical type.")
                .with_choices(options::choices(options::CHEMICAL_TYPES)),
            TechnicianIntake::AwaitingArea { .. } => {
                Prompt::new("Specify the area of the premises (sq. m).")
            }
            TechnicianIntake::AwaitingPoisonType { .. } => Prompt::new("Specify the poison type.")
                .with_choices(options::choices(options::POISON_TYPES)),
            TechnicianIntake::AwaitingInsectType { .. } => Prompt::new("Specify the insect type.")
                .with_choices(options::choices(options::INSECT_TYPES)),
            TechnicianIntake::AwaitingEstimatedCost { .. } => {
                Prompt::new("Specify the estimated cost.")
            }
        }
    }
}

/// A finished field report, ready to be written onto its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReport {
    pub job: Job,
    pub report: FieldReport,
}

type Step = Transition<TechnicianIntake, CompletedReport>;

fn enter(state: TechnicianIntake) -> Step {
    let prompt = state.prompt();
    Transition::Advance(state, prompt)
}

fn retry(state: TechnicianIntake, correction: impl Into<String>) -> Step {
    let prompt = state.prompt().retext(correction);
    Transition::Retry(state, prompt)
}

fn pick(set: OptionSet, payload: &EventPayload) -> Option<&'static str> {
    match payload {
        EventPayload::Text(input) | EventPayload::Choice(input) => options::resolve(set, input),
        _ => None,
    }
}

fn text(payload: &EventPayload) -> &str {
    match payload {
        EventPayload::Text(input) => input,
        _ => "",
    }
}

/// Messages outside a report are answered but start nothing.
pub fn open(_payload: &EventPayload) -> Step {
    Transition::End(Some(Prompt::new(
        "You have no report in progress. New orders will be offered here.",
    )))
}

/// One step of the field report.
pub fn advance(state: TechnicianIntake, payload: EventPayload) -> Step {
    match state {
        TechnicianIntake::AwaitingChemicalType { job } => {
            match pick(options::CHEMICAL_TYPES, &payload) {
                Some(chemical_type) => enter(TechnicianIntake::AwaitingArea { job, chemical_type }),
                None => retry(TechnicianIntake::AwaitingChemicalType { job }, PICK_AN_OPTION),
            }
        }
        TechnicianIntake::AwaitingArea { job, chemical_type } => {
            match validate::parse_area(text(&payload)) {
                Ok(area) => enter(TechnicianIntake::AwaitingPoisonType {
                    job,
                    chemical_type,
                    area,
                }),
                Err(e) => retry(
                    TechnicianIntake::AwaitingArea { job, chemical_type },
                    e.user_message(),
                ),
            }
        }
        TechnicianIntake::AwaitingPoisonType {
            job,
            chemical_type,
            area,
        } => match pick(options::POISON_TYPES, &payload) {
            Some(poison_type) => enter(TechnicianIntake::AwaitingInsectType {
                job,
                chemical_type,
                area,
                poison_type,
            }),
            None => retry(
                TechnicianIntake::AwaitingPoisonType {
                    job,
                    chemical_type,
                    area,
                },
                PICK_AN_OPTION,
            ),
        },
        TechnicianIntake::AwaitingInsectType {
            job,
            chemical_type,
            area,
            poison_type,
        } => match pick(options::INSECT_TYPES, &payload) {
            Some(insect_type) => enter(TechnicianIntake::AwaitingEstimatedCost {
                job,
                chemical_type,
                area,
                poison_type,
                insect_type,
            }),
            None => retry(
                TechnicianIntake::AwaitingInsectType {
                    job,
                    chemical_type,
                    area,
                    poison_type,
                },
                PICK_AN_OPTION,
            ),
        },
        TechnicianIntake::AwaitingEstimatedCost {
            job,
            chemical_type,
            area,
            poison_type,
            insect_type,
        } => match validate::parse_cost(text(&payload)) {
            Ok(estimated_cost) => Transition::Commit(CompletedReport {
                job,
                report: FieldReport {
                    chemical_type: chemical_type.to_string(),
                    area,
                    poison_type: poison_type.to_string(),
                    insect_type: insect_type.to_string(),
                    estimated_cost,
                },
            }),
            Err(e) => retry(
                TechnicianIntake::AwaitingEstimatedCost {
                    job,
                    chemical_type,
                    area,
                    poison_type,
                    insect_type,
                },
                e.user_message(),
            ),
        },
    }
}

/// Technician bot: account linking, offer buttons and the field report.
pub struct TechnicianIntakeFlow {
    coordinator: Arc<Coordinator>,
}

impl TechnicianIntakeFlow {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    async fn link(
        &self,
        party: &PartyId,
        token: Option<&str>,
    ) -> Result<Prompt, EntoforceError> {
        let repo = self.coordinator.repository();
        let address = party.as_str();

        let Some(token) = token else {
            return Ok(match repo.find_technician_by_address(address).await? {
                Some(technician) => Prompt::new(format!(
                    "Welcome back, {}! You are registered and can receive orders.",
                    technician.name
                )),
                None => Prompt::new(NOT_LINKED),
            });
        };

        let Some(technician) = repo.find_technician_by_token(token).await? else {
            warn!(party = %party, "link attempt with unknown token");
            return Ok(Prompt::new("Authorization failed: the token is not valid."));
        };

        match technician.channel_address.as_deref() {
            Some(linked) if linked == address => {
                return Ok(Prompt::new(format!(
                    "Welcome back, {}! You are already registered.",
                    technician.name
                )));
            }
            Some(_) => {
                warn!(party = %party, technician_id = %technician.id, "technician already linked to another account");
                return Ok(Prompt::new(
                    "This technician is already linked to another account.",
                ));
            }
            None => {}
        }

        if let Some(owner) = repo.find_technician_by_address(address).await? {
            warn!(party = %party, technician_id = %owner.id, "account already linked to another technician");
            return Ok(Prompt::new(
                "This account is already linked to another technician.",
            ));
        }

        repo.link_technician(technician.id, address).await?;
        info!(party = %party, technician_id = %technician.id, "technician linked");
        Ok(Prompt::new(format!(
            "Welcome, {}! You have been registered and can now receive orders.",
            technician.name
        )))
    }

    async fn act(
        &self,
        technician: &Technician,
        action: OfferAction,
        active: Option<&TechnicianIntake>,
    ) -> Result<Intercepted<TechnicianIntake>, EntoforceError> {
        let order_id = action.order_id();
        let active_job = active.map(TechnicianIntake::job);

        match action {
            OfferAction::Accept(_) => {
                if let Some(state) = active {
                    let job = state.job();
                    if job.order_id != order_id {
                        info!(%order_id, technician_id = %technician.id, busy_with = %job.order_id, "accept refused, report in progress");
                        return Ok(Intercepted::reply(Prompt::new(format!(
                            "Please finish the report for order #{} before accepting another order.",
                            job.order_id
                        ))));
                    }
                    return Ok(Intercepted {
                        replies: vec![
                            Prompt::new(format!("You have already accepted order #{order_id}.")),
                            state.prompt(),
                        ],
                        takeover: Takeover::Keep,
                    });
                }

                let job = Job {
                    order_id,
                    technician_id: technician.id,
                };
                match self.coordinator.accept(order_id, technician.id).await? {
                    AcceptOutcome::Accepted(_) => Ok(begin_report(job, "You accepted order")),
                    AcceptOutcome::AlreadyAccepted(order) if order.report.is_none() => {
                        Ok(begin_report(job, "You have already accepted order"))
                    }
                    AcceptOutcome::AlreadyAccepted(order) => Ok(Intercepted::reply(
                        completion_prompt(&order, "You have already accepted order"),
                    )),
                }
            }
            OfferAction::Decline(_) => {
                let outcome = self.coordinator.decline(order_id, technician.id).await?;
                if matches!(outcome, DeclineOutcome::Exhausted) {
                    info!(%order_id, "order left declined after retries");
                }
                Ok(Intercepted::reply(Prompt::new(format!(
                    "You declined order #{order_id}."
                ))))
            }
            OfferAction::Complete(_) => {
                self.coordinator.complete(order_id, technician.id).await?;
                let prompt = Prompt::new(format!("Order #{order_id} is marked completed. Thank you!"));
                if active_job.is_some_and(|job| job.order_id == order_id) {
                    Ok(Intercepted::end(prompt))
                } else {
                    Ok(Intercepted::reply(prompt))
                }
            }
        }
    }
}

fn begin_report(job: Job, lead: &str) -> Intercepted<TechnicianIntake> {
    let state = TechnicianIntake::start(job);
    let prompt = state.prompt();
    let prompt = prompt.retext(format!("{lead} #{}. {}", job.order_id, prompt.text));
    Intercepted::begin(state, prompt)
}

fn completion_prompt(order: &Order, lead: &str) -> Prompt {
    Prompt::new(format!(
        "{lead} #{}. Press the button when the work is done.",
        order.id
    ))
    .with_choices(vec![OfferAction::Complete(order.id).choice()])
}

#[async_trait]
impl ConversationFlow for TechnicianIntakeFlow {
    type State = TechnicianIntake;
    type Output = CompletedReport;

    fn kind(&self) -> ConversationKind {
        ConversationKind::TechnicianIntake
    }

    fn describe(&self, state: &TechnicianIntake) -> &'static str {
        state.tag()
    }

    async fn intercept(
        &self,
        party: &PartyId,
        payload: &EventPayload,
        active: Option<&TechnicianIntake>,
    ) -> Result<Option<Intercepted<TechnicianIntake>>, EntoforceError> {
        match payload {
            EventPayload::Start(token) => {
                let prompt = self.link(party, token.as_deref()).await?;
                Ok(Some(Intercepted::reply(prompt)))
            }
            EventPayload::Choice(value) => {
                let Ok(action) = value.parse::<OfferAction>() else {
                    return Ok(None);
                };
                let repo = self.coordinator.repository();
                match repo.find_technician_by_address(party.as_str()).await? {
                    Some(technician) => self.act(&technician, action, active).await.map(Some),
                    None => Ok(Some(Intercepted::reply(Prompt::new(NOT_LINKED)))),
                }
            }
            _ => Ok(None),
        }
    }

    fn open(&self, payload: &EventPayload) -> Step {
        open(payload)
    }

    fn advance(&self, state: TechnicianIntake, payload: EventPayload) -> Step {
        advance(state, payload)
    }

    async fn commit(
        &self,
        _party: &PartyId,
        completed: CompletedReport,
    ) -> Result<Vec<Prompt>, EntoforceError> {
        let CompletedReport { job, report } = completed;
        self.coordinator
            .record_field_report(job.order_id, job.technician_id, &report)
            .await?;
        Ok(vec![
            Prompt::new(format!("Report for order #{} saved.", job.order_id)),
            Prompt::new("Press the button when the work is done.")
                .with_choices(vec![OfferAction::Complete(job.order_id).choice()]),
        ])
    }
}
