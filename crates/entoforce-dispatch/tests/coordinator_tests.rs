// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the offer protocol against real storage.
//!
//! Orders are created straight through the repository so every test decides
//! itself when `assign` runs.

use std::sync::Arc;

use entoforce_config::model::DispatchConfig;
use entoforce_core::{
    ClientContact, EntoforceError, FieldReport, IntakeDetails, NewOrder, OrderId, OrderStatus,
    PartyId,
};
use entoforce_dispatch::{AcceptOutcome, AssignOutcome, DeclineOutcome, OfferAction};
use entoforce_test_utils::TestHarness;
use tracing_test::traced_test;

async fn new_order(harness: &TestHarness, phone: &str) -> OrderId {
    let client = harness
        .repo
        .find_or_create_client_by_phone(&ClientContact {
            name: "Anna".to_string(),
            phone: phone.to_string(),
            address: "12 Elm St".to_string(),
        })
        .await
        .unwrap();
    harness
        .repo
        .create_order(&NewOrder {
            client_id: client.id,
            intake: IntakeDetails {
                object_type: "apartment".to_string(),
                insect_quantity: "many".to_string(),
                has_experience: false,
            },
        })
        .await
        .unwrap()
        .id
}

fn offered_to(outcome: &AssignOutcome) -> &str {
    match outcome {
        AssignOutcome::Offered { technician, .. } => technician.name.as_str(),
        AssignOutcome::NoCapacity => panic!("expected an offer, got {outcome:?}"),
    }
}

// ---- Assignment ----

#[tokio::test]
async fn assign_offers_to_idle_technician_and_takes_capacity() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;

    let outcome = harness.coordinator.assign(order_id).await.unwrap();
    match &outcome {
        AssignOutcome::Offered {
            technician,
            delivered,
        } => {
            assert_eq!(technician.id, ivan.id);
            assert_eq!(technician.load, 1);
            assert!(*delivered);
        }
        AssignOutcome::NoCapacity => panic!("expected an offer"),
    }

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Offered);
    assert_eq!(order.technician_id, Some(ivan.id));

    let ivan = harness.technician(ivan.id).await.unwrap();
    assert_eq!(ivan.load, 1);
    assert!(ivan.last_assigned.is_some());

    let offer = harness.gateway.last_to("tech-ivan").await.unwrap();
    assert!(offer.text.starts_with(&format!("New order #{order_id}.")));
    assert!(offer.text.contains("Address: 12 Elm St"));
    let values: Vec<_> = offer.choices.iter().map(|c| c.value.clone()).collect();
    assert_eq!(
        values,
        vec![
            OfferAction::Accept(order_id).to_string(),
            OfferAction::Decline(order_id).to_string(),
        ]
    );
}

#[tokio::test]
async fn assign_without_technicians_leaves_order_unassigned() {
    let harness = TestHarness::new().await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;

    let outcome = harness.coordinator.assign(order_id).await.unwrap();
    assert_eq!(outcome, AssignOutcome::NoCapacity);

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Unassigned);
    assert_eq!(order.technician_id, None);
    assert_eq!(harness.gateway.sent_count().await, 0);
}

#[tokio::test]
async fn assign_skips_unlinked_and_full_technicians() {
    let harness = TestHarness::new().await.unwrap();
    harness.add_unlinked_technician("ghost", 3).await.unwrap();
    harness.add_technician("busy", 1).await.unwrap();
    let first = new_order(&harness, "5550000001").await;
    let second = new_order(&harness, "5550000002").await;

    let outcome = harness.coordinator.assign(first).await.unwrap();
    assert_eq!(offered_to(&outcome), "busy");

    let outcome = harness.coordinator.assign(second).await.unwrap();
    assert_eq!(outcome, AssignOutcome::NoCapacity);
}

#[tokio::test]
async fn assign_prefers_the_longest_idle_technician() {
    let harness = TestHarness::new().await.unwrap();
    harness.add_technician("anna", 3).await.unwrap();
    harness.add_technician("boris", 3).await.unwrap();

    let first = new_order(&harness, "5550000001").await;
    let second = new_order(&harness, "5550000002").await;
    let third = new_order(&harness, "5550000003").await;

    let a = harness.coordinator.assign(first).await.unwrap();
    let b = harness.coordinator.assign(second).await.unwrap();
    let c = harness.coordinator.assign(third).await.unwrap();

    // Both start never-assigned; the ID breaks the tie, then recency rotates.
    assert_eq!(offered_to(&a), "anna");
    assert_eq!(offered_to(&b), "boris");
    assert_eq!(offered_to(&c), "anna");
}

#[tokio::test]
async fn assign_rejects_orders_already_offered() {
    let harness = TestHarness::new().await.unwrap();
    harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let err = harness.coordinator.assign(order_id).await.unwrap_err();
    assert!(matches!(
        err,
        EntoforceError::InvalidTransition {
            status: OrderStatus::Offered,
            ..
        }
    ));
}

#[tokio::test]
async fn assign_unknown_order_is_not_found() {
    let harness = TestHarness::new().await.unwrap();
    let err = harness.coordinator.assign(OrderId(404)).await.unwrap_err();
    assert!(matches!(err, EntoforceError::NotFound { entity: "order", .. }));
}

#[tokio::test]
#[traced_test]
async fn failed_offer_delivery_keeps_the_reservation() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    harness
        .gateway
        .fail_recipient(PartyId::new("tech-ivan"))
        .await;
    let order_id = new_order(&harness, "5551234567").await;

    let outcome = harness.coordinator.assign(order_id).await.unwrap();
    assert!(matches!(
        outcome,
        AssignOutcome::Offered {
            delivered: false,
            ..
        }
    ));
    assert!(logs_contain("delivery to technician failed"));

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Offered);
    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 1);
}

// ---- Accept / complete ----

#[tokio::test]
async fn accept_moves_order_in_progress_and_is_idempotent() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let first = harness.coordinator.accept(order_id, ivan.id).await.unwrap();
    assert!(matches!(first, AcceptOutcome::Accepted(_)));
    assert_eq!(first.order().status, OrderStatus::InProgress);

    let again = harness.coordinator.accept(order_id, ivan.id).await.unwrap();
    assert!(matches!(again, AcceptOutcome::AlreadyAccepted(_)));

    // Accepting twice does not take capacity twice.
    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 1);
    assert_eq!(
        harness.order(order_id).await.unwrap().status,
        OrderStatus::InProgress
    );
}

#[tokio::test]
async fn accept_by_another_technician_is_rejected() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let olga = harness.add_technician("olga", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    let outcome = harness.coordinator.assign(order_id).await.unwrap();
    assert_eq!(offered_to(&outcome), "ivan");

    let err = harness
        .coordinator
        .accept(order_id, olga.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EntoforceError::InvalidTransition { .. }));

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.technician_id, Some(ivan.id));
    assert_eq!(order.status, OrderStatus::Offered);
}

#[tokio::test]
async fn complete_returns_capacity_and_keeps_the_technician() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    // Completing before accepting is not allowed.
    let err = harness
        .coordinator
        .complete(order_id, ivan.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EntoforceError::InvalidTransition {
            status: OrderStatus::Offered,
            ..
        }
    ));

    harness.coordinator.accept(order_id, ivan.id).await.unwrap();
    let order = harness.coordinator.complete(order_id, ivan.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);

    let stored = harness.order(order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.technician_id, Some(ivan.id));
    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 0);
}

#[tokio::test]
async fn field_report_is_stored_on_accepted_order() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let report = FieldReport {
        chemical_type: "gel".to_string(),
        area: "45".to_string(),
        poison_type: "contact".to_string(),
        insect_type: "cockroaches".to_string(),
        estimated_cost: "120".to_string(),
    };

    // Not yet accepted.
    assert!(
        harness
            .coordinator
            .record_field_report(order_id, ivan.id, &report)
            .await
            .is_err()
    );

    harness.coordinator.accept(order_id, ivan.id).await.unwrap();
    harness
        .coordinator
        .record_field_report(order_id, ivan.id, &report)
        .await
        .unwrap();

    let stored = harness.order(order_id).await.unwrap();
    assert_eq!(stored.report, Some(report));
}

// ---- Decline / timeout ----

#[tokio::test]
async fn decline_reoffers_to_the_next_technician() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let olga = harness.add_technician("olga", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    let outcome = harness.coordinator.assign(order_id).await.unwrap();
    assert_eq!(offered_to(&outcome), "ivan");

    let outcome = harness.coordinator.decline(order_id, ivan.id).await.unwrap();
    match outcome {
        DeclineOutcome::Reoffered { technician, .. } => assert_eq!(technician.id, olga.id),
        other => panic!("expected a re-offer, got {other:?}"),
    }

    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 0);
    assert_eq!(harness.technician(olga.id).await.unwrap().load, 1);

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Offered);
    assert_eq!(order.technician_id, Some(olga.id));
    assert!(harness.gateway.last_to("tech-olga").await.is_some());
}

#[tokio::test]
async fn decline_with_nobody_else_leaves_order_unassigned() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let outcome = harness.coordinator.decline(order_id, ivan.id).await.unwrap();
    assert_eq!(outcome, DeclineOutcome::NoCapacity);

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Unassigned);
    assert_eq!(order.technician_id, None);
    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 0);
}

#[tokio::test]
async fn second_decline_exhausts_the_retry_budget() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let olga = harness.add_technician("olga", 3).await.unwrap();
    harness.add_technician("petr", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let outcome = harness.coordinator.decline(order_id, ivan.id).await.unwrap();
    assert!(matches!(outcome, DeclineOutcome::Reoffered { .. }));

    let outcome = harness.coordinator.decline(order_id, olga.id).await.unwrap();
    assert_eq!(outcome, DeclineOutcome::Exhausted);

    let order = harness.order(order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Declined);
    assert_eq!(order.technician_id, None);
    for tech in harness.repo.list_technicians().await.unwrap() {
        assert_eq!(tech.load, 0, "{} still holds capacity", tech.name);
    }

    // An explicit assign starts over, and may pick earlier decliners again.
    let outcome = harness.coordinator.assign(order_id).await.unwrap();
    assert!(matches!(outcome, AssignOutcome::Offered { .. }));
}

#[tokio::test]
async fn decline_budget_is_configurable() {
    let harness = TestHarness::builder()
        .with_dispatch(DispatchConfig {
            max_auto_reassignments: 0,
            ..DispatchConfig::default()
        })
        .build()
        .await
        .unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    harness.add_technician("olga", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let outcome = harness.coordinator.decline(order_id, ivan.id).await.unwrap();
    assert_eq!(outcome, DeclineOutcome::Exhausted);
}

#[tokio::test]
async fn decline_requires_the_offer_holder() {
    let harness = TestHarness::new().await.unwrap();
    harness.add_technician("ivan", 3).await.unwrap();
    let olga = harness.add_technician("olga", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let err = harness
        .coordinator
        .decline(order_id, olga.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EntoforceError::InvalidTransition { .. }));
}

#[tokio::test]
async fn timeout_notifies_and_reoffers() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let olga = harness.add_technician("olga", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();

    let outcome = harness
        .coordinator
        .decline_on_timeout(order_id)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        DeclineOutcome::Reoffered { ref technician, .. } if technician.id == olga.id
    ));

    let notice = harness.gateway.last_to("tech-ivan").await.unwrap();
    assert_eq!(notice.text, format!("Offer for order #{order_id} has expired."));
    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 0);
}

#[tokio::test]
async fn timeout_after_accept_is_rejected() {
    let harness = TestHarness::new().await.unwrap();
    let ivan = harness.add_technician("ivan", 3).await.unwrap();
    let order_id = new_order(&harness, "5551234567").await;
    harness.coordinator.assign(order_id).await.unwrap();
    harness.coordinator.accept(order_id, ivan.id).await.unwrap();

    let err = harness
        .coordinator
        .decline_on_timeout(order_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EntoforceError::InvalidTransition {
            status: OrderStatus::InProgress,
            ..
        }
    ));
    assert_eq!(harness.technician(ivan.id).await.unwrap().load, 1);
}

// ---- Concurrency ----

async fn race_for_last_slot(harness: TestHarness) {
    let tech = harness.add_technician("solo", 1).await.unwrap();
    let first = new_order(&harness, "5550000001").await;
    let second = new_order(&harness, "5550000002").await;

    let a = Arc::clone(&harness.coordinator);
    let b = Arc::clone(&harness.coordinator);
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.assign(first).await }),
        tokio::spawn(async move { b.assign(second).await }),
    );
    let outcomes = [ra.unwrap().unwrap(), rb.unwrap().unwrap()];

    let offered = outcomes
        .iter()
        .filter(|o| matches!(o, AssignOutcome::Offered { .. }))
        .count();
    let empty = outcomes
        .iter()
        .filter(|o| **o == AssignOutcome::NoCapacity)
        .count();
    assert_eq!((offered, empty), (1, 1));

    let tech = harness.technician(tech.id).await.unwrap();
    assert_eq!(tech.load, 1);

    let held: Vec<_> = harness
        .repo
        .list_orders(Some(OrderStatus::Offered))
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].technician_id, Some(tech.id));
    assert_eq!(
        harness
            .repo
            .list_orders(Some(OrderStatus::Unassigned))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assigns_never_overbook_sqlite() {
    for _ in 0..5 {
        race_for_last_slot(TestHarness::new().await.unwrap()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assigns_never_overbook_in_memory() {
    for _ in 0..5 {
        race_for_last_slot(TestHarness::builder().in_memory().build().await.unwrap()).await;
    }
}
