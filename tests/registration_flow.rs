mod common;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use common::*;
use volunteer_hub::core::{RegistrationId, ShiftId};
use volunteer_hub::infrastructure::VolunteerStore;
use volunteer_hub::models::{Event, EventStatus, Registration, Shift};
use volunteer_hub::services::{EventChanges, RegistrationNotifier};
use volunteer_hub::AppError;

struct RecordingNotifier {
    sent: mpsc::UnboundedSender<RegistrationId>,
}

#[async_trait]
impl RegistrationNotifier for RecordingNotifier {
    async fn registration_committed(
        &self,
        registration: &Registration,
        _shift: &Shift,
        _event: &Event,
    ) -> anyhow::Result<()> {
        self.sent.send(registration.id)?;
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl RegistrationNotifier for FailingNotifier {
    async fn registration_committed(
        &self,
        _registration: &Registration,
        _shift: &Shift,
        _event: &Event,
    ) -> anyhow::Result<()> {
        anyhow::bail!("mail relay unreachable")
    }
}

async fn shift_with_capacity(harness: &Harness, slug: &str, capacity: i32) -> ShiftId {
    let ctx = owner_context(harness, "Harbor Food Bank").await;
    let event = harness
        .state
        .events
        .create_event(&ctx, new_event(slug))
        .await
        .unwrap();
    harness
        .state
        .events
        .create_shift(&ctx, event.id, new_shift(1, capacity))
        .await
        .unwrap()
        .id
}

async fn filled(harness: &Harness, shift_id: ShiftId) -> i32 {
    harness.db.get_shift(shift_id).await.unwrap().unwrap().filled
}

#[tokio::test]
async fn test_email_differing_only_by_case_is_already_registered() {
    let harness = harness().await;
    let shift_id = shift_with_capacity(&harness, "beach-cleanup", 5).await;
    let workflow = &harness.state.registrations;

    let registration = workflow
        .register(shift_id, signup("Ada", "a@x.com"))
        .await
        .unwrap();
    assert_eq!(registration.email.as_str(), "a@x.com");
    assert_eq!(filled(&harness, shift_id).await, 1);

    let duplicate = workflow.register(shift_id, signup("Ada", "A@x.com")).await;
    assert!(matches!(duplicate, Err(AppError::AlreadyRegistered)));
    assert_eq!(filled(&harness, shift_id).await, 1);
    assert_eq!(harness.db.count_registrations(shift_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_full_shift_rejects_and_keeps_filled() {
    let harness = harness().await;
    let shift_id = shift_with_capacity(&harness, "pantry-restock", 2).await;
    let workflow = &harness.state.registrations;

    workflow.register(shift_id, signup("Ada", "ada@example.org")).await.unwrap();
    workflow.register(shift_id, signup("Grace", "grace@example.org")).await.unwrap();

    let third = workflow.register(shift_id, signup("Alan", "alan@example.org")).await;
    assert!(matches!(third, Err(AppError::ShiftFull)));
    assert_eq!(filled(&harness, shift_id).await, 2);
    // The rejected registration row was rolled back with the reservation
    assert_eq!(harness.db.count_registrations(shift_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_registrations_for_last_spot() {
    let harness = harness().await;
    let shift_id = shift_with_capacity(&harness, "last-spot", 1).await;
    let workflow = &harness.state.registrations;

    let (first, second) = tokio::join!(
        workflow.register(shift_id, signup("Ada", "ada@example.org")),
        workflow.register(shift_id, signup("Grace", "grace@example.org")),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::ShiftFull)))
            .count(),
        1
    );
    assert_eq!(filled(&harness, shift_id).await, 1);
}

#[tokio::test]
async fn test_concurrent_reserves_through_the_ledger() {
    let harness = harness().await;
    let shift_id = shift_with_capacity(&harness, "ledger-race", 1).await;
    let ledger = &harness.state.ledger;

    let (first, second) = tokio::join!(ledger.reserve(shift_id), ledger.reserve(shift_id));

    assert!(first.is_ok() != second.is_ok());
    assert!(matches!(first.err().or(second.err()), Some(AppError::ShiftFull)));
    assert_eq!(filled(&harness, shift_id).await, 1);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_any_write() {
    let harness = harness().await;
    let shift_id = shift_with_capacity(&harness, "validation", 3).await;
    let workflow = &harness.state.registrations;

    let result = workflow.register(shift_id, signup("Ada", "ada@example")).await;
    assert!(matches!(
        result,
        Err(AppError::ValidationFailed { field: "email", .. })
    ));

    let mut request = signup("Ada", "ada@example.org");
    request.phone = Some("12".into());
    let result = workflow.register(shift_id, request).await;
    assert!(matches!(
        result,
        Err(AppError::ValidationFailed { field: "phone", .. })
    ));

    assert_eq!(filled(&harness, shift_id).await, 0);
}

#[tokio::test]
async fn test_unknown_shift_is_not_found() {
    let harness = harness().await;
    let result = harness
        .state
        .registrations
        .register(ShiftId::new(), signup("Ada", "ada@example.org"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_cancelled_event_is_closed_for_registration() {
    let harness = harness().await;
    let ctx = owner_context(&harness, "Harbor Food Bank").await;
    let events = &harness.state.events;
    let event = events.create_event(&ctx, new_event("rained-out")).await.unwrap();
    let shift = events.create_shift(&ctx, event.id, new_shift(1, 4)).await.unwrap();

    events
        .update_event(
            &ctx,
            event.id,
            EventChanges {
                title: event.title.clone(),
                date: event.date,
                time: event.time.clone(),
                location: event.location.clone(),
                description: None,
                image_url: None,
                status: Some(EventStatus::Cancelled),
            },
        )
        .await
        .unwrap();

    let result = harness
        .state
        .registrations
        .register(shift.id, signup("Ada", "ada@example.org"))
        .await;
    assert!(matches!(result, Err(AppError::EventClosed)));
    assert_eq!(filled(&harness, shift.id).await, 0);
}

#[tokio::test]
async fn test_notifier_runs_after_commit() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let harness = harness_with_notifier(Arc::new(RecordingNotifier { sent: tx })).await;
    let shift_id = shift_with_capacity(&harness, "notify", 3).await;

    let registration = harness
        .state
        .registrations
        .register(shift_id, signup("Ada", "ada@example.org"))
        .await
        .unwrap();

    assert_eq!(rx.recv().await, Some(registration.id));
}

#[tokio::test]
async fn test_notifier_failure_does_not_undo_registration() {
    let harness = harness_with_notifier(Arc::new(FailingNotifier)).await;
    let shift_id = shift_with_capacity(&harness, "notify-fails", 3).await;

    harness
        .state
        .registrations
        .register(shift_id, signup("Ada", "ada@example.org"))
        .await
        .unwrap();
    tokio::task::yield_now().await;

    assert_eq!(filled(&harness, shift_id).await, 1);
}

#[tokio::test]
async fn test_cancel_registration_releases_the_spot() {
    let harness = harness().await;
    let ctx = owner_context(&harness, "Harbor Food Bank").await;
    let events = &harness.state.events;
    let event = events.create_event(&ctx, new_event("cancel-me")).await.unwrap();
    let shift = events.create_shift(&ctx, event.id, new_shift(1, 2)).await.unwrap();

    let registration = harness
        .state
        .registrations
        .register(shift.id, signup("Ada", "ada@example.org"))
        .await
        .unwrap();
    assert_eq!(filled(&harness, shift.id).await, 1);

    harness
        .state
        .registrations
        .cancel_registration(&ctx, registration.id)
        .await
        .unwrap();
    assert_eq!(filled(&harness, shift.id).await, 0);
    assert!(harness.db.get_registration(registration.id).await.unwrap().is_none());

    // The same email can sign up again once the spot is free
    harness
        .state
        .registrations
        .register(shift.id, signup("Ada", "ADA@example.org"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancel_from_another_organization_is_forbidden() {
    let harness = harness().await;
    let owner = owner_context(&harness, "Harbor Food Bank").await;
    let outsider = owner_context(&harness, "Riverside Shelter").await;
    let events = &harness.state.events;
    let event = events.create_event(&owner, new_event("guarded")).await.unwrap();
    let shift = events.create_shift(&owner, event.id, new_shift(1, 2)).await.unwrap();
    let registration = harness
        .state
        .registrations
        .register(shift.id, signup("Ada", "ada@example.org"))
        .await
        .unwrap();

    let result = harness
        .state
        .registrations
        .cancel_registration(&outsider, registration.id)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(filled(&harness, shift.id).await, 1);
}
