//! Analyses of complete scheduling messages, against an in-memory store

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::Duration;

use itip_analysis::analysis::Action;
use itip_analysis::analysis::ChangeType;
use itip_analysis::analysis::annotation::AnnotationKind;
use itip_analysis::calendar_user::{Attendee, CalendarUser, CalendarUserType, ParticipationStatus, SchedulingPrivilege};
use itip_analysis::event::{EventFlags, ExtendedProperty, RecurrenceId};
use itip_analysis::message::{Additional, ChangeAction, ITipData};
use itip_analysis::mock_behaviour::MockBehaviour;
use itip_analysis::error::AccessError;
use itip_analysis::permission::{self, Permissions};
use itip_analysis::{AnalysisError, CalendarObjectResource, Event, ITipAnalyzer, IncomingSchedulingMessage, SchedulingMethod};

use scenarii::*;

fn actions(list: &[Action]) -> BTreeSet<Action> {
    list.iter().copied().collect()
}

fn weekly_master(uid: &str) -> Event {
    Event::new(uid, start(), dtstamp())
        .with_id("50")
        .with_folder_id("cal-1")
        .with_end_date(start() + Duration::hours(1))
        .with_recurrence_rule("FREQ=WEEKLY")
        .with_summary("Weekly sync")
        .with_organizer(organizer())
        .with_attendees(vec![
            Attendee::new(organizer()).with_part_stat(ParticipationStatus::Accepted),
            Attendee::new(CalendarUser::new_internal(ALICE, "alice@example.com")).with_part_stat(ParticipationStatus::Accepted),
        ])
        .with_created(dtstamp(), ALICE)
}

fn full_access() -> Permissions {
    Permissions::READ_FOLDER | Permissions::CREATE | Permissions::WRITE_ALL | Permissions::DELETE_ALL
}


#[tokio::test]
async fn test_new_invitation() {
    let session = session(ALICE, base_store());
    let message = message(SchedulingMethod::Request, vec![invitation("review-1", 0)], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert_eq!(analysis.uid(), "review-1");
    assert!(analysis.original_resource().is_none());
    assert_eq!(analysis.changes().len(), 1);

    let change = analysis.main_change().unwrap();
    assert_eq!(change.change().change_type(), ChangeType::Create);
    assert_eq!(kinds(change), vec![AnnotationKind::Invited, AnnotationKind::SaveManually, AnnotationKind::PartStat]);
    assert_eq!(change.annotations()[0].message(), "Olga Organizer has invited you to the appointment \"Quarterly review\".");
    assert_eq!(change.actions(), &actions(&[Action::ApplyCreate, Action::Decline, Action::Tentative, Action::Accept]));
    assert_eq!(change.targeted_attendee().and_then(|attendee| attendee.entity()), Some(ALICE));

    // The incoming event has been prepared for Alice
    let new_event = change.change().new_event();
    assert_eq!(new_event.timezone(), Some("Europe/Berlin"));
    assert!(new_event.flags().contains(EventFlags::SCHEDULED | EventFlags::ATTENDEE));
    assert!(!new_event.flags().contains(EventFlags::ORGANIZER));
    assert!(session.warnings().is_empty());
}

#[tokio::test]
async fn test_invitation_with_conflict() {
    let store = base_store()
        .with_event(ALICE, Event::new("dentist", start() + Duration::minutes(30), dtstamp())
            .with_end_date(start() + Duration::minutes(90))
            .with_summary("Dentist"));
    let session = session(ALICE, store);
    let message = message(SchedulingMethod::Request, vec![invitation("review-1", 0)], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(change.change().conflicts().len(), 1);
    assert_eq!(change.change().conflicts()[0].uid(), "dentist");
    assert_eq!(kinds(change).last(), Some(&AnnotationKind::Conflicts));
    assert!(change.has_action(Action::AcceptAndIgnoreConflicts));
    assert!(!change.has_action(Action::Accept));
}

#[tokio::test]
async fn test_insufficient_permissions() {
    // Bob looks at a message for Alice, without any access to her calendar
    let session = session(BOB, base_store());
    let message = message(SchedulingMethod::Request, vec![invitation("review-1", 0)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert_eq!(analysis.method(), SchedulingMethod::Request);
    assert!(analysis.changes().is_empty());
    assert!(analysis.main_change().is_none());

    // Now with full access
    let session = scenarii::session(BOB, base_store().with_permissions("cal-1", BOB, full_access()));
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = analysis.main_change().unwrap();
    assert_eq!(change.annotations()[0].message(), "Olga Organizer has invited Alice Doe to the appointment \"Quarterly review\".");
    assert!(change.has_action(Action::ApplyCreate));
}

#[tokio::test]
async fn test_read_only_folder() {
    let store = base_store().with_permissions("cal-1", BOB, Permissions::READ_FOLDER | Permissions::READ_ALL);
    let session = session(BOB, store);

    let denied = permission::check_access(&session, ALICE, None).await;
    assert!(matches!(denied, Err(AccessError::MissingPermissions { .. })));
    assert!(!permission::has_access(&session, ALICE, None).await);

    let message = message(SchedulingMethod::Request, vec![invitation("review-1", 0)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert!(analysis.changes().is_empty());
}

#[tokio::test]
async fn test_own_rights_on_created_event() {
    let own_rights = Permissions::READ_FOLDER | Permissions::CREATE | Permissions::WRITE_OWN | Permissions::DELETE_OWN;
    let message = message(SchedulingMethod::Request, vec![invitation("review-9", 2)], organizer(), ALICE);

    // Bob put the appointment into Alice's calendar himself
    let store = base_store()
        .with_event(ALICE, stored_copy("review-9", 1).with_created(dtstamp(), BOB))
        .with_permissions("cal-1", BOB, own_rights);
    let session = session(BOB, store);
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert_eq!(analysis.changes().len(), 1);
    assert!(analysis.changes()[0].has_action(Action::ApplyChange));

    // Alice did
    let store = base_store()
        .with_event(ALICE, stored_copy("review-9", 1))
        .with_permissions("cal-1", BOB, own_rights);
    let session = scenarii::session(BOB, store);
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert!(analysis.changes().is_empty());
}

#[tokio::test]
async fn test_delegated_invitation() {
    let session = session(ALICE, base_store());
    let delegated = invitation("review-6", 0).with_attendees(vec![
        Attendee::new(organizer()).with_part_stat(ParticipationStatus::Accepted),
        Attendee::new(carol()).with_part_stat(ParticipationStatus::Delegated),
        Attendee::new(alice()).with_delegated_from(vec![carol()]),
    ]);
    let message = message(SchedulingMethod::Request, vec![delegated], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change)[0], AnnotationKind::Delegated);
    assert!(change.has_action(Action::ApplyCreate));
}

#[tokio::test]
async fn test_request_is_idempotent() {
    let session = session(ALICE, base_store().with_event(ALICE, stored_copy("review-2", 1)));
    let message = message(SchedulingMethod::Request, vec![invitation("review-2", 1)], organizer(), ALICE);

    let first = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let second = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert_eq!(first.changes(), second.changes());
    assert_eq!(first.original_resource().map(|resource| resource.uid()), Some("review-2"));

    let change = &first.changes()[0];
    assert_eq!(change.change().change_type(), ChangeType::Update);
    assert_eq!(kinds(change), vec![AnnotationKind::Changed, AnnotationKind::Updated, AnnotationKind::PartStat]);
    assert_eq!(change.annotations()[2].additional("partStat"), Some("ACCEPTED"));
    assert_eq!(change.actions(), &actions(&[Action::Decline, Action::Tentative, Action::Accept]));
    assert!(change.change().current_event().is_some());
}

#[tokio::test]
async fn test_change_action_from_correlation_token() {
    let session = session(ALICE, base_store().with_event(ALICE, stored_copy("review-2", 1)));
    let token = ITipData::new(SERVER_UID, CONTEXT_ID).with_action(ChangeAction::Create);
    let message = message(SchedulingMethod::Request, vec![invitation("review-2", 1)], organizer(), ALICE)
        .with_additional(Additional::ITipData(token));

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(change.change().change_type(), ChangeType::Create);
    assert_eq!(kinds(change), vec![AnnotationKind::Invited, AnnotationKind::Saved, AnnotationKind::PartStat]);

    // Tokens of other installations are ignored
    let foreign = ITipData::new("another-server", CONTEXT_ID).with_action(ChangeAction::Create);
    let message = scenarii::message(SchedulingMethod::Request, vec![invitation("review-2", 1)], organizer(), ALICE)
        .with_additional(Additional::ITipData(foreign));
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert_eq!(analysis.changes()[0].change().change_type(), ChangeType::Update);
}

#[tokio::test]
async fn test_request_update_and_outdated_request() {
    let session = session(ALICE, base_store().with_event(ALICE, stored_copy("review-2", 1)));

    let update = message(SchedulingMethod::Request, vec![invitation("review-2", 2)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &update).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Changed, AnnotationKind::UpdateManually, AnnotationKind::PartStat]);
    assert_eq!(change.actions(), &actions(&[Action::ApplyChange, Action::Decline, Action::Tentative, Action::Accept]));

    let outdated = message(SchedulingMethod::Request, vec![invitation("review-2", 0)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &outdated).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change).last(), Some(&AnnotationKind::UpdatedMeantime));
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
}

#[tokio::test]
async fn test_request_from_new_organizer() {
    let session = session(ALICE, base_store().with_event(ALICE, stored_copy("review-2", 1)));
    let hijacked = invitation("review-2", 2).with_organizer(CalendarUser::new("mallory@elsewhere.org"));
    let message = message(SchedulingMethod::Request, vec![hijacked], CalendarUser::new("mallory@elsewhere.org"), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert!(kinds(change).contains(&AnnotationKind::OrganizerChanged));
    assert!(change.has_action(Action::Ignore));
}

#[tokio::test]
async fn test_request_for_deleted_occurrence() {
    let deleted = RecurrenceId::new(start() + Duration::weeks(1));
    let master = weekly_master("weekly-1").with_delete_exception_dates(std::iter::once(deleted).collect());
    let session = session(ALICE, base_store().with_event(ALICE, master));

    // An occurrence update the organizer sent before the occurrence has been deleted
    let occurrence = invitation("weekly-1", 0)
        .with_recurrence_id(deleted)
        .with_start_date(deleted.value())
        .with_end_date(deleted.value() + Duration::hours(1))
        .with_dtstamp(dtstamp() - Duration::hours(1));
    let message = message(SchedulingMethod::Request, vec![occurrence], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Invited, AnnotationKind::DeletedMeantime]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
    assert!(session.warnings().is_empty());
}

#[tokio::test]
async fn test_split_series() {
    let store = base_store().with_event(ALICE, weekly_master("weekly-3-old"));
    let session = session(ALICE, store);
    let split = invitation("weekly-3", 0)
        .with_recurrence_rule("FREQ=WEEKLY")
        .with_extended_property(ExtendedProperty::new("X-OX-SPLIT-FROM", "weekly-3-old"));
    let message = message(SchedulingMethod::Request, vec![split], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert!(analysis.original_resource().is_none());
    assert_eq!(analysis.stored_related_resource().map(|resource| resource.uid()), Some("weekly-3-old"));
    assert!(analysis.changes()[0].has_action(Action::ApplyCreate));
}

#[tokio::test]
async fn test_resource_booking() {
    let booking = invitation("booking-1", 0).with_attendees(vec![
        Attendee::new(organizer()).with_part_stat(ParticipationStatus::Accepted),
        Attendee::new(room().with_sent_by(organizer())).with_cu_type(CalendarUserType::Room),
    ]);
    let message = message(SchedulingMethod::Request, vec![booking], organizer(), ALICE)
        .with_additional(Additional::ITipData(ITipData::new(SERVER_UID, CONTEXT_ID).with_sent_by_resource(ROOM)));

    // Alice manages the bookings of the room
    let store = base_store()
        .with_permissions("res-10", ALICE, full_access())
        .with_privilege(ROOM, ALICE, SchedulingPrivilege::Delegate);
    let session = scenarii::session(ALICE, store);
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::ResourceInvited, AnnotationKind::SaveManually, AnnotationKind::PartStat]);
    assert_eq!(change.actions(), &actions(&[Action::ApplyCreate, Action::Decline, Action::Tentative, Action::Accept]));
    assert_eq!(change.targeted_attendee().and_then(|attendee| attendee.entity()), Some(ROOM));

    // Booking the room is allowed, but does not make Alice a delegate
    let store = base_store()
        .with_permissions("res-10", ALICE, full_access())
        .with_privilege(ROOM, ALICE, SchedulingPrivilege::Book);
    let session = scenarii::session(ALICE, store);
    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::ResourceInvited, AnnotationKind::ResourceNotDelegate]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
}

#[tokio::test]
async fn test_cancel_already_applied() {
    let session = session(ALICE, base_store().with_tombstone(ALICE, stored_copy("review-3", 1)));
    let message = message(SchedulingMethod::Cancel, vec![invitation("review-3", 1)], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(change.change().change_type(), ChangeType::Delete);
    assert_eq!(kinds(change), vec![AnnotationKind::Canceled, AnnotationKind::CancelApplied]);
    assert!(change.actions().is_empty());
    assert_eq!(change.targeted_attendee().and_then(|attendee| attendee.entity()), Some(ALICE));
    assert!(session.warnings().is_empty());
}

#[tokio::test]
async fn test_stale_cancel() {
    // The event has been deleted after a newer update
    let session = session(ALICE, base_store().with_tombstone(ALICE, stored_copy("review-3", 2)));
    let message = message(SchedulingMethod::Cancel, vec![invitation("review-3", 1)], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Canceled, AnnotationKind::CancelApplied]);
    assert!(change.actions().is_empty());
    assert_eq!(session.warnings().len(), 1);
}

#[tokio::test]
async fn test_cancel_of_stored_event() {
    let session = session(ALICE, base_store().with_event(ALICE, stored_copy("review-3", 1)));
    let cancel = message(SchedulingMethod::Cancel, vec![invitation("review-3", 2)], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &cancel).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Canceled, AnnotationKind::ApplyCancelManually]);
    assert_eq!(change.actions(), &actions(&[Action::ApplyRemove]));

    let unknown = message(SchedulingMethod::Cancel, vec![invitation("review-404", 2)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &unknown).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Canceled, AnnotationKind::NotFound]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
}

#[tokio::test]
async fn test_cancel_of_deleted_occurrence() {
    let deleted = RecurrenceId::new(start() + Duration::weeks(2));
    let master = weekly_master("weekly-4").with_delete_exception_dates(std::iter::once(deleted).collect());
    let session = session(ALICE, base_store().with_event(ALICE, master));

    let occurrence = invitation("weekly-4", 0)
        .with_recurrence_id(deleted)
        .with_start_date(deleted.value())
        .with_end_date(deleted.value() + Duration::hours(1));
    let message = message(SchedulingMethod::Cancel, vec![occurrence], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    // Known through the delete exception dates of the series, not through a stored tombstone
    assert_eq!(kinds(change), vec![AnnotationKind::Canceled, AnnotationKind::CancelApplied]);
    assert_eq!(change.change().current_event().and_then(|tombstone| tombstone.recurrence_id()), Some(&deleted));
    assert!(change.actions().is_empty());
    assert!(session.warnings().is_empty());
}

#[tokio::test]
async fn test_cancel_of_resource_booking() {
    let booked = |sequence| invitation("booking-2", sequence).with_attendees(vec![
        Attendee::new(organizer()).with_part_stat(ParticipationStatus::Accepted),
        Attendee::new(room().with_sent_by(organizer())).with_cu_type(CalendarUserType::Room),
    ]);
    let store = base_store()
        .with_permissions("res-10", ALICE, full_access())
        .with_privilege(ROOM, ALICE, SchedulingPrivilege::Delegate)
        .with_tombstone(ROOM, booked(1).with_id("60").with_folder_id("res-10"));
    let session = session(ALICE, store);
    let message = message(SchedulingMethod::Cancel, vec![booked(1)], organizer(), ALICE)
        .with_additional(Additional::ITipData(ITipData::new(SERVER_UID, CONTEXT_ID).with_sent_by_resource(ROOM)));

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::ResourceCanceled, AnnotationKind::CancelApplied]);
    assert_eq!(change.annotations()[1].message(), "The booking has already been removed from the calendar of Room 1.");
    assert_eq!(change.targeted_attendee().and_then(|attendee| attendee.entity()), Some(ROOM));
    assert!(change.actions().is_empty());
}

#[tokio::test]
async fn test_cancel_on_organizer_copy() {
    let bob = CalendarUser::new_internal(BOB, "bob@example.com");
    let organizer_copy = Event::new("review-4", start(), dtstamp())
        .with_id("7")
        .with_folder_id("cal-2")
        .with_sequence(1)
        .with_organizer(bob.clone())
        .with_attendees(vec![
            Attendee::new(bob).with_part_stat(ParticipationStatus::Accepted),
            Attendee::new(CalendarUser::new_internal(ALICE, "alice@example.com")),
        ]);
    let store = base_store()
        .with_event(BOB, organizer_copy.clone())
        .with_tombstone(ALICE, organizer_copy.with_calendar_user(ALICE));
    let session = session(ALICE, store);

    let canceled = Event::new("review-4", start(), dtstamp())
        .with_sequence(1)
        .with_organizer(CalendarUser::new("bob@example.com"))
        .with_attendees(vec![Attendee::new(CalendarUser::new("bob@example.com")), Attendee::new(alice())]);
    let message = message(SchedulingMethod::Cancel, vec![canceled], CalendarUser::new("bob@example.com"), ALICE)
        .with_additional(Additional::ITipData(ITipData::new(SERVER_UID, CONTEXT_ID)));

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    // Nothing to tell: the organizer removed the shared copy themselves
    assert_eq!(kinds(change), vec![AnnotationKind::Canceled]);
    assert!(change.actions().is_empty());
}

#[tokio::test]
async fn test_replies() {
    let session = session(ALICE, base_store().with_event(ALICE, organized_by_alice("workshop-1")));
    let reply = |attendee: Attendee, sent| -> IncomingSchedulingMessage {
        let originator = attendee.calendar_user().clone();
        let event = Event::new("workshop-1", start(), sent)
            .with_organizer(alice())
            .with_attendees(vec![attendee]);
        message(SchedulingMethod::Reply, vec![event], originator, ALICE)
    };

    // Carol's acceptance has already been recorded
    let analysis = ITipAnalyzer::new().analyze(&session, &reply(Attendee::new(carol()).with_part_stat(ParticipationStatus::Accepted), dtstamp())).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Replied, AnnotationKind::ReplyApplied]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
    assert_eq!(change.targeted_attendee().map(|attendee| attendee.calendar_user()), Some(&carol()));

    // Carol changed her mind afterwards
    let later = dtstamp() + Duration::hours(1);
    let analysis = ITipAnalyzer::new().analyze(&session, &reply(Attendee::new(carol()).with_part_stat(ParticipationStatus::Declined), later)).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Replied, AnnotationKind::ApplyReplyManually]);
    assert_eq!(change.annotations()[0].additional("partStat"), Some("DECLINED"));
    assert_eq!(change.actions(), &actions(&[Action::ApplyResponse]));

    // Dave was never invited
    let dave = CalendarUser::new("dave@external.org");
    let analysis = ITipAnalyzer::new().analyze(&session, &reply(Attendee::new(dave).with_part_stat(ParticipationStatus::Accepted), later)).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Replied, AnnotationKind::ReplyUninvited]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore, Action::AcceptPartyCrasher]));
    assert!(session.warnings().is_empty());
}

#[tokio::test]
async fn test_reply_without_attendee() {
    let session = session(ALICE, base_store().with_event(ALICE, organized_by_alice("workshop-1")));
    let event = Event::new("workshop-1", start(), dtstamp()).with_organizer(alice());
    let message = message(SchedulingMethod::Reply, vec![event], carol(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    assert!(analysis.changes().is_empty());
    assert_eq!(session.warnings().len(), 1);
}

#[tokio::test]
async fn test_refresh() {
    let session = session(ALICE, base_store().with_event(ALICE, organized_by_alice("workshop-1")));
    let refresh = |requesting: CalendarUser| -> IncomingSchedulingMessage {
        let event = Event::new("workshop-1", start(), dtstamp())
            .with_organizer(alice())
            .with_attendees(vec![Attendee::new(requesting.clone())]);
        message(SchedulingMethod::Refresh, vec![event], requesting, ALICE)
    };

    let analysis = ITipAnalyzer::new().analyze(&session, &refresh(carol())).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::RefreshRequested, AnnotationKind::SendManually]);
    assert_eq!(change.actions(), &actions(&[Action::SendRefresh, Action::Ignore]));

    let analysis = ITipAnalyzer::new().analyze(&session, &refresh(CalendarUser::new("dave@external.org"))).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::RefreshRequested, AnnotationKind::RefreshUninvited]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
}

#[tokio::test]
async fn test_counter_proposals() {
    let session = session(ALICE, base_store().with_event(ALICE, organized_by_alice("workshop-2")));
    let proposal = Event::new("workshop-2", start() + Duration::days(1), dtstamp() + Duration::hours(1))
        .with_end_date(start() + Duration::days(1) + Duration::hours(1))
        .with_summary("Design workshop")
        .with_organizer(alice())
        .with_attendees(vec![Attendee::new(carol()).with_part_stat(ParticipationStatus::Accepted)]);

    // Google Calendar only ever proposes new times
    let google = with_prod_id(message(SchedulingMethod::Counter, vec![proposal.clone()], carol(), ALICE), GOOGLE_PRODID);
    let analysis = ITipAnalyzer::new().analyze(&session, &google).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::TimeProposed, AnnotationKind::ProposedTimes, AnnotationKind::ApplyCounterManually]);
    assert_eq!(change.actions(), &actions(&[Action::ApplyProposal, Action::DeclineCounter]));
    assert_eq!(change.targeted_attendee().map(|attendee| attendee.calendar_user()), Some(&carol()));

    let other = message(SchedulingMethod::Counter, vec![proposal.with_location("Room 2")], carol(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &other).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::ChangesProposed, AnnotationKind::CounterUnsupported]);
    assert_eq!(change.actions(), &actions(&[Action::DeclineCounter]));
}

#[tokio::test]
async fn test_counter_with_new_times() {
    // Alice has no timezone set on the stored copy, but her calendar has one
    let session = session(ALICE, base_store().with_event(ALICE, organized_by_alice("workshop-3")));
    let moved = start() + Duration::days(1);
    let proposal = Event::new("workshop-3", moved, dtstamp() + Duration::hours(1))
        .with_end_date(moved + Duration::hours(1))
        .with_summary("Design workshop")
        .with_organizer(alice())
        .with_attendees(vec![
            Attendee::new(alice()).with_part_stat(ParticipationStatus::Accepted),
            Attendee::new(carol()).with_part_stat(ParticipationStatus::Accepted).with_timestamp(dtstamp()),
        ]);

    let counter = message(SchedulingMethod::Counter, vec![proposal], carol(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &counter).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::TimeProposed, AnnotationKind::ProposedTimes, AnnotationKind::ApplyCounterManually]);
    assert_eq!(change.actions(), &actions(&[Action::ApplyProposal, Action::DeclineCounter]));
}

#[tokio::test]
async fn test_decline_counter() {
    let session = session(ALICE, base_store().with_event(ALICE, stored_copy("review-5", 2)));

    let declined = message(SchedulingMethod::DeclineCounter, vec![invitation("review-5", 2)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &declined).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::CounterDeclined, AnnotationKind::PartStat]);
    assert_eq!(change.actions(), &actions(&[Action::Decline, Action::Tentative, Action::Accept]));

    let updated = message(SchedulingMethod::DeclineCounter, vec![invitation("review-5", 3)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &updated).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::CounterDeclined, AnnotationKind::CounterDeclinedForUpdated]);
    assert_eq!(change.actions(), &actions(&[Action::RequestRefresh]));

    let unknown = message(SchedulingMethod::DeclineCounter, vec![invitation("review-404", 2)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &unknown).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::CounterDeclined, AnnotationKind::NotFound]);
    assert_eq!(change.actions(), &actions(&[Action::RequestRefresh, Action::Ignore]));
}

#[tokio::test]
async fn test_add_and_publish_are_unsupported() {
    let session = session(ALICE, base_store().with_event(ALICE, weekly_master("weekly-2")));
    let added = RecurrenceId::new(start() + Duration::days(2));
    let occurrence = invitation("weekly-2", 1).with_recurrence_id(added).with_start_date(added.value());

    let add = message(SchedulingMethod::Add, vec![occurrence], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &add).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::AddedOccurrence, AnnotationKind::AddUnsupported]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore, Action::RequestRefresh]));
    assert!(change.change().current_event().map(|master| master.is_series_master()).unwrap_or(false));

    let publish = message(SchedulingMethod::Publish, vec![invitation("newsletter", 0)], organizer(), ALICE);
    let analysis = ITipAnalyzer::new().analyze(&session, &publish).await.unwrap();
    let change = &analysis.changes()[0];
    assert_eq!(kinds(change), vec![AnnotationKind::Published, AnnotationKind::PublishUnsupported]);
    assert_eq!(change.actions(), &actions(&[Action::Ignore]));
}

#[tokio::test]
async fn test_storage_failure() {
    let behaviour = Arc::new(Mutex::new(MockBehaviour { lookup_behaviour: (0, 1), ..MockBehaviour::default() }));
    let session = session(ALICE, base_store().with_mock_behaviour(behaviour));
    let message = message(SchedulingMethod::Request, vec![invitation("review-1", 0)], organizer(), ALICE);

    let result = ITipAnalyzer::new().analyze(&session, &message).await;
    assert!(matches!(result, Err(AnalysisError::Storage(_))));

    // The failure was transient
    assert!(ITipAnalyzer::new().analyze(&session, &message).await.is_ok());
}

#[tokio::test]
async fn test_conflict_check_failure() {
    let behaviour = Arc::new(Mutex::new(MockBehaviour { check_conflicts_behaviour: (0, 1), ..MockBehaviour::default() }));
    let store = base_store()
        .with_event(ALICE, Event::new("dentist", start(), dtstamp()).with_end_date(start() + Duration::hours(1)))
        .with_mock_behaviour(behaviour);
    let session = session(ALICE, store);
    let message = message(SchedulingMethod::Request, vec![invitation("review-1", 0)], organizer(), ALICE);

    let analysis = ITipAnalyzer::new().analyze(&session, &message).await.unwrap();
    let change = &analysis.changes()[0];
    assert!(change.change().conflicts().is_empty());
    assert!(change.has_action(Action::Accept));
    assert_eq!(session.warnings().len(), 1);
}

#[tokio::test]
async fn test_empty_resource() {
    let empty = serde_json::from_value::<CalendarObjectResource>(serde_json::json!({ "events": [] }));
    let err = empty.unwrap_err();
    assert!(err.to_string().contains("does not contain any event"));

    let stored = serde_json::to_value(CalendarObjectResource::new(vec![invitation("review-1", 0)]).unwrap()).unwrap();
    let resource = serde_json::from_value::<CalendarObjectResource>(stored).unwrap();
    assert_eq!(resource.uid(), "review-1");
}
