//! Analysis of `REQUEST` messages, i.e. new invitations and updates sent by the organizer

use async_trait::async_trait;

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::{Annotation, AnnotationHelper};
use crate::calendar_user::{Attendee, CalendarUser, EntityId, find_attendee, find_attendee_by_entity};
use crate::error::AnalysisError;
use crate::event::Event;
use crate::message::{ChangeAction, SchedulingMethod};
use crate::provider::ObjectResourceProvider;
use crate::sequence::{ITipSequence, matches_itip_revision};
use crate::session::CalendarSession;
use crate::utils;
use super::{SchedulingAnalyzer, add_part_stat_hints_and_actions, add_resource_part_stat_hints_and_actions,
    check_conflicts, comment_annotation, is_delegate_of, user_attendee};

pub struct RequestAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for RequestAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Request
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;
        let change_action = provider.itip_data().and_then(|data| data.action());
        let uses_organizer_copy = provider.uses_organizer_copy().await;

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let analyzed = match provider.opt_matching_event(&event).await? {
                Some(stored) => {
                    analyze_known_event(session, &helper, event, stored, originator, target_user, change_action, uses_organizer_copy).await?
                },
                None => {
                    let tombstone = provider.opt_matching_tombstone(&event).await?;
                    analyze_unknown_event(session, &helper, event, tombstone, originator, target_user, change_action, uses_organizer_copy).await
                },
            };
            changes.push(analyzed);
        }
        Ok(changes)
    }
}

#[allow(clippy::too_many_arguments)]
async fn analyze_unknown_event(session: &CalendarSession, helper: &AnnotationHelper<'_>, event: Event, tombstone: Option<Event>,
    originator: &CalendarUser, target_user: EntityId, change_action: Option<ChangeAction>, uses_organizer_copy: bool) -> AnalyzedChange
{
    let mut builder = AnalyzedChangeBuilder::new();

    let deleted = tombstone.as_ref()
        .map(|tombstone| ITipSequence::of(tombstone).after(&ITipSequence::of(&event)))
        .unwrap_or(false);
    if uses_organizer_copy || deleted {
        // The event has been removed from the organizer copy, or a newer revision has already been deleted
        log::debug!("{} is not stored (deleted: {}, organizer copy: {})", event, deleted, uses_organizer_copy);
        builder.annotate_all(introductions(helper, &event, tombstone.as_ref(), originator, target_user, change_action).await);
        builder.annotate(helper.deleted_meantime());
        builder.offer(&[Action::Ignore]);
        return builder.build(Change::new(ChangeType::Create, event, None));
    }

    builder.annotate_all(introductions(helper, &event, None, originator, target_user, change_action).await);
    if let Some(resource) = utils::opt_resource_sent_by(&event, originator).cloned() {
        builder.target(Some(resource.clone()));
        if !is_delegate_of(session, &resource).await {
            builder.annotate(helper.resource_not_delegate(resource.calendar_user()).await);
            builder.offer(&[Action::Ignore]);
            return builder.build(Change::new(ChangeType::Create, event, None));
        }
        // A booking delegate may add the event to the calendar of the resource
        let conflicts = check_conflicts(session, &event, Some(&resource)).await;
        builder.annotate(helper.save_manually(target_user).await);
        builder.offer(&[Action::ApplyCreate]);
        if let Some(entity) = resource.entity() {
            add_resource_part_stat_hints_and_actions(helper, &mut builder, &event, !conflicts.is_empty(), entity).await;
        }
        return builder.build(Change::new(ChangeType::Create, event, None).with_conflicts(conflicts));
    }

    let attendee = user_attendee(session, target_user).await;
    let conflicts = check_conflicts(session, &event, attendee.as_ref()).await;
    builder.annotate(helper.save_manually(target_user).await);
    builder.offer(&[Action::ApplyCreate]);
    builder.target(find_attendee_by_entity(event.attendees(), target_user).cloned());
    add_part_stat_hints_and_actions(helper, &mut builder, &event, !conflicts.is_empty(), target_user).await;
    builder.build(Change::new(ChangeType::Create, event, None).with_conflicts(conflicts))
}

#[allow(clippy::too_many_arguments)]
async fn analyze_known_event(session: &CalendarSession, helper: &AnnotationHelper<'_>, event: Event, stored: Event,
    originator: &CalendarUser, target_user: EntityId, change_action: Option<ChangeAction>, uses_organizer_copy: bool) -> Result<AnalyzedChange, AnalysisError>
{
    let mut builder = AnalyzedChangeBuilder::new();
    builder.annotate_all(introductions(helper, &event, Some(&stored), originator, target_user, change_action).await);

    let incoming_revision = ITipSequence::of(&event);
    let stored_revision = ITipSequence::of(&stored);

    if matches_itip_revision(&event, &stored) {
        // Already stored, most likely by the organizer or another attendee of this server
        let change_type = change_type(&event, change_action);
        if let Some(resource) = utils::opt_resource_sent_by(&event, originator).cloned() {
            let conflicts = check_conflicts(session, &event, Some(&resource)).await;
            builder.target(Some(resource.clone()));
            if !uses_organizer_copy {
                if let Some(entity) = resource.entity() {
                    builder.annotate(match change_type {
                        ChangeType::Create => helper.resource_saved(entity).await,
                        _ => helper.resource_updated(entity).await,
                    });
                }
            }
            let delegate = is_delegate_of(session, &resource).await;
            match resource.entity() {
                Some(entity) if delegate => {
                    add_resource_part_stat_hints_and_actions(helper, &mut builder, &stored, !conflicts.is_empty(), entity).await;
                },
                _ => {
                    builder.annotate(helper.resource_not_delegate(resource.calendar_user()).await);
                    builder.offer(&[Action::Ignore]);
                },
            }
            return Ok(builder.build(Change::new(change_type, event, Some(stored)).with_conflicts(conflicts)));
        }

        let attendee = user_attendee(session, target_user).await;
        let conflicts = check_conflicts(session, &event, attendee.as_ref()).await;
        builder.target(find_attendee_by_entity(event.attendees(), target_user).cloned());
        if !uses_organizer_copy {
            builder.annotate(match change_type {
                ChangeType::Create => helper.saved(target_user).await,
                _ => helper.updated(target_user).await,
            });
        }
        add_part_stat_hints_and_actions(helper, &mut builder, &stored, !conflicts.is_empty(), target_user).await;
        return Ok(builder.build(Change::new(change_type, event, Some(stored)).with_conflicts(conflicts)));
    }

    if stored_revision.after(&incoming_revision) {
        log::debug!("{} has been updated in the meantime ({} vs {})", event, stored_revision, incoming_revision);
        builder.annotate(helper.updated_meantime());
        builder.offer(&[Action::Ignore]);
        return Ok(builder.build(Change::new(ChangeType::Update, event, Some(stored))));
    }

    if stored_revision.before(&incoming_revision) {
        if utils::organizer_changed(stored.organizer(), event.organizer()) {
            builder.annotate(helper.organizer_changed());
            builder.offer(&[Action::Ignore]);
        }
        let attendee = user_attendee(session, target_user).await;
        let conflicts = check_conflicts(session, &event, attendee.as_ref()).await;
        builder.annotate(helper.update_manually(target_user).await);
        builder.target(find_attendee_by_entity(event.attendees(), target_user).cloned());
        builder.offer(&[Action::ApplyChange]);
        add_part_stat_hints_and_actions(helper, &mut builder, &event, !conflicts.is_empty(), target_user).await;
        return Ok(builder.build(Change::new(ChangeType::Update, event, Some(stored)).with_conflicts(conflicts)));
    }

    Err(AnalysisError::IllegalRevision { uid: event.uid().to_string(), incoming: incoming_revision, stored: stored_revision })
}

/// The change type, as told by the correlation token, or derived from the sequence
fn change_type(event: &Event, change_action: Option<ChangeAction>) -> ChangeType {
    match change_action {
        Some(ChangeAction::Create) => ChangeType::Create,
        Some(ChangeAction::Update) => ChangeType::Update,
        None if event.sequence() == 0 => ChangeType::Create,
        None => ChangeType::Update,
    }
}

async fn introductions(helper: &AnnotationHelper<'_>, event: &Event, stored: Option<&Event>,
    originator: &CalendarUser, target_user: EntityId, change_action: Option<ChangeAction>) -> Vec<Annotation>
{
    let action = change_action.unwrap_or(
        if stored.is_none() || event.sequence() == 0 { ChangeAction::Create } else { ChangeAction::Update }
    );
    let resource = utils::opt_resource_sent_by(event, originator);

    let mut annotations = Vec::new();
    let introduction = match action {
        ChangeAction::Create => {
            if let Some(delegator) = opt_delegator(event, target_user) {
                helper.delegated_introduction(event, originator, delegator.calendar_user(), target_user).await
            } else if let Some(resource) = resource {
                helper.resource_invited_introduction(event, originator, resource.calendar_user()).await
            } else if find_attendee_by_entity(event.attendees(), target_user).is_none() {
                helper.forwarded_introduction(event, originator, target_user).await
            } else {
                helper.invited_introduction(event, originator, target_user).await
            }
        },
        ChangeAction::Update => match resource {
            Some(resource) => helper.resource_changed_introduction(event, originator, resource.calendar_user()).await,
            None => helper.changed_introduction(event, originator),
        },
    };
    annotations.push(introduction);
    annotations.extend(comment_annotation(helper, event));
    annotations
}

/// The attendee that delegated their participation to the target user
fn opt_delegator(event: &Event, target_user: EntityId) -> Option<&Attendee> {
    let attendee = find_attendee_by_entity(event.attendees(), target_user)?;
    attendee.delegated_from().iter()
        .find_map(|delegator| find_attendee(event.attendees(), delegator))
}
