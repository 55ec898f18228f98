//! Preparation of incoming events before they are compared to the stored ones

use crate::calendar_user::{EntityId, find_attendee, find_attendee_by_entity};
use crate::error::ServiceError;
use crate::event::{Event, EventFlags};
use crate::resource::CalendarObjectResource;
use crate::session::CalendarSession;

/// Returns a copy of an incoming event, with its calendar users resolved and its client flags set.
///
/// * when the event refers to the organizer copy, the internal entities of the stored event are transferred onto the incoming one
/// * otherwise, the timezones are adjusted, and only the calendar user and the session user may be resolved to internal entities
///
/// This never fails: in case of an error, a warning is added to the session and the unpatched event is returned.
pub async fn patch_event(session: &CalendarSession, event: &Event, stored: Option<&CalendarObjectResource>, calendar_user: EntityId, uses_organizer_copy: bool) -> Event {
    let original = stored.map(|resource| resource.first_event());
    match try_patch_event(session, event, original, calendar_user, uses_organizer_copy).await {
        Ok(patched) => patched,
        Err(err) => {
            session.add_warning(&format!("Unable to patch {}, falling back to the original representation: {}", event, err));
            event.clone()
        },
    }
}

async fn try_patch_event(session: &CalendarSession, event: &Event, original: Option<&Event>, calendar_user: EntityId, uses_organizer_copy: bool) -> Result<Event, ServiceError> {
    let mut patched = event.clone();
    let own_entities = [calendar_user, session.user()];
    let resolvable = if uses_organizer_copy {
        if let Some(original) = original {
            transfer_entities(original, &mut patched);
        }
        None
    } else {
        session.utilities().adjust_time_zones(calendar_user, &mut patched, original).await?;
        Some(&own_entities[..])
    };

    session.entities().prepare_attendees(patched.attendees_mut(), resolvable).await?;
    if let Some(organizer) = patched.organizer_mut() {
        session.entities().prepare_organizer(organizer, resolvable).await?;
    }
    let flags = flags(&patched, calendar_user, session.user());
    patched.set_flags(flags);
    Ok(patched)
}

/// Copies the entities of the internal calendar users of `original` onto their external counterparts in `event`
fn transfer_entities(original: &Event, event: &mut Event) {
    if let (Some(stored_organizer), Some(organizer)) = (original.organizer(), event.organizer()) {
        if stored_organizer.is_internal() && !organizer.is_internal() && organizer.matches(stored_organizer) {
            let entity = stored_organizer.entity();
            if let Some(organizer) = event.organizer_mut() {
                organizer.set_entity(entity);
            }
        }
    }

    for attendee in event.attendees_mut().iter_mut() {
        if attendee.calendar_user().is_internal() {
            continue;
        }
        let entity = find_attendee(original.attendees(), attendee.calendar_user())
            .and_then(|stored_attendee| stored_attendee.entity());
        if entity.is_some() {
            attendee.calendar_user_mut().set_entity(entity);
        }
    }
}

/// The flags of an event, as seen by `calendar_user` in a session of `session_user`
pub fn flags(event: &Event, calendar_user: EntityId, session_user: EntityId) -> EventFlags {
    let mut flags = EventFlags::empty();
    if event.is_group_scheduled() {
        flags.insert(EventFlags::SCHEDULED);
    }
    if event.organizer().and_then(|organizer| organizer.entity()) == Some(calendar_user) {
        flags.insert(EventFlags::ORGANIZER);
        if calendar_user != session_user {
            flags.insert(EventFlags::ORGANIZER_ON_BEHALF);
        }
    }
    if find_attendee_by_entity(event.attendees(), calendar_user).is_some() {
        flags.insert(EventFlags::ATTENDEE);
        if calendar_user != session_user {
            flags.insert(EventFlags::ATTENDEE_ON_BEHALF);
        }
    }
    if event.recurrence_rule().is_some() || event.recurrence_id().is_some() {
        flags.insert(EventFlags::SERIES);
    }
    if event.recurrence_id().is_some() {
        flags.insert(EventFlags::OVERRIDDEN);
    }
    flags
}
