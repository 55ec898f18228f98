//! Human-readable statements about an analyzed change

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Datelike, Utc};

use crate::calendar_user::{Attendee, CalendarUser, EntityId, ParticipantRole, ParticipationStatus, find_attendee_by_entity};
use crate::event::Event;
use crate::session::CalendarSession;
use crate::utils;

/// What an annotation is about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Invited,
    Forwarded,
    Delegated,
    ResourceInvited,
    Changed,
    ResourceChanged,
    Replied,
    ResourceReplied,
    Canceled,
    ResourceCanceled,
    AddedOccurrence,
    RefreshRequested,
    TimeProposed,
    ChangesProposed,
    CounterDeclined,
    Published,

    Comment,
    ProposedTimes,
    OrganizerChanged,
    ParticipationOptional,
    PartStat,
    NotAttending,
    Conflicts,
    SaveManually,
    UpdateManually,
    Saved,
    Updated,
    ResourceNotDelegate,
    UpdatedMeantime,
    DeletedMeantime,
    ReplyOutdated,
    ReplyUninvited,
    ReplyDelegated,
    ReplyApplied,
    ApplyReplyManually,
    NotFound,
    CancelApplied,
    ApplyCancelManually,
    AddUnsupported,
    RefreshUninvited,
    SendManually,
    CounterUninvited,
    CounterOutdated,
    ApplyCounterManually,
    CounterUnsupported,
    CounterDeclinedForUpdated,
    PublishUnsupported,
}

impl AnnotationKind {
    /// A stable identifier, e.g. for clients that translate the annotations themselves
    pub fn key(&self) -> &'static str {
        match self {
            AnnotationKind::Invited => "invited",
            AnnotationKind::Forwarded => "forwarded",
            AnnotationKind::Delegated => "delegated",
            AnnotationKind::ResourceInvited => "resource_invited",
            AnnotationKind::Changed => "changed",
            AnnotationKind::ResourceChanged => "resource_changed",
            AnnotationKind::Replied => "replied",
            AnnotationKind::ResourceReplied => "resource_replied",
            AnnotationKind::Canceled => "canceled",
            AnnotationKind::ResourceCanceled => "resource_canceled",
            AnnotationKind::AddedOccurrence => "added_occurrence",
            AnnotationKind::RefreshRequested => "refresh_requested",
            AnnotationKind::TimeProposed => "time_proposed",
            AnnotationKind::ChangesProposed => "changes_proposed",
            AnnotationKind::CounterDeclined => "counter_declined",
            AnnotationKind::Published => "published",
            AnnotationKind::Comment => "comment",
            AnnotationKind::ProposedTimes => "proposed_times",
            AnnotationKind::OrganizerChanged => "organizer_changed",
            AnnotationKind::ParticipationOptional => "participation_optional",
            AnnotationKind::PartStat => "part_stat",
            AnnotationKind::NotAttending => "not_attending",
            AnnotationKind::Conflicts => "conflicts",
            AnnotationKind::SaveManually => "save_manually",
            AnnotationKind::UpdateManually => "update_manually",
            AnnotationKind::Saved => "saved",
            AnnotationKind::Updated => "updated",
            AnnotationKind::ResourceNotDelegate => "resource_not_delegate",
            AnnotationKind::UpdatedMeantime => "updated_meantime",
            AnnotationKind::DeletedMeantime => "deleted_meantime",
            AnnotationKind::ReplyOutdated => "reply_outdated",
            AnnotationKind::ReplyUninvited => "reply_uninvited",
            AnnotationKind::ReplyDelegated => "reply_delegated",
            AnnotationKind::ReplyApplied => "reply_applied",
            AnnotationKind::ApplyReplyManually => "apply_reply_manually",
            AnnotationKind::NotFound => "not_found",
            AnnotationKind::CancelApplied => "cancel_applied",
            AnnotationKind::ApplyCancelManually => "apply_cancel_manually",
            AnnotationKind::AddUnsupported => "add_unsupported",
            AnnotationKind::RefreshUninvited => "refresh_uninvited",
            AnnotationKind::SendManually => "send_manually",
            AnnotationKind::CounterUninvited => "counter_uninvited",
            AnnotationKind::CounterOutdated => "counter_outdated",
            AnnotationKind::ApplyCounterManually => "apply_counter_manually",
            AnnotationKind::CounterUnsupported => "counter_unsupported",
            AnnotationKind::CounterDeclinedForUpdated => "counter_declined_for_updated",
            AnnotationKind::PublishUnsupported => "publish_unsupported",
        }
    }

    /// Whether this annotation introduces a change (who sent what)
    pub fn is_introduction(&self) -> bool {
        matches!(self,
            AnnotationKind::Invited | AnnotationKind::Forwarded | AnnotationKind::Delegated | AnnotationKind::ResourceInvited
            | AnnotationKind::Changed | AnnotationKind::ResourceChanged | AnnotationKind::Replied | AnnotationKind::ResourceReplied
            | AnnotationKind::Canceled | AnnotationKind::ResourceCanceled | AnnotationKind::AddedOccurrence
            | AnnotationKind::RefreshRequested | AnnotationKind::TimeProposed | AnnotationKind::ChangesProposed
            | AnnotationKind::CounterDeclined | AnnotationKind::Published)
    }
}

/// Which part of a recurring series an event describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Single,
    Series,
    Occurrence,
}

impl Scope {
    pub fn of(event: &Event) -> Self {
        if event.recurrence_id().is_some() {
            Scope::Occurrence
        } else if event.recurrence_rule().is_some() {
            Scope::Series
        } else {
            Scope::Single
        }
    }
}


/// A statement about an analyzed change
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    kind: AnnotationKind,
    /// The rendered statement
    message: String,
    /// The values inserted in the statement (names, summaries...)
    args: Vec<String>,
    additionals: BTreeMap<String, String>,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, message: String, args: Vec<String>) -> Self {
        Self { kind, message, args, additionals: BTreeMap::new() }
    }

    pub fn with_additional(mut self, key: &str, value: &str) -> Self {
        self.additionals.insert(key.to_string(), value.to_string());
        self
    }

    pub fn kind(&self) -> AnnotationKind { self.kind }
    pub fn message(&self) -> &str { &self.message }
    pub fn args(&self) -> &[String] { &self.args }
    pub fn additional(&self, key: &str) -> Option<&str> {
        self.additionals.get(key).map(|v| v.as_str())
    }
}

impl Display for Annotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}


fn appointment(scope: Scope, summary: &str) -> String {
    match scope {
        Scope::Single => format!("the appointment \"{}\"", summary),
        Scope::Series => format!("the appointment series \"{}\"", summary),
        Scope::Occurrence => format!("an occurrence of the appointment \"{}\"", summary),
    }
}

fn calendar_of(owner: &Option<String>) -> String {
    match owner {
        None => "your calendar".to_string(),
        Some(name) => format!("the calendar of {}", name),
    }
}

fn replied_verb(part_stat: &ParticipationStatus) -> &'static str {
    match part_stat {
        ParticipationStatus::Accepted => "accepted",
        ParticipationStatus::Tentative => "tentatively accepted",
        ParticipationStatus::Declined => "declined",
        ParticipationStatus::Delegated => "delegated",
        _ => "not yet replied to",
    }
}

fn format_range(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> String {
    let start_text = start.format("%a, %-d %b %Y %H:%M").to_string();
    match end {
        None => start_text,
        Some(end) if (end.year(), end.ordinal()) == (start.year(), start.ordinal()) => format!("{} - {}", start_text, end.format("%H:%M")),
        Some(end) => format!("{} - {}", start_text, end.format("%a, %-d %b %Y %H:%M")),
    }
}


/// Builds the annotations, resolving the names of the involved calendar users
pub struct AnnotationHelper<'a> {
    session: &'a CalendarSession,
    timezone: String,
}

impl<'a> AnnotationHelper<'a> {
    pub async fn new(session: &'a CalendarSession) -> AnnotationHelper<'a> {
        let locale = utils::locale(session).await;
        if !locale.starts_with("en") {
            log::debug!("No annotations available for locale {}, using English ones", locale);
        }
        let timezone = utils::timezone(session).await;
        Self { session, timezone }
    }

    /// The display name of an internal entity
    async fn entity_name(&self, entity: EntityId) -> String {
        match self.session.entities().display_name(entity).await {
            Ok(name) => name,
            Err(err) => {
                self.session.add_warning(&format!("Unable to get the display name of entity {}: {}", entity, err));
                format!("#{}", entity)
            },
        }
    }

    /// The display name of a resource, which is preferably resolved from the server
    async fn resource_name(&self, resource: &CalendarUser) -> String {
        match resource.entity() {
            Some(entity) => self.entity_name(entity).await,
            None => resource.display_name(),
        }
    }

    /// `None` when the target user is the session user, the name of the target user otherwise
    async fn owner(&self, target_user: EntityId) -> Option<String> {
        if target_user == self.session.user() {
            None
        } else {
            Some(self.entity_name(target_user).await)
        }
    }

    fn sender(originator: &CalendarUser) -> (String, Vec<String>) {
        match originator.sent_by() {
            Some(sent_by) => (
                format!("{} on behalf of {}", sent_by.display_name(), originator.display_name()),
                vec![sent_by.display_name(), originator.display_name()],
            ),
            None => (originator.display_name(), vec![originator.display_name()]),
        }
    }

    fn build(kind: AnnotationKind, message: String, args: Vec<String>) -> Annotation {
        Annotation::new(kind, message, args)
    }


    pub async fn invited_introduction(&self, event: &Event, originator: &CalendarUser, target_user: EntityId) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        let owner = self.owner(target_user).await;
        let whom = owner.clone().unwrap_or_else(|| "you".to_string());
        args.push(summary.clone());
        args.extend(owner);
        Self::build(AnnotationKind::Invited, format!("{} has invited {} to {}.", sender, whom, appointment(Scope::of(event), &summary)), args)
    }

    pub async fn forwarded_introduction(&self, event: &Event, originator: &CalendarUser, target_user: EntityId) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        let owner = self.owner(target_user).await;
        let whom = owner.clone().unwrap_or_else(|| "you".to_string());
        args.push(summary.clone());
        args.extend(owner);
        Self::build(AnnotationKind::Forwarded, format!("{} has forwarded {} to {}.", sender, appointment(Scope::of(event), &summary), whom), args)
    }

    pub async fn delegated_introduction(&self, event: &Event, originator: &CalendarUser, delegator: &CalendarUser, target_user: EntityId) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let owner = self.owner(target_user).await;
        let whom = owner.clone().unwrap_or_else(|| "you".to_string());
        let mut args = vec![delegator.display_name(), summary.clone(), originator.display_name()];
        args.extend(owner);
        Self::build(AnnotationKind::Delegated,
            format!("{} has delegated their participation in {} to {}. The invitation was sent by {}.",
                delegator.display_name(), appointment(Scope::of(event), &summary), whom, originator.display_name()),
            args)
    }

    pub async fn resource_invited_introduction(&self, event: &Event, originator: &CalendarUser, resource: &CalendarUser) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        let resource_name = self.resource_name(resource).await;
        args.push(resource_name.clone());
        args.push(summary.clone());
        Self::build(AnnotationKind::ResourceInvited,
            format!("{} would like to book {} for {}.", sender, resource_name, appointment(Scope::of(event), &summary)), args)
    }

    pub fn changed_introduction(&self, event: &Event, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::Changed, format!("{} has changed {}.", sender, appointment(Scope::of(event), &summary)), args)
    }

    pub async fn resource_changed_introduction(&self, event: &Event, originator: &CalendarUser, resource: &CalendarUser) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        let resource_name = self.resource_name(resource).await;
        args.push(resource_name.clone());
        args.push(summary.clone());
        Self::build(AnnotationKind::ResourceChanged,
            format!("{} has changed the booking of {} for {}.", sender, resource_name, appointment(Scope::of(event), &summary)), args)
    }

    /// A comment left by the originator
    pub fn comment(&self, comment: &str) -> Annotation {
        Self::build(AnnotationKind::Comment, format!("Comment: \"{}\"", comment), vec![comment.to_string()])
    }

    pub fn replied_introduction(&self, event: &Event, stored: Option<&Event>, replying: &Attendee) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(replying.calendar_user());
        args.push(summary.clone());
        Self::build(AnnotationKind::Replied,
            format!("{} has {} {}.", sender, replied_verb(replying.part_stat()), appointment(Scope::of(event), &summary)), args)
            .with_additional("partStat", &replying.part_stat().to_string())
    }

    pub async fn resource_replied_introduction(&self, event: &Event, stored: Option<&Event>, replying: &Attendee) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let delegate = replying.sent_by().map(|sent_by| sent_by.display_name()).unwrap_or_default();
        let resource_name = self.resource_name(replying.calendar_user()).await;
        Self::build(AnnotationKind::ResourceReplied,
            format!("{} has {} the booking of {} for {}.", delegate, replied_verb(replying.part_stat()), resource_name, appointment(Scope::of(event), &summary)),
            vec![delegate.clone(), resource_name.clone(), summary.clone()])
            .with_additional("partStat", &replying.part_stat().to_string())
    }

    pub fn canceled_introduction(&self, event: &Event, stored: Option<&Event>, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::Canceled, format!("{} has canceled {}.", sender, appointment(Scope::of(event), &summary)), args)
    }

    pub async fn resource_canceled_introduction(&self, event: &Event, stored: Option<&Event>, originator: &CalendarUser, resource: &CalendarUser) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(originator);
        let resource_name = self.resource_name(resource).await;
        args.push(resource_name.clone());
        args.push(summary.clone());
        Self::build(AnnotationKind::ResourceCanceled,
            format!("{} has canceled the booking of {} for {}.", sender, resource_name, appointment(Scope::of(event), &summary)), args)
    }

    pub fn added_occurrence_introduction(&self, event: &Event, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::AddedOccurrence,
            format!("{} has added an occurrence to the appointment series \"{}\".", sender, summary), args)
    }

    pub fn refresh_introduction(&self, event: &Event, stored: Option<&Event>, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::RefreshRequested,
            format!("{} asks for the latest version of {}.", sender, appointment(Scope::of(event), &summary)), args)
    }

    pub fn time_proposed_introduction(&self, event: &Event, stored: Option<&Event>, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::TimeProposed,
            format!("{} proposes a new time for {}.", sender, appointment(Scope::of(event), &summary)), args)
    }

    /// The proposed times, along with the current ones
    pub fn proposed_times(&self, event: &Event, stored: &Event) -> Annotation {
        let proposed = format_range(event.start_date(), event.end_date());
        let current = format_range(stored.start_date(), stored.end_date());
        let mut annotation = Self::build(AnnotationKind::ProposedTimes,
            format!("Proposed time: {} (UTC). Current time: {} (UTC).", proposed, current), vec![proposed, current])
            .with_additional("start", &event.start_date().to_rfc3339())
            .with_additional("timezone", &self.timezone);
        if let Some(end) = event.end_date() {
            annotation = annotation.with_additional("end", &end.to_rfc3339());
        }
        annotation
    }

    pub fn changes_proposed_introduction(&self, event: &Event, stored: Option<&Event>, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::ChangesProposed,
            format!("{} proposes changes to {}.", sender, appointment(Scope::of(event), &summary)), args)
    }

    pub fn counter_declined_introduction(&self, event: &Event, stored: Option<&Event>, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(stored, Some(event));
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::CounterDeclined,
            format!("{} has declined the proposal for {}.", sender, appointment(Scope::of(event), &summary)), args)
    }

    pub fn published_introduction(&self, event: &Event, originator: &CalendarUser) -> Annotation {
        let summary = utils::summary(Some(event), None);
        let (sender, mut args) = Self::sender(originator);
        args.push(summary.clone());
        Self::build(AnnotationKind::Published, format!("{} has published {}.", sender, appointment(Scope::of(event), &summary)), args)
    }


    pub fn organizer_changed(&self) -> Annotation {
        Self::build(AnnotationKind::OrganizerChanged,
            "The organizer of the appointment has changed. This change cannot be applied.".to_string(), Vec::new())
    }

    /// Describes the participation status of the target user in `event`
    pub async fn part_stat_descriptions(&self, event: &Event, target_user: EntityId) -> Vec<Annotation> {
        let owner = self.owner(target_user).await;
        self.describe_part_stat(event, target_user, owner)
    }

    /// Describes the participation status of a resource in `event`
    pub async fn resource_part_stat_descriptions(&self, event: &Event, resource: EntityId) -> Vec<Annotation> {
        let name = self.entity_name(resource).await;
        self.describe_part_stat(event, resource, Some(name))
    }

    fn describe_part_stat(&self, event: &Event, entity: EntityId, owner: Option<String>) -> Vec<Annotation> {
        let args: Vec<String> = owner.iter().cloned().collect();
        let attendee = match find_attendee_by_entity(event.attendees(), entity) {
            None => {
                let message = match &owner {
                    None => "You are not attending the appointment.".to_string(),
                    Some(name) => format!("{} is not attending the appointment.", name),
                };
                return vec![Self::build(AnnotationKind::NotAttending, message, args)];
            },
            Some(attendee) => attendee,
        };

        let mut annotations = Vec::new();
        if attendee.role() == ParticipantRole::OptParticipant {
            annotations.push(Self::build(AnnotationKind::ParticipationOptional, "Participation is optional.".to_string(), Vec::new()));
        }
        let message = match &owner {
            None => format!("You have {} the appointment.", replied_verb(attendee.part_stat())),
            Some(name) => format!("{} has {} the appointment.", name, replied_verb(attendee.part_stat())),
        };
        annotations.push(Self::build(AnnotationKind::PartStat, message, args)
            .with_additional("partStat", &attendee.part_stat().to_string()));
        annotations
    }

    pub async fn conflicts(&self, target_user: EntityId) -> Annotation {
        let owner = self.owner(target_user).await;
        self.conflicts_in(owner)
    }

    pub async fn resource_conflicts(&self, resource: EntityId) -> Annotation {
        let name = self.entity_name(resource).await;
        self.conflicts_in(Some(name))
    }

    fn conflicts_in(&self, owner: Option<String>) -> Annotation {
        Self::build(AnnotationKind::Conflicts,
            format!("The appointment conflicts with other appointments in {}.", calendar_of(&owner)), owner.into_iter().collect())
    }

    async fn in_calendar(&self, kind: AnnotationKind, target_user: EntityId, text: fn(&str) -> String) -> Annotation {
        let owner = self.owner(target_user).await;
        Self::build(kind, text(&calendar_of(&owner)), owner.into_iter().collect())
    }

    pub async fn save_manually(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::SaveManually, target_user,
            |cal| format!("The appointment has not been added to {} yet. It can be saved manually.", cal)).await
    }

    pub async fn update_manually(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::UpdateManually, target_user,
            |cal| format!("The changes have not been applied to {} yet. They can be applied manually.", cal)).await
    }

    pub async fn saved(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::Saved, target_user,
            |cal| format!("The appointment has been added to {}.", cal)).await
    }

    pub async fn updated(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::Updated, target_user,
            |cal| format!("The appointment has been updated in {}.", cal)).await
    }

    pub async fn resource_saved(&self, resource: EntityId) -> Annotation {
        let name = self.entity_name(resource).await;
        Self::build(AnnotationKind::Saved, format!("The booking has been added to the calendar of {}.", name), vec![name])
    }

    pub async fn resource_updated(&self, resource: EntityId) -> Annotation {
        let name = self.entity_name(resource).await;
        Self::build(AnnotationKind::Updated, format!("The booking has been updated in the calendar of {}.", name), vec![name])
    }

    pub async fn resource_not_delegate(&self, resource: &CalendarUser) -> Annotation {
        let name = self.resource_name(resource).await;
        Self::build(AnnotationKind::ResourceNotDelegate,
            format!("You are not a booking delegate of {}, and cannot handle its bookings.", name), vec![name])
    }

    /// The stored event is newer than the incoming one
    pub fn updated_meantime(&self) -> Annotation {
        Self::build(AnnotationKind::UpdatedMeantime,
            "The appointment has been updated in the meantime. This message is outdated.".to_string(), Vec::new())
    }

    pub fn deleted_meantime(&self) -> Annotation {
        Self::build(AnnotationKind::DeletedMeantime,
            "The appointment has been deleted in the meantime.".to_string(), Vec::new())
    }

    pub fn reply_outdated(&self) -> Annotation {
        Self::build(AnnotationKind::ReplyOutdated,
            "The reply refers to an outdated version of the appointment.".to_string(), Vec::new())
    }

    pub fn reply_uninvited(&self) -> Annotation {
        Self::build(AnnotationKind::ReplyUninvited,
            "The reply comes from a participant who was not invited to the appointment.".to_string(), Vec::new())
    }

    pub fn reply_delegated(&self, delegator: &CalendarUser) -> Annotation {
        Self::build(AnnotationKind::ReplyDelegated,
            format!("The reply comes from a participant {} has delegated their participation to.", delegator.display_name()),
            vec![delegator.display_name()])
    }

    pub async fn reply_applied(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::ReplyApplied, target_user,
            |cal| format!("The reply has already been applied to {}.", cal)).await
    }

    pub async fn apply_reply_manually(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::ApplyReplyManually, target_user,
            |cal| format!("The reply has not been applied to {} yet. It can be applied manually.", cal)).await
    }

    pub async fn not_found(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::NotFound, target_user,
            |cal| format!("The appointment could not be found in {}.", cal)).await
    }

    pub async fn resource_not_found(&self, resource: &CalendarUser) -> Annotation {
        let name = self.resource_name(resource).await;
        Self::build(AnnotationKind::NotFound, format!("The booking could not be found in the calendar of {}.", name), vec![name])
    }

    pub async fn cancel_applied(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::CancelApplied, target_user,
            |cal| format!("The appointment has already been removed from {}.", cal)).await
    }

    pub async fn resource_cancel_applied(&self, resource: &CalendarUser) -> Annotation {
        let name = self.resource_name(resource).await;
        Self::build(AnnotationKind::CancelApplied, format!("The booking has already been removed from the calendar of {}.", name), vec![name])
    }

    pub async fn apply_cancel_manually(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::ApplyCancelManually, target_user,
            |cal| format!("The appointment has not been removed from {} yet. It can be removed manually.", cal)).await
    }

    pub async fn add_unsupported(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::AddUnsupported, target_user,
            |cal| format!("The occurrence cannot be added to {}. Ask the organizer for the latest version of the appointment.", cal)).await
    }

    pub fn refresh_uninvited(&self) -> Annotation {
        Self::build(AnnotationKind::RefreshUninvited,
            "The request comes from a participant who was not invited to the appointment.".to_string(), Vec::new())
    }

    pub fn send_manually(&self, event: &Event) -> Annotation {
        let summary = utils::summary(Some(event), None);
        Self::build(AnnotationKind::SendManually,
            format!("The latest version of {} can be sent manually.", appointment(Scope::of(event), &summary)), vec![summary])
    }

    pub fn counter_uninvited(&self) -> Annotation {
        Self::build(AnnotationKind::CounterUninvited,
            "The proposal comes from a participant who was not invited to the appointment.".to_string(), Vec::new())
    }

    pub fn counter_outdated(&self) -> Annotation {
        Self::build(AnnotationKind::CounterOutdated,
            "The proposal refers to an outdated version of the appointment.".to_string(), Vec::new())
    }

    pub async fn apply_counter_manually(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::ApplyCounterManually, target_user,
            |cal| format!("The proposal has not been applied to {} yet. It can be applied manually.", cal)).await
    }

    pub async fn counter_unsupported(&self, target_user: EntityId) -> Annotation {
        self.in_calendar(AnnotationKind::CounterUnsupported, target_user,
            |cal| format!("The proposed changes cannot be applied to {}.", cal)).await
    }

    pub fn counter_declined_for_updated(&self) -> Annotation {
        Self::build(AnnotationKind::CounterDeclinedForUpdated,
            "The declined proposal refers to a newer version of the appointment. Ask the organizer for the latest version.".to_string(), Vec::new())
    }

    pub fn publish_unsupported(&self) -> Annotation {
        Self::build(AnnotationKind::PublishUnsupported,
            "Published appointments are not supported.".to_string(), Vec::new())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crate::event::RecurrenceId;

    #[test]
    fn test_scope() {
        let start = Utc.ymd(2021, 11, 2).and_hms(9, 30, 0);
        let single = Event::new("uid", start, start);
        let master = single.clone().with_recurrence_rule("FREQ=DAILY");
        let occurrence = master.clone().with_recurrence_id(RecurrenceId::new(start));
        assert_eq!(Scope::of(&single), Scope::Single);
        assert_eq!(Scope::of(&master), Scope::Series);
        assert_eq!(Scope::of(&occurrence), Scope::Occurrence);
        assert_eq!(appointment(Scope::Series, "Standup"), "the appointment series \"Standup\"");
    }

    #[test]
    fn test_format_range() {
        let start = Utc.ymd(2021, 11, 2).and_hms(9, 30, 0);
        assert_eq!(format_range(start, None), "Tue, 2 Nov 2021 09:30");
        assert_eq!(format_range(start, Some(start + Duration::hours(1))), "Tue, 2 Nov 2021 09:30 - 10:30");
        assert_eq!(format_range(start, Some(start + Duration::days(1))), "Tue, 2 Nov 2021 09:30 - Wed, 3 Nov 2021 09:30");
    }

    #[test]
    fn test_kinds() {
        assert!(AnnotationKind::Invited.is_introduction());
        assert!(!AnnotationKind::Comment.is_introduction());
        assert_eq!(AnnotationKind::CounterDeclinedForUpdated.key(), "counter_declined_for_updated");
    }
}
