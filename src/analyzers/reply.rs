//! Analysis of `REPLY` messages, sent by attendees to tell their participation status to the organizer

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::analysis::{Action, AnalyzedChange, AnalyzedChangeBuilder, Change, ChangeType};
use crate::analysis::annotation::AnnotationHelper;
use crate::calendar_user::{Attendee, CalendarUser, EntityId, find_attendee};
use crate::error::AnalysisError;
use crate::event::Event;
use crate::message::SchedulingMethod;
use crate::provider::ObjectResourceProvider;
use crate::session::CalendarSession;
use crate::utils;
use super::{SchedulingAnalyzer, comment_annotation};

pub struct ReplyAnalyzer;

#[async_trait]
impl SchedulingAnalyzer for ReplyAnalyzer {
    fn method(&self) -> SchedulingMethod {
        SchedulingMethod::Reply
    }

    async fn analyze(&self, session: &CalendarSession, provider: &ObjectResourceProvider<'_>, originator: &CalendarUser, target_user: EntityId)
        -> Result<Vec<AnalyzedChange>, AnalysisError>
    {
        let helper = AnnotationHelper::new(session).await;
        let uses_organizer_copy = provider.uses_organizer_copy().await;

        let mut changes = Vec::new();
        for event in provider.incoming_events().await {
            let replying = match utils::select_attendee(&event, Some(originator), false) {
                Some(attendee) => attendee.clone(),
                None => {
                    session.add_warning(&format!("No replying attendee found in {} for originator {}, skipping", event, originator));
                    continue;
                },
            };
            let stored = provider.opt_matching_event(&event).await?;

            let mut builder = AnalyzedChangeBuilder::new();
            builder.target(Some(replying.clone()));
            if replying.cu_type().is_resource() && replying.sent_by().is_some() {
                builder.annotate(helper.resource_replied_introduction(&event, stored.as_ref(), &replying).await);
            } else {
                builder.annotate(helper.replied_introduction(&event, stored.as_ref(), &replying));
            }
            if let Some(comment) = comment_annotation(&helper, &event) {
                builder.annotate(comment);
            }

            let stored = match stored {
                Some(stored) => stored,
                None => {
                    let tombstone = provider.opt_matching_tombstone(&event).await?;
                    builder.annotate(match tombstone {
                        Some(_) => helper.deleted_meantime(),
                        None => helper.not_found(target_user).await,
                    });
                    builder.offer(&[Action::Ignore]);
                    changes.push(builder.build(Change::new(ChangeType::Update, event, None)));
                    continue;
                },
            };

            if stored.sequence() > event.sequence() {
                log::debug!("Reply to {} refers to an outdated sequence (stored: {})", event, stored.sequence());
                builder.annotate(helper.reply_outdated());
                builder.offer(&[Action::Ignore]);
            } else if let Some(stored_attendee) = find_attendee(stored.attendees(), replying.calendar_user()) {
                if already_applied(&event, &replying, stored_attendee) {
                    if !uses_organizer_copy {
                        builder.annotate(helper.reply_applied(target_user).await);
                    }
                    builder.offer(&[Action::Ignore]);
                } else {
                    builder.annotate(helper.apply_reply_manually(target_user).await);
                    builder.offer(&[Action::ApplyResponse]);
                }
            } else {
                // Either a delegate of an invited attendee, or a party crasher
                match opt_delegator(&stored, &replying) {
                    Some(delegator) => builder.annotate(helper.reply_delegated(delegator.calendar_user())),
                    None => builder.annotate(helper.reply_uninvited()),
                }
                builder.offer(&[Action::Ignore, Action::AcceptPartyCrasher]);
            }
            changes.push(builder.build(Change::new(ChangeType::Update, event, Some(stored))));
        }
        Ok(changes)
    }
}

/// When an attendee replied, falling back to the `DTSTAMP` of the reply
fn reply_timestamp(event: &Event, attendee: &Attendee) -> DateTime<Utc> {
    attendee.timestamp().unwrap_or_else(|| event.dtstamp())
}

/// Whether the stored event already holds this reply, or a newer one
fn already_applied(event: &Event, replying: &Attendee, stored_attendee: &Attendee) -> bool {
    match stored_attendee.timestamp() {
        Some(recorded) => recorded >= reply_timestamp(event, replying),
        None => stored_attendee.part_stat() == replying.part_stat(),
    }
}

/// The stored attendee the replying one has been delegated from
fn opt_delegator<'a>(stored: &'a Event, replying: &Attendee) -> Option<&'a Attendee> {
    replying.delegated_from().iter()
        .find_map(|delegator| find_attendee(stored.attendees(), delegator))
}
