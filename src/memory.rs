//! An in-memory implementation of every collaborator of the analysis
//!
//! This is mostly useful for tests, and for prototyping an integration before plugging a real storage.

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::calendar_user::{Attendee, CalendarUser, CalendarUserType, EntityId, SchedulingPrivilege};
use crate::error::ServiceError;
use crate::event::{Event, EventConflict, EventFields, RecurrenceId};
use crate::mock_behaviour::MockBehaviour;
use crate::permission::Permissions;
use crate::traits::{CalendarUtilities, EntityResolver, FolderService, FreeBusyService, Lookup, RecurrenceService};
use crate::utils::comparison::compare_events_chrono;

/// An internal user or resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    email: String,
    display_name: String,
    cu_type: CalendarUserType,
    default_folder: String,
    locale: Option<String>,
    timezone: Option<String>,
}

impl Entity {
    pub fn new(email: &str, display_name: &str, default_folder: &str) -> Self {
        Self {
            email: email.to_string(),
            display_name: display_name.to_string(),
            cu_type: CalendarUserType::Individual,
            default_folder: default_folder.to_string(),
            locale: None,
            timezone: None,
        }
    }

    pub fn with_cu_type(mut self, cu_type: CalendarUserType) -> Self {
        self.cu_type = cu_type;
        self
    }
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }
    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = Some(timezone.to_string());
        self
    }

    pub fn email(&self) -> &str { &self.email }
    pub fn display_name(&self) -> &str { &self.display_name }
    pub fn default_folder(&self) -> &str { &self.default_folder }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredData {
    entities: HashMap<EntityId, Entity>,
    /// Live events, per calendar user
    events: HashMap<EntityId, Vec<Event>>,
    /// Deleted events, per calendar user
    tombstones: HashMap<EntityId, Vec<Event>>,
    /// Permissions, per folder then per user
    permissions: HashMap<String, HashMap<EntityId, Permissions>>,
    /// Scheduling privileges, per resource then per user
    privileges: HashMap<EntityId, HashMap<EntityId, SchedulingPrivilege>>,
}


/// A storage that keeps everything in memory
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<StoredData>,
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { data: RwLock::new(StoredData::default()), mock_behaviour: None }
    }

    /// Make this store fail some calls, as described by `behaviour`
    pub fn with_mock_behaviour(mut self, behaviour: Arc<Mutex<MockBehaviour>>) -> Self {
        self.mock_behaviour = Some(behaviour);
        self
    }

    pub fn with_entity(mut self, id: EntityId, entity: Entity) -> Self {
        self.data.get_mut().entities.insert(id, entity);
        self
    }

    /// Store an event in the calendar of `calendar_user`
    pub fn with_event(mut self, calendar_user: EntityId, event: Event) -> Self {
        self.data.get_mut().events.entry(calendar_user).or_insert_with(Vec::new).push(event);
        self
    }

    /// Store a deleted event of the calendar of `calendar_user`
    pub fn with_tombstone(mut self, calendar_user: EntityId, event: Event) -> Self {
        self.data.get_mut().tombstones.entry(calendar_user).or_insert_with(Vec::new).push(event);
        self
    }

    pub fn with_permissions(mut self, folder: &str, user: EntityId, permissions: Permissions) -> Self {
        self.data.get_mut().permissions.entry(folder.to_string()).or_insert_with(HashMap::new).insert(user, permissions);
        self
    }

    pub fn with_privilege(mut self, resource: EntityId, user: EntityId, privilege: SchedulingPrivilege) -> Self {
        self.data.get_mut().privileges.entry(resource).or_insert_with(HashMap::new).insert(user, privilege);
        self
    }

    /// Initialize a store from the content of a valid backing file.
    /// Returns an error otherwise
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let data = match std::fs::File::open(path) {
            Err(err) => {
                return Err(format!("Unable to open file {:?}: {}", path, err).into());
            },
            Ok(file) => serde_json::from_reader(file)?,
        };
        Ok(Self { data: RwLock::new(data), mock_behaviour: None })
    }

    /// Store the current content of this store to a file
    pub async fn save_to_file(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let file = std::fs::File::create(path)
            .map_err(|err| format!("Unable to save file {:?}: {}", path, err))?;
        let data = self.data.read().await;
        serde_json::to_writer(file, &*data)?;
        Ok(())
    }

    /// Whether both stores hold the same data
    pub async fn has_same_contents_than(&self, other: &Self) -> bool {
        *self.data.read().await == *other.data.read().await
    }

    fn behave<F>(&self, check: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut MockBehaviour) -> Result<(), ServiceError>,
    {
        match &self.mock_behaviour {
            None => Ok(()),
            Some(behaviour) => {
                let mut behaviour = behaviour.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                check(&mut behaviour)
            },
        }
    }

    async fn entity(&self, id: EntityId) -> Result<Entity, ServiceError> {
        self.data.read().await.entities.get(&id)
            .cloned()
            .ok_or_else(|| format!("Unknown entity {}", id).into())
    }

    /// Resolves a calendar user to an entity, by e-mail address
    async fn resolve(&self, calendar_user: &mut CalendarUser, resolvable: Option<&[EntityId]>) {
        if calendar_user.is_internal() {
            return;
        }
        let address = match calendar_user.email_address() {
            None => return,
            Some(address) => address,
        };
        let data = self.data.read().await;
        let found = data.entities.iter()
            .find(|(_, entity)| entity.email.eq_ignore_ascii_case(&address))
            .map(|(id, _)| *id);
        if let Some(id) = found {
            if resolvable.map(|allowed| allowed.contains(&id)).unwrap_or(true) {
                log::trace!("Resolved {} to entity {}", address, id);
                calendar_user.set_entity(Some(id));
            }
        }
    }
}

fn matches_lookup(event: &Event, lookup: &Lookup<'_>) -> bool {
    match lookup {
        Lookup::Uid(uid) => event.uid() == *uid,
        Lookup::RelatedTo(related) => event.related_to().map(|r| r.value() == related.value()).unwrap_or(false),
    }
}

fn overlaps(start: DateTime<Utc>, end: Option<DateTime<Utc>>, other_start: DateTime<Utc>, other_end: Option<DateTime<Utc>>) -> bool {
    let end = end.unwrap_or(start);
    let other_end = other_end.unwrap_or(other_start);
    start == other_start || (start < other_end && other_start < end)
}


#[async_trait]
impl CalendarUtilities for MemoryStore {
    async fn lookup_by_field(&self, lookup: Lookup<'_>, calendar_user: EntityId, tombstones: bool, fields: Option<EventFields>) -> Result<Vec<Event>, ServiceError> {
        self.behave(|b| b.can_lookup(tombstones))?;
        let data = self.data.read().await;
        let source = if tombstones { &data.tombstones } else { &data.events };
        let mut events: Vec<Event> = source.get(&calendar_user)
            .map(|events| events.iter()
                .filter(|event| matches_lookup(event, &lookup))
                .map(|event| event.filtered(fields).with_calendar_user(calendar_user))
                .collect())
            .unwrap_or_default();
        events.sort_by(compare_events_chrono);
        Ok(events)
    }

    async fn adjust_time_zones(&self, calendar_user: EntityId, event: &mut Event, original: Option<&Event>) -> Result<(), ServiceError> {
        self.behave(|b| b.can_adjust_time_zones())?;
        if event.timezone().is_some() {
            return Ok(());
        }
        let timezone = match original.and_then(|original| original.timezone()) {
            Some(timezone) => Some(timezone.to_string()),
            None => self.data.read().await.entities.get(&calendar_user).and_then(|entity| entity.timezone.clone()),
        };
        event.set_timezone(timezone);
        Ok(())
    }
}

#[async_trait]
impl RecurrenceService for MemoryStore {
    async fn occurrence(&self, series_master: &Event, recurrence_id: &RecurrenceId) -> Result<Event, ServiceError> {
        self.behave(|b| b.can_get_occurrence())?;
        if !series_master.is_series_master() {
            return Err(format!("{} is not a series master", series_master).into());
        }
        if series_master.delete_exception_dates().contains(recurrence_id) {
            return Err(format!("Occurrence {} of {} has been deleted", recurrence_id, series_master).into());
        }
        let start = recurrence_id.value();
        let mut occurrence = Event::new(series_master.uid(), start, series_master.dtstamp())
            .with_recurrence_id(*recurrence_id)
            .with_sequence(series_master.sequence())
            .with_attendees(series_master.attendees().to_vec());
        if let Some(end) = series_master.end_date() {
            occurrence = occurrence.with_end_date(start + (end - series_master.start_date()));
        }
        if let Some(id) = series_master.id() {
            occurrence = occurrence.with_id(id).with_series_id(id);
        }
        if let Some(folder) = series_master.folder_id() {
            occurrence = occurrence.with_folder_id(folder);
        }
        if let Some(organizer) = series_master.organizer() {
            occurrence = occurrence.with_organizer(organizer.clone());
        }
        if let Some(summary) = series_master.summary() {
            occurrence = occurrence.with_summary(summary);
        }
        if let Some(timezone) = series_master.timezone() {
            occurrence = occurrence.with_timezone(timezone);
        }
        if let (Some(created), Some(created_by)) = (series_master.created(), series_master.created_by()) {
            occurrence = occurrence.with_created(created, created_by);
        }
        if let Some(calendar_user) = series_master.calendar_user() {
            occurrence = occurrence.with_calendar_user(calendar_user);
        }
        Ok(occurrence)
    }
}

#[async_trait]
impl FreeBusyService for MemoryStore {
    async fn check_conflicts(&self, event: &Event, attendees: &[Attendee]) -> Result<Vec<EventConflict>, ServiceError> {
        self.behave(|b| b.can_check_conflicts())?;
        let data = self.data.read().await;
        let mut conflicts = Vec::new();
        for attendee in attendees {
            let entity = match attendee.entity() {
                None => continue,
                Some(entity) => entity,
            };
            let busy = data.events.get(&entity).map(|events| events.as_slice()).unwrap_or_default();
            for other in busy {
                if other.uid() == event.uid() || !overlaps(event.start_date(), event.end_date(), other.start_date(), other.end_date()) {
                    continue;
                }
                conflicts.push(EventConflict::new_with_parameters(
                    other.uid().to_string(), other.summary().map(|s| s.to_string()),
                    other.start_date(), other.end_date(),
                    attendee.cu_type().is_resource(), vec![attendee.clone()],
                ));
            }
        }
        Ok(conflicts)
    }
}

#[async_trait]
impl EntityResolver for MemoryStore {
    async fn default_folder(&self, user: EntityId) -> Result<String, ServiceError> {
        self.behave(|b| b.can_get_settings())?;
        Ok(self.entity(user).await?.default_folder)
    }

    async fn scheduling_privilege(&self, resource: EntityId, user: EntityId) -> Result<SchedulingPrivilege, ServiceError> {
        self.behave(|b| b.can_get_settings())?;
        let data = self.data.read().await;
        Ok(data.privileges.get(&resource)
            .and_then(|privileges| privileges.get(&user))
            .copied()
            .unwrap_or(SchedulingPrivilege::None))
    }

    async fn locale(&self, user: EntityId) -> Result<String, ServiceError> {
        self.behave(|b| b.can_get_settings())?;
        self.entity(user).await?.locale.ok_or_else(|| format!("No locale set for user {}", user).into())
    }

    async fn timezone(&self, user: EntityId) -> Result<String, ServiceError> {
        self.behave(|b| b.can_get_settings())?;
        self.entity(user).await?.timezone.ok_or_else(|| format!("No timezone set for user {}", user).into())
    }

    async fn display_name(&self, entity: EntityId) -> Result<String, ServiceError> {
        self.behave(|b| b.can_get_settings())?;
        Ok(self.entity(entity).await?.display_name)
    }

    async fn prepare_attendees(&self, attendees: &mut [Attendee], resolvable: Option<&[EntityId]>) -> Result<(), ServiceError> {
        self.behave(|b| b.can_prepare())?;
        for attendee in attendees.iter_mut() {
            self.resolve(attendee.calendar_user_mut(), resolvable).await;
        }
        Ok(())
    }

    async fn prepare_organizer(&self, organizer: &mut CalendarUser, resolvable: Option<&[EntityId]>) -> Result<(), ServiceError> {
        self.behave(|b| b.can_prepare())?;
        self.resolve(organizer, resolvable).await;
        Ok(())
    }

    async fn prepare_user_attendee(&self, user: EntityId) -> Result<Attendee, ServiceError> {
        self.behave(|b| b.can_prepare_user_attendee())?;
        let entity = self.entity(user).await?;
        Ok(Attendee::new(CalendarUser::new_internal(user, &entity.email).with_cn(&entity.display_name))
            .with_cu_type(entity.cu_type))
    }
}

#[async_trait]
impl FolderService for MemoryStore {
    async fn effective_permissions(&self, user: EntityId, folder: &str) -> Result<Permissions, ServiceError> {
        self.behave(|b| b.can_get_permissions())?;
        let data = self.data.read().await;
        Ok(data.permissions.get(folder)
            .and_then(|permissions| permissions.get(&user))
            .copied()
            .unwrap_or_else(Permissions::empty))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store() -> MemoryStore {
        let start = Utc.ymd(2021, 7, 5).and_hms(9, 0, 0);
        MemoryStore::new()
            .with_entity(1, Entity::new("alice@example.com", "Alice", "cal-1").with_timezone("Europe/Berlin"))
            .with_entity(2, Entity::new("bob@example.com", "Bob", "cal-2"))
            .with_event(1, Event::new("later", start + Duration::days(1), start).with_summary("Later"))
            .with_event(1, Event::new("standup", start, start).with_end_date(start + Duration::minutes(15)).with_summary("Standup"))
            .with_tombstone(1, Event::new("gone", start, start))
    }

    #[tokio::test]
    async fn test_lookup() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = store();

        let found = store.lookup_by_field(Lookup::Uid("standup"), 1, false, Some(EventFields::SUMMARY)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].summary(), Some("Standup"));
        assert_eq!(found[0].end_date(), None);

        assert!(store.lookup_by_field(Lookup::Uid("standup"), 2, false, None).await.unwrap().is_empty());
        assert!(store.lookup_by_field(Lookup::Uid("gone"), 1, false, None).await.unwrap().is_empty());
        assert_eq!(store.lookup_by_field(Lookup::Uid("gone"), 1, true, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflicts() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = store();
        let start = Utc.ymd(2021, 7, 5).and_hms(9, 10, 0);
        let event = Event::new("new", start, start).with_end_date(start + Duration::hours(1));

        let alice = store.prepare_user_attendee(1).await.unwrap();
        let conflicts = store.check_conflicts(&event, &[alice]).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].uid(), "standup");
        assert!(!conflicts[0].hard_conflict());

        let bob = store.prepare_user_attendee(2).await.unwrap();
        assert!(store.check_conflicts(&event, &[bob]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolution() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = store();
        let mut attendees = vec![
            Attendee::new(CalendarUser::new("ALICE@example.com")),
            Attendee::new(CalendarUser::new("bob@example.com")),
            Attendee::new(CalendarUser::new("carol@example.com")),
        ];
        store.prepare_attendees(&mut attendees, Some(&[1])).await.unwrap();
        let entities: Vec<_> = attendees.iter().map(|a| a.entity()).collect();
        assert_eq!(entities, vec![Some(1), None, None]);

        store.prepare_attendees(&mut attendees, None).await.unwrap();
        assert_eq!(attendees[1].entity(), Some(2));

        let mut event = Event::new("uid", Utc.ymd(2021, 7, 5).and_hms(9, 0, 0), Utc.ymd(2021, 7, 5).and_hms(9, 0, 0));
        store.adjust_time_zones(1, &mut event, None).await.unwrap();
        assert_eq!(event.timezone(), Some("Europe/Berlin"));
    }

    #[tokio::test]
    async fn test_occurrence() {
        let start = Utc.ymd(2021, 7, 5).and_hms(9, 0, 0);
        let rid = RecurrenceId::new(start + Duration::weeks(1));
        let master = Event::new("weekly", start, start)
            .with_id("17")
            .with_end_date(start + Duration::minutes(30))
            .with_recurrence_rule("FREQ=WEEKLY");
        let store = MemoryStore::new();

        let occurrence = store.occurrence(&master, &rid).await.unwrap();
        assert_eq!(occurrence.recurrence_id(), Some(&rid));
        assert_eq!(occurrence.start_date(), rid.value());
        assert_eq!(occurrence.end_date(), Some(rid.value() + Duration::minutes(30)));
        assert_eq!(occurrence.series_id(), Some("17"));

        let deleted = master.clone().with_delete_exception_dates(std::iter::once(rid).collect());
        assert!(store.occurrence(&deleted, &rid).await.is_err());
        assert!(store.occurrence(&occurrence, &rid).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_behaviour() {
        let behaviour = Arc::new(Mutex::new(MockBehaviour { lookup_behaviour: (1, 1), ..MockBehaviour::default() }));
        let store = store().with_mock_behaviour(behaviour.clone());
        assert!(store.lookup_by_field(Lookup::Uid("standup"), 1, false, None).await.is_ok());
        assert!(store.lookup_by_field(Lookup::Uid("standup"), 1, false, None).await.is_err());
        assert!(store.lookup_by_field(Lookup::Uid("standup"), 1, false, None).await.is_ok());
        // Tombstone lookups are tweaked separately
        assert!(store.lookup_by_field(Lookup::Uid("gone"), 1, true, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("itip-analysis-{}.json", uuid::Uuid::new_v4()));
        let store = store().with_permissions("cal-1", 2, Permissions::READ_FOLDER | Permissions::CREATE);
        store.save_to_file(&path).await.unwrap();

        let retrieved = MemoryStore::from_file(&path).unwrap();
        assert!(store.has_same_contents_than(&retrieved).await);
        assert_eq!(retrieved.effective_permissions(2, "cal-1").await.unwrap(), Permissions::READ_FOLDER | Permissions::CREATE);
        let _ = std::fs::remove_file(&path);
    }
}
