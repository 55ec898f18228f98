//! This module provides ways to tweak the in-memory collaborators, so that they can return errors on some tests

use crate::error::ServiceError;

/// This stores some behaviour tweaks, that describe how a [`MemoryStore`](crate::memory::MemoryStore) will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    // From the CalendarUtilities trait
    pub lookup_behaviour: (u32, u32),
    pub tombstone_lookup_behaviour: (u32, u32),
    pub adjust_time_zones_behaviour: (u32, u32),

    // From the RecurrenceService trait
    pub occurrence_behaviour: (u32, u32),

    // From the FreeBusyService trait
    pub check_conflicts_behaviour: (u32, u32),

    // From the EntityResolver trait
    pub prepare_behaviour: (u32, u32),
    pub user_attendee_behaviour: (u32, u32),
    pub settings_behaviour: (u32, u32),

    // From the FolderService trait
    pub permissions_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            lookup_behaviour: (0, n_fails),
            tombstone_lookup_behaviour: (0, n_fails),
            adjust_time_zones_behaviour: (0, n_fails),
            occurrence_behaviour: (0, n_fails),
            check_conflicts_behaviour: (0, n_fails),
            prepare_behaviour: (0, n_fails),
            user_attendee_behaviour: (0, n_fails),
            settings_behaviour: (0, n_fails),
            permissions_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_lookup(&mut self, tombstones: bool) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        if tombstones {
            decrement(&mut self.tombstone_lookup_behaviour, "tombstone lookup")
        } else {
            decrement(&mut self.lookup_behaviour, "lookup")
        }
    }
    pub fn can_adjust_time_zones(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.adjust_time_zones_behaviour, "adjust_time_zones")
    }
    pub fn can_get_occurrence(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.occurrence_behaviour, "occurrence")
    }
    pub fn can_check_conflicts(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.check_conflicts_behaviour, "check_conflicts")
    }
    pub fn can_prepare(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.prepare_behaviour, "prepare")
    }
    pub fn can_prepare_user_attendee(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.user_attendee_behaviour, "prepare_user_attendee")
    }
    pub fn can_get_settings(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.settings_behaviour, "settings")
    }
    pub fn can_get_permissions(&mut self) -> Result<(), ServiceError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.permissions_behaviour, "effective_permissions")
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), ServiceError> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value).into())
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}
