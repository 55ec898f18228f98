//! Checks whether a session may handle scheduling messages on behalf of another calendar user

use serde::{Deserialize, Serialize};
use bitflags::bitflags;

use crate::calendar_user::EntityId;
use crate::error::AccessError;
use crate::resource::CalendarObjectResource;
use crate::session::CalendarSession;

bitflags! {
    /// The permissions a user holds in a calendar folder
    #[derive(Serialize, Deserialize)]
    pub struct Permissions: u16 {
        /// The folder is visible
        const READ_FOLDER = 1 << 0;
        /// Events can be created in the folder
        const CREATE = 1 << 1;
        const READ_OWN = 1 << 2;
        const READ_ALL = 1 << 3;
        /// Events created by the user can be changed
        const WRITE_OWN = 1 << 4;
        const WRITE_ALL = 1 << 5;
        /// Events created by the user can be deleted
        const DELETE_OWN = 1 << 6;
        const DELETE_ALL = 1 << 7;
    }
}

/// Checks that the session user may act on behalf of `target_user`, regarding the resource targeted by a scheduling message.
///
/// `resource` is the currently stored calendar object resource, if any.
pub async fn check_access(session: &CalendarSession, target_user: EntityId, resource: Option<&CalendarObjectResource>) -> Result<(), AccessError> {
    if session.user() == target_user {
        return Ok(());
    }

    let folder = match resource.and_then(|resource| resource.first_event().folder_id()) {
        Some(folder) => folder.to_string(),
        None => session.entities().default_folder(target_user).await.map_err(AccessError::Lookup)?,
    };
    let granted = session.folders().effective_permissions(session.user(), &folder).await.map_err(AccessError::Lookup)?;
    log::trace!("User {} holds {:?} in folder {}", session.user(), granted, folder);

    let resource = match resource {
        None => {
            // A new event would have to be created
            return require(session, &folder, granted, Permissions::READ_FOLDER | Permissions::CREATE | Permissions::WRITE_ALL | Permissions::DELETE_ALL);
        },
        Some(resource) => resource,
    };

    require(session, &folder, granted, Permissions::READ_FOLDER | Permissions::CREATE)?;
    if !granted.intersects(Permissions::WRITE_OWN | Permissions::WRITE_ALL) {
        require(session, &folder, granted, Permissions::WRITE_OWN)?;
    }
    if !granted.intersects(Permissions::DELETE_OWN | Permissions::DELETE_ALL) {
        require(session, &folder, granted, Permissions::DELETE_OWN)?;
    }
    if granted.contains(Permissions::WRITE_ALL | Permissions::DELETE_ALL) {
        return Ok(());
    }

    // Only "own" rights: the session user must have created the resource
    if is_creator(resource, session.user()) {
        Ok(())
    } else {
        Err(AccessError::NotCreator { user: session.user(), uid: resource.uid().to_string() })
    }
}

/// Same as [`check_access`], as a boolean
pub async fn has_access(session: &CalendarSession, target_user: EntityId, resource: Option<&CalendarObjectResource>) -> bool {
    match check_access(session, target_user, resource).await {
        Ok(()) => true,
        Err(err) => {
            log::debug!("No access to the calendar of user {}: {}", target_user, err);
            false
        },
    }
}

fn require(session: &CalendarSession, folder: &str, granted: Permissions, required: Permissions) -> Result<(), AccessError> {
    let missing = required - granted;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AccessError::MissingPermissions { user: session.user(), folder: folder.to_string(), missing })
    }
}

fn is_creator(resource: &CalendarObjectResource, user: EntityId) -> bool {
    if resource.events().len() == 1 {
        return resource.first_event().created_by() == Some(user);
    }
    if let Some(master) = resource.series_master() {
        return master.created_by() == Some(user);
    }
    resource.events().iter().any(|event| event.created_by() == Some(user))
}
