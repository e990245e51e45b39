//! crates/flashcards_core/src/access.rs
//!
//! Decides who may read, write, delete or administer a collection and its
//! flashcards, based on ownership and share grants.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Collection, Share, SharePermission};
use crate::ports::{DatabaseService, PortError, PortResult};

/// Something an actor wants to do with a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    /// Deleting the collection itself. Owner-only.
    Delete,
    /// Creating, listing, changing or revoking shares. Owner-only.
    ManageShares,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allowed
    }
}

/// The pure decision over already-loaded data.
///
/// `share` must be the share of `collection` whose recipient is `actor`, if any.
pub fn decide(
    actor: Uuid,
    collection: &Collection,
    share: Option<&Share>,
    action: Action,
) -> Decision {
    if actor == collection.owner_user_id {
        return Decision::Allowed;
    }
    let Some(share) = share else {
        return Decision::Denied;
    };
    if share.collection_id != collection.id || share.recipient_user_id != actor {
        return Decision::Denied;
    }
    match (action, share.permission) {
        (Action::Read, _) => Decision::Allowed,
        (Action::Write, SharePermission::Write) => Decision::Allowed,
        (Action::Write, SharePermission::Read) => Decision::Denied,
        (Action::Delete | Action::ManageShares, _) => Decision::Denied,
    }
}

/// Authorization entry point for handlers and the other engines.
#[derive(Clone)]
pub struct AccessControl {
    db: Arc<dyn DatabaseService>,
}

impl AccessControl {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Decides `action` on an already-fetched collection. Costs at most one share lookup.
    pub async fn authorize(
        &self,
        actor: Uuid,
        collection: &Collection,
        action: Action,
    ) -> PortResult<Decision> {
        if actor == collection.owner_user_id {
            return Ok(Decision::Allowed);
        }
        let share = self.db.find_share(collection.id, actor).await?;
        Ok(decide(actor, collection, share.as_ref(), action))
    }

    /// Loads a collection and checks `action` on it, masking existence from
    /// strangers.
    ///
    /// * missing collection, or a non-owner with no share: `NotFound`
    ///   (`ManageShares` excepted, see below);
    /// * a share that does not cover `action`: `Forbidden`;
    /// * any non-owner asking for `ManageShares`: `Forbidden`.
    pub async fn resolve(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        action: Action,
    ) -> PortResult<Collection> {
        let collection = self.db.get_collection(collection_id).await?;
        if actor == collection.owner_user_id {
            return Ok(collection);
        }
        if action == Action::ManageShares {
            return Err(PortError::Forbidden(
                "only the owner can manage shares of this collection".to_string(),
            ));
        }

        let share = self.db.find_share(collection.id, actor).await?;
        if share.is_none() {
            return Err(not_found(collection_id));
        }
        match decide(actor, &collection, share.as_ref(), action) {
            Decision::Allowed => Ok(collection),
            Decision::Denied => Err(PortError::Forbidden(format!(
                "{:?} is not permitted on collection {}",
                action, collection_id
            ))),
        }
    }
}

pub(crate) fn not_found(collection_id: Uuid) -> PortError {
    PortError::NotFound(format!("Collection {} not found", collection_id))
}
