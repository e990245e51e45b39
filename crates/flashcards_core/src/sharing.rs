//! crates/flashcards_core/src/sharing.rs
//!
//! Creates, lists, updates and revokes share grants. Every call re-resolves the
//! target collection, so a change of ownership between calls is always seen.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{AccessControl, Action};
use crate::domain::{NewShare, Share, SharePermission, SharedCollection};
use crate::ports::{DatabaseService, PortError, PortResult};

/// How many codes are tried before giving up on a share insert.
pub const MAX_SHARE_CODE_ATTEMPTS: usize = 5;

/// Length of the public share code.
pub const SHARE_CODE_LEN: usize = 8;

/// Produces candidate share codes.
pub trait ShareCodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Takes the first characters of a random v4 UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomShareCodes;

impl ShareCodeSource for RandomShareCodes {
    fn next_code(&self) -> String {
        let mut code = Uuid::new_v4().simple().to_string();
        code.truncate(SHARE_CODE_LEN);
        code
    }
}

#[derive(Clone)]
pub struct SharingManager {
    db: Arc<dyn DatabaseService>,
    access: AccessControl,
    codes: Arc<dyn ShareCodeSource>,
}

impl SharingManager {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self::with_code_source(db, Arc::new(RandomShareCodes))
    }

    pub fn with_code_source(db: Arc<dyn DatabaseService>, codes: Arc<dyn ShareCodeSource>) -> Self {
        Self {
            access: AccessControl::new(db.clone()),
            db,
            codes,
        }
    }

    /// Grants `recipient` access to a collection owned by `owner`.
    pub async fn create_share(
        &self,
        owner: Uuid,
        collection_id: Uuid,
        recipient: Uuid,
        permission: SharePermission,
    ) -> PortResult<Share> {
        let collection = self
            .access
            .resolve(owner, collection_id, Action::ManageShares)
            .await?;

        if recipient == owner {
            return Err(PortError::InvalidInput(
                "a collection cannot be shared with its owner".to_string(),
            ));
        }
        match self.db.get_user(recipient).await {
            Ok(_) => {}
            Err(PortError::NotFound(_)) => return Err(PortError::InvalidRecipient(recipient)),
            Err(e) => return Err(e),
        }
        if self.db.find_share(collection.id, recipient).await?.is_some() {
            return Err(PortError::Conflict(format!(
                "collection {} is already shared with user {}",
                collection.id, recipient
            )));
        }

        for attempt in 1..=MAX_SHARE_CODE_ATTEMPTS {
            let new_share = NewShare {
                owner_user_id: owner,
                collection_id: collection.id,
                recipient_user_id: recipient,
                permission,
                share_code: self.codes.next_code(),
            };
            match self.db.insert_share(&new_share).await {
                Ok(share) => {
                    info!(
                        collection_id = %share.collection_id,
                        recipient = %share.recipient_user_id,
                        permission = %share.permission,
                        "share created"
                    );
                    return Ok(share);
                }
                Err(PortError::ShareCodeTaken) => {
                    warn!(attempt, "share code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(PortError::Unexpected(format!(
            "could not allocate a unique share code after {} attempts",
            MAX_SHARE_CODE_ATTEMPTS
        )))
    }

    /// Owner-only listing of a collection's grants.
    pub async fn list_shares_for_collection(
        &self,
        owner: Uuid,
        collection_id: Uuid,
    ) -> PortResult<Vec<Share>> {
        let collection = self
            .access
            .resolve(owner, collection_id, Action::ManageShares)
            .await?;
        self.db.list_shares_for_collection(collection.id).await
    }

    /// Everything shared with `user`, with the collections attached.
    pub async fn list_shares_for_user(&self, user: Uuid) -> PortResult<Vec<SharedCollection>> {
        self.db.list_shares_for_recipient(user).await
    }

    pub async fn update_permission(
        &self,
        owner: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
        permission: SharePermission,
    ) -> PortResult<Share> {
        self.access
            .resolve(owner, collection_id, Action::ManageShares)
            .await?;
        let share = self
            .db
            .update_share_permission(owner, collection_id, share_id, permission)
            .await?;
        info!(share_id = %share.id, permission = %share.permission, "share permission updated");
        Ok(share)
    }

    /// Deletes a grant. Revoking an id that is already gone is `NotFound`.
    pub async fn revoke_share(
        &self,
        owner: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
    ) -> PortResult<()> {
        self.access
            .resolve(owner, collection_id, Action::ManageShares)
            .await?;
        self.db.delete_share(owner, collection_id, share_id).await?;
        info!(%share_id, %collection_id, "share revoked");
        Ok(())
    }
}
