//! crates/flashcards_core/src/library.rs
//!
//! Collection and flashcard workflows. Each call resolves the target collection
//! through [`AccessControl`] before reading or mutating anything.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::access::{AccessControl, Action};
use crate::domain::{
    Collection, CollectionChanges, Flashcard, FlashcardChanges, NewCollection, NewFlashcard,
};
use crate::ports::{DatabaseService, PortResult};
use crate::validation;

#[derive(Clone)]
pub struct Library {
    db: Arc<dyn DatabaseService>,
    access: AccessControl,
}

impl Library {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self {
            access: AccessControl::new(db.clone()),
            db,
        }
    }

    // --- Collections ---

    pub async fn create_collection(
        &self,
        owner: Uuid,
        collection: NewCollection,
    ) -> PortResult<Collection> {
        validation::collection_name(&collection.name)?;
        validation::max_cards(collection.max_cards)?;
        let created = self.db.create_collection(owner, &collection).await?;
        info!(collection_id = %created.id, %owner, "collection created");
        Ok(created)
    }

    pub async fn list_collections(&self, owner: Uuid) -> PortResult<Vec<Collection>> {
        self.db.list_collections_by_owner(owner).await
    }

    pub async fn get_collection(&self, actor: Uuid, collection_id: Uuid) -> PortResult<Collection> {
        self.access.resolve(actor, collection_id, Action::Read).await
    }

    pub async fn update_collection(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        changes: CollectionChanges,
    ) -> PortResult<Collection> {
        if let Some(name) = &changes.name {
            validation::collection_name(name)?;
        }
        if let Some(max_cards) = changes.max_cards {
            validation::max_cards(max_cards)?;
        }
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Write)
            .await?;
        self.db.update_collection(collection.id, &changes).await
    }

    pub async fn delete_collection(&self, actor: Uuid, collection_id: Uuid) -> PortResult<()> {
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Delete)
            .await?;
        self.db.delete_collection(collection.id).await?;
        info!(%collection_id, "collection deleted");
        Ok(())
    }

    // --- Flashcards ---

    pub async fn create_flashcard(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        flashcard: NewFlashcard,
    ) -> PortResult<Flashcard> {
        validation::front(&flashcard.front)?;
        validation::back(&flashcard.back)?;
        if let Some(url) = &flashcard.video_url {
            validation::video_url(url)?;
        }
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Write)
            .await?;
        let created = self.db.create_flashcard(collection.id, &flashcard).await?;
        info!(flashcard_id = %created.id, %collection_id, "flashcard created");
        Ok(created)
    }

    pub async fn list_flashcards(
        &self,
        actor: Uuid,
        collection_id: Uuid,
    ) -> PortResult<Vec<Flashcard>> {
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Read)
            .await?;
        self.db.list_flashcards(collection.id).await
    }

    pub async fn get_flashcard(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        flashcard_id: Uuid,
    ) -> PortResult<Flashcard> {
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Read)
            .await?;
        self.db.get_flashcard(collection.id, flashcard_id).await
    }

    pub async fn update_flashcard(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        flashcard_id: Uuid,
        changes: FlashcardChanges,
    ) -> PortResult<Flashcard> {
        if let Some(front) = &changes.front {
            validation::front(front)?;
        }
        if let Some(back) = &changes.back {
            validation::back(back)?;
        }
        if let Some(url) = &changes.video_url {
            validation::video_url(url)?;
        }
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Write)
            .await?;
        self.db
            .update_flashcard(collection.id, flashcard_id, &changes)
            .await
    }

    pub async fn delete_flashcard(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        flashcard_id: Uuid,
    ) -> PortResult<()> {
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Write)
            .await?;
        self.db.delete_flashcard(collection.id, flashcard_id).await
    }
}
