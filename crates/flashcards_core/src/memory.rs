//! In-memory `DatabaseService` implementation.
//!
//! Suitable for:
//! - Development without a PostgreSQL instance (`DATABASE_URL=memory://`)
//! - Unit and integration tests
//!
//! Every port call runs under one write guard, so the atomicity contracts of
//! [`DatabaseService`] hold trivially. Constraint behaviour (unique email,
//! unique share code, one grant per recipient, cascades, card limits) matches
//! the SQL schema.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Collection, CollectionChanges, Flashcard, FlashcardChanges, GenerationLog, NewCollection,
    NewFlashcard, NewShare, PeriodStatus, PeriodWindow, Plan, Share, SharePermission,
    SharedCollection, SubscriptionPeriod, User, UserCredentials,
};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct MemoryState {
    users: Vec<UserCredentials>,
    collections: Vec<Collection>,
    flashcards: Vec<Flashcard>,
    shares: Vec<Share>,
    periods: Vec<SubscriptionPeriod>,
    generation_logs: Vec<GenerationLog>,
}

impl MemoryState {
    fn user_mut(&mut self, user_id: Uuid) -> PortResult<&mut User> {
        self.users
            .iter_mut()
            .map(|c| &mut c.user)
            .find(|u| u.id == user_id)
            .ok_or_else(|| user_not_found(user_id))
    }

    fn collection(&self, collection_id: Uuid) -> PortResult<&Collection> {
        self.collections
            .iter()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| collection_not_found(collection_id))
    }

    /// `Conflict` unless `extra` more cards fit under the collection's `max_cards`.
    fn ensure_room(&self, collection_id: Uuid, extra: usize) -> PortResult<()> {
        let max_cards = self.collection(collection_id)?.max_cards;
        let held = self
            .flashcards
            .iter()
            .filter(|f| f.collection_id == collection_id)
            .count();
        if held + extra > max_cards.max(0) as usize {
            return Err(PortError::Conflict(format!(
                "collection {} already holds its maximum of {} cards",
                collection_id, max_cards
            )));
        }
        Ok(())
    }

    fn push_flashcard(
        &mut self,
        collection_id: Uuid,
        flashcard: &NewFlashcard,
        now: DateTime<Utc>,
    ) -> Flashcard {
        let created = Flashcard {
            id: Uuid::new_v4(),
            collection_id,
            front: flashcard.front.clone(),
            back: flashcard.back.clone(),
            video_url: flashcard.video_url.clone(),
            extra: flashcard.extra.clone(),
            created_by_generation: flashcard.created_by_generation,
            created_at: now,
            updated_at: now,
        };
        self.flashcards.push(created.clone());
        created
    }

    fn owns(&self, owner_user_id: Uuid, collection_id: Uuid) -> bool {
        self.collections
            .iter()
            .any(|c| c.id == collection_id && c.owner_user_id == owner_user_id)
    }

    fn flashcard_mut(
        &mut self,
        collection_id: Uuid,
        flashcard_id: Uuid,
    ) -> PortResult<&mut Flashcard> {
        self.flashcards
            .iter_mut()
            .find(|f| f.id == flashcard_id && f.collection_id == collection_id)
            .ok_or_else(|| flashcard_not_found(flashcard_id))
    }

    fn owned_share_mut(
        &mut self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
    ) -> PortResult<&mut Share> {
        if !self.owns(owner_user_id, collection_id) {
            return Err(share_not_found(share_id));
        }
        self.shares
            .iter_mut()
            .find(|s| s.id == share_id && s.collection_id == collection_id)
            .ok_or_else(|| share_not_found(share_id))
    }

    fn cancel_active_periods(&mut self, user_id: Uuid, now: DateTime<Utc>) {
        for period in self
            .periods
            .iter_mut()
            .filter(|p| p.user_id == user_id && p.status == PeriodStatus::Active)
        {
            period.status = PeriodStatus::Canceled;
            period.updated_at = now;
        }
    }

    fn set_plan(&mut self, user_id: Uuid, plan: Plan, now: DateTime<Utc>) -> PortResult<User> {
        let user = self.user_mut(user_id)?;
        user.plan = plan;
        user.updated_at = now;
        Ok(user.clone())
    }
}

fn user_not_found(user_id: Uuid) -> PortError {
    PortError::NotFound(format!("User {} not found", user_id))
}

fn collection_not_found(collection_id: Uuid) -> PortError {
    PortError::NotFound(format!("Collection {} not found", collection_id))
}

fn flashcard_not_found(flashcard_id: Uuid) -> PortError {
    PortError::NotFound(format!("Flashcard {} not found", flashcard_id))
}

fn share_not_found(share_id: Uuid) -> PortError {
    PortError::NotFound(format!("Share {} not found", share_id))
}

/// A process-local store. Data is lost when the value is dropped.
#[derive(Default)]
pub struct InMemoryDatabase {
    state: RwLock<MemoryState>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user(&self, email: &str, password_hash: &str) -> PortResult<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|c| c.user.email == email) {
            return Err(PortError::Conflict(format!("email {} is already registered", email)));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            plan: Plan::Free,
            created_at: now,
            updated_at: now,
        };
        state.users.push(UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let state = self.state.read().await;
        state
            .users
            .iter()
            .find(|c| c.user.id == user_id)
            .map(|c| c.user.clone())
            .ok_or_else(|| user_not_found(user_id))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let state = self.state.read().await;
        state
            .users
            .iter()
            .find(|c| c.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn create_collection(
        &self,
        owner_user_id: Uuid,
        collection: &NewCollection,
    ) -> PortResult<Collection> {
        let mut state = self.state.write().await;
        state.user_mut(owner_user_id)?;
        let now = Utc::now();
        let created = Collection {
            id: Uuid::new_v4(),
            owner_user_id,
            name: collection.name.clone(),
            is_public: collection.is_public,
            max_cards: collection.max_cards,
            created_at: now,
            updated_at: now,
        };
        state.collections.push(created.clone());
        Ok(created)
    }

    async fn get_collection(&self, collection_id: Uuid) -> PortResult<Collection> {
        let state = self.state.read().await;
        state.collection(collection_id).cloned()
    }

    async fn list_collections_by_owner(&self, owner_user_id: Uuid) -> PortResult<Vec<Collection>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .iter()
            .rev()
            .filter(|c| c.owner_user_id == owner_user_id)
            .cloned()
            .collect())
    }

    async fn update_collection(
        &self,
        collection_id: Uuid,
        changes: &CollectionChanges,
    ) -> PortResult<Collection> {
        let mut state = self.state.write().await;
        let collection = state
            .collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| collection_not_found(collection_id))?;
        if let Some(name) = &changes.name {
            collection.name = name.clone();
        }
        if let Some(is_public) = changes.is_public {
            collection.is_public = is_public;
        }
        if let Some(max_cards) = changes.max_cards {
            collection.max_cards = max_cards;
        }
        collection.updated_at = Utc::now();
        Ok(collection.clone())
    }

    async fn delete_collection(&self, collection_id: Uuid) -> PortResult<()> {
        let mut state = self.state.write().await;
        state.collection(collection_id)?;
        state.collections.retain(|c| c.id != collection_id);
        state.flashcards.retain(|f| f.collection_id != collection_id);
        state.shares.retain(|s| s.collection_id != collection_id);
        Ok(())
    }

    async fn create_flashcard(
        &self,
        collection_id: Uuid,
        flashcard: &NewFlashcard,
    ) -> PortResult<Flashcard> {
        let mut state = self.state.write().await;
        state.ensure_room(collection_id, 1)?;
        Ok(state.push_flashcard(collection_id, flashcard, Utc::now()))
    }

    async fn list_flashcards(&self, collection_id: Uuid) -> PortResult<Vec<Flashcard>> {
        let state = self.state.read().await;
        Ok(state
            .flashcards
            .iter()
            .rev()
            .filter(|f| f.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn get_flashcard(
        &self,
        collection_id: Uuid,
        flashcard_id: Uuid,
    ) -> PortResult<Flashcard> {
        let state = self.state.read().await;
        state
            .flashcards
            .iter()
            .find(|f| f.id == flashcard_id && f.collection_id == collection_id)
            .cloned()
            .ok_or_else(|| flashcard_not_found(flashcard_id))
    }

    async fn update_flashcard(
        &self,
        collection_id: Uuid,
        flashcard_id: Uuid,
        changes: &FlashcardChanges,
    ) -> PortResult<Flashcard> {
        let mut state = self.state.write().await;
        let flashcard = state.flashcard_mut(collection_id, flashcard_id)?;
        if let Some(front) = &changes.front {
            flashcard.front = front.clone();
        }
        if let Some(back) = &changes.back {
            flashcard.back = back.clone();
        }
        if let Some(video_url) = &changes.video_url {
            flashcard.video_url = Some(video_url.clone());
        }
        if let Some(extra) = &changes.extra {
            flashcard.extra = Some(extra.clone());
        }
        flashcard.updated_at = Utc::now();
        Ok(flashcard.clone())
    }

    async fn delete_flashcard(&self, collection_id: Uuid, flashcard_id: Uuid) -> PortResult<()> {
        let mut state = self.state.write().await;
        state.flashcard_mut(collection_id, flashcard_id)?;
        state
            .flashcards
            .retain(|f| !(f.id == flashcard_id && f.collection_id == collection_id));
        Ok(())
    }

    async fn find_share(
        &self,
        collection_id: Uuid,
        recipient_user_id: Uuid,
    ) -> PortResult<Option<Share>> {
        let state = self.state.read().await;
        Ok(state
            .shares
            .iter()
            .find(|s| s.collection_id == collection_id && s.recipient_user_id == recipient_user_id)
            .cloned())
    }

    async fn insert_share(&self, share: &NewShare) -> PortResult<Share> {
        let mut state = self.state.write().await;
        if !state.owns(share.owner_user_id, share.collection_id) {
            return Err(collection_not_found(share.collection_id));
        }
        if state.shares.iter().any(|s| s.share_code == share.share_code) {
            return Err(PortError::ShareCodeTaken);
        }
        if state.shares.iter().any(|s| {
            s.collection_id == share.collection_id && s.recipient_user_id == share.recipient_user_id
        }) {
            return Err(PortError::Conflict(format!(
                "collection {} is already shared with user {}",
                share.collection_id, share.recipient_user_id
            )));
        }
        let created = Share {
            id: Uuid::new_v4(),
            collection_id: share.collection_id,
            recipient_user_id: share.recipient_user_id,
            permission: share.permission,
            share_code: share.share_code.clone(),
            created_at: Utc::now(),
        };
        state.shares.push(created.clone());
        Ok(created)
    }

    async fn list_shares_for_collection(&self, collection_id: Uuid) -> PortResult<Vec<Share>> {
        let state = self.state.read().await;
        Ok(state
            .shares
            .iter()
            .filter(|s| s.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn list_shares_for_recipient(
        &self,
        recipient_user_id: Uuid,
    ) -> PortResult<Vec<SharedCollection>> {
        let state = self.state.read().await;
        state
            .shares
            .iter()
            .filter(|s| s.recipient_user_id == recipient_user_id)
            .map(|s| {
                Ok(SharedCollection {
                    share: s.clone(),
                    collection: state.collection(s.collection_id)?.clone(),
                })
            })
            .collect()
    }

    async fn update_share_permission(
        &self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
        permission: SharePermission,
    ) -> PortResult<Share> {
        let mut state = self.state.write().await;
        let share = state.owned_share_mut(owner_user_id, collection_id, share_id)?;
        share.permission = permission;
        Ok(share.clone())
    }

    async fn delete_share(
        &self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
    ) -> PortResult<()> {
        let mut state = self.state.write().await;
        state.owned_share_mut(owner_user_id, collection_id, share_id)?;
        state.shares.retain(|s| s.id != share_id);
        Ok(())
    }

    async fn activate_subscription(
        &self,
        user_id: Uuid,
        window: &PeriodWindow,
    ) -> PortResult<(SubscriptionPeriod, User)> {
        let mut state = self.state.write().await;
        state.user_mut(user_id)?;
        let now = Utc::now();
        state.cancel_active_periods(user_id, now);
        let period = SubscriptionPeriod {
            id: Uuid::new_v4(),
            user_id,
            plan: window.plan,
            external_ref: window.external_ref.clone(),
            status: PeriodStatus::Active,
            start_date: Some(window.start_date),
            end_date: Some(window.end_date),
            created_at: now,
            updated_at: now,
        };
        state.periods.push(period.clone());
        let user = state.set_plan(user_id, window.plan, now)?;
        Ok((period, user))
    }

    async fn create_pending_period(
        &self,
        user_id: Uuid,
        plan: Plan,
        external_ref: &str,
    ) -> PortResult<SubscriptionPeriod> {
        let mut state = self.state.write().await;
        state.user_mut(user_id)?;
        let now = Utc::now();
        let period = SubscriptionPeriod {
            id: Uuid::new_v4(),
            user_id,
            plan,
            external_ref: external_ref.to_string(),
            status: PeriodStatus::Pending,
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        };
        state.periods.push(period.clone());
        Ok(period)
    }

    async fn activate_pending_period(
        &self,
        user_id: Uuid,
        period_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> PortResult<(SubscriptionPeriod, User)> {
        let mut state = self.state.write().await;
        let is_pending = state.periods.iter().any(|p| {
            p.id == period_id && p.user_id == user_id && p.status == PeriodStatus::Pending
        });
        if !is_pending {
            return Err(PortError::NotFound(format!(
                "No pending subscription {} for user {}",
                period_id, user_id
            )));
        }
        let now = Utc::now();
        state.cancel_active_periods(user_id, now);
        let period = state
            .periods
            .iter_mut()
            .find(|p| p.id == period_id)
            .ok_or_else(|| PortError::Unexpected(format!("period {} vanished", period_id)))?;
        period.status = PeriodStatus::Active;
        period.start_date = Some(start_date);
        period.end_date = Some(end_date);
        period.updated_at = now;
        let period = period.clone();
        let user = state.set_plan(user_id, period.plan, now)?;
        Ok((period, user))
    }

    async fn cancel_active_subscription(
        &self,
        user_id: Uuid,
    ) -> PortResult<(SubscriptionPeriod, User)> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let period = state
            .periods
            .iter_mut()
            .filter(|p| p.user_id == user_id && p.status == PeriodStatus::Active)
            .max_by_key(|p| p.end_date)
            .ok_or_else(|| {
                PortError::NotFound(format!("No active subscription for user {}", user_id))
            })?;
        period.status = PeriodStatus::Canceled;
        period.updated_at = now;
        let period = period.clone();
        let user = state.set_plan(user_id, Plan::Free, now)?;
        Ok((period, user))
    }

    async fn list_periods(&self, user_id: Uuid) -> PortResult<Vec<SubscriptionPeriod>> {
        let state = self.state.read().await;
        Ok(state
            .periods
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn generation_usage(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Option<GenerationLog>> {
        let state = self.state.read().await;
        Ok(state
            .generation_logs
            .iter()
            .find(|l| l.user_id == user_id && l.date == date)
            .cloned())
    }

    async fn record_generation(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        daily_limit: i32,
        collection_id: Uuid,
        cards: &[NewFlashcard],
    ) -> PortResult<(Vec<Flashcard>, GenerationLog)> {
        let mut state = self.state.write().await;
        state.user_mut(user_id)?;
        let used = state
            .generation_logs
            .iter()
            .find(|l| l.user_id == user_id && l.date == date)
            .map_or(0, |l| l.count);
        if used >= daily_limit {
            return Err(PortError::RateLimited(format!(
                "daily limit of {} generations reached",
                daily_limit
            )));
        }
        state.ensure_room(collection_id, cards.len())?;

        let now = Utc::now();
        let created: Vec<Flashcard> = cards
            .iter()
            .map(|card| state.push_flashcard(collection_id, card, now))
            .collect();
        if let Some(log) = state
            .generation_logs
            .iter_mut()
            .find(|l| l.user_id == user_id && l.date == date)
        {
            log.count += 1;
            return Ok((created, log.clone()));
        }
        let log = GenerationLog {
            id: Uuid::new_v4(),
            user_id,
            date,
            count: 1,
            created_at: now,
        };
        state.generation_logs.push(log.clone());
        Ok((created, log))
    }
}
