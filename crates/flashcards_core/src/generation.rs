//! crates/flashcards_core/src/generation.rs
//!
//! Assisted card generation, metered per user and UTC day by plan.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{AccessControl, Action};
use crate::domain::{Flashcard, GenerationRequest, NewFlashcard, Plan};
use crate::ports::{DatabaseService, FlashcardGenerator, PortError, PortResult};
use crate::validation;

pub const FREE_DAILY_GENERATIONS: i32 = 6;
pub const PRO_DAILY_GENERATIONS: i32 = 999;

/// How many generation requests a plan may make per day.
pub fn daily_generation_limit(plan: Plan) -> i32 {
    match plan {
        Plan::Free => FREE_DAILY_GENERATIONS,
        Plan::Pro | Plan::Admin => PRO_DAILY_GENERATIONS,
    }
}

/// A user's generation budget for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationUsage {
    pub date: NaiveDate,
    pub generated_today: i32,
    pub daily_limit: i32,
    pub remaining: i32,
}

impl GenerationUsage {
    fn new(date: NaiveDate, generated_today: i32, daily_limit: i32) -> Self {
        Self {
            date,
            generated_today,
            daily_limit,
            remaining: (daily_limit - generated_today).max(0),
        }
    }
}

/// The cards a generation stored, with the budget left afterwards.
#[derive(Debug, Clone)]
pub struct Generation {
    pub flashcards: Vec<Flashcard>,
    pub usage: GenerationUsage,
}

#[derive(Clone)]
pub struct GenerationService {
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn FlashcardGenerator>,
    access: AccessControl,
}

impl GenerationService {
    pub fn new(db: Arc<dyn DatabaseService>, generator: Arc<dyn FlashcardGenerator>) -> Self {
        Self {
            access: AccessControl::new(db.clone()),
            db,
            generator,
        }
    }

    /// The limit follows the plan stored for the user, not the one in their token.
    pub async fn usage(&self, user_id: Uuid, date: NaiveDate) -> PortResult<GenerationUsage> {
        let user = self.db.get_user(user_id).await?;
        let used = self
            .db
            .generation_usage(user_id, date)
            .await?
            .map_or(0, |log| log.count);
        Ok(GenerationUsage::new(
            date,
            used,
            daily_generation_limit(user.plan),
        ))
    }

    /// Generates cards into a collection the actor may write to.
    ///
    /// Cards beyond the collection's free room are dropped. A failed generation
    /// does not count against the daily budget.
    pub async fn generate(
        &self,
        actor: Uuid,
        collection_id: Uuid,
        request: GenerationRequest,
        date: NaiveDate,
    ) -> PortResult<Generation> {
        if request.content.trim().is_empty() {
            return Err(PortError::InvalidInput("content must not be empty".to_string()));
        }
        let collection = self
            .access
            .resolve(actor, collection_id, Action::Write)
            .await?;

        let usage = self.usage(actor, date).await?;
        if usage.remaining == 0 {
            return Err(PortError::RateLimited(format!(
                "daily limit of {} generations reached",
                usage.daily_limit
            )));
        }

        let held = self.db.list_flashcards(collection.id).await?.len();
        let room = (collection.max_cards.max(0) as usize).saturating_sub(held);
        if room == 0 {
            return Err(PortError::Conflict(format!(
                "collection {} already holds its maximum of {} cards",
                collection.id, collection.max_cards
            )));
        }

        let proposed = self.generator.generate(&request).await?;
        let proposed_count = proposed.len();
        let cards: Vec<NewFlashcard> = proposed
            .into_iter()
            .filter(|card| {
                validation::front(&card.front).is_ok() && validation::back(&card.back).is_ok()
            })
            .take(room)
            .map(|card| NewFlashcard {
                front: card.front,
                back: card.back,
                video_url: None,
                extra: None,
                created_by_generation: true,
            })
            .collect();
        if cards.is_empty() {
            warn!(proposed_count, "generator returned no usable cards");
            return Err(PortError::Unexpected(
                "the generator returned no usable cards".to_string(),
            ));
        }

        let (flashcards, log) = self
            .db
            .record_generation(actor, date, usage.daily_limit, collection.id, &cards)
            .await?;
        info!(
            %collection_id,
            created = flashcards.len(),
            proposed_count,
            input = request.input.as_str(),
            "flashcards generated"
        );
        Ok(Generation {
            flashcards,
            usage: GenerationUsage::new(date, log.count, usage.daily_limit),
        })
    }
}
