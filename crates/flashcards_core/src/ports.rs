//! crates/flashcards_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! password hashing or token signing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Collection, CollectionChanges, Flashcard, FlashcardChanges, GeneratedCard, GenerationLog,
    GenerationRequest, NewCollection, NewFlashcard, NewShare, PeriodWindow, Plan, SessionClaims,
    SessionToken, Share, SharePermission, SharedCollection, SubscriptionPeriod, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and core operations.
/// This abstracts away the specific errors from external services (e.g., database, crypto).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Recipient {0} does not exist")]
    InvalidRecipient(Uuid),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// An external dependency (such as the card generator) is not configured or not answering.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// The generated share code is already in use. Only the sharing manager sees this.
    #[error("Share code already taken")]
    ShareCodeTaken,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for every entity the service owns.
///
/// Methods documented as atomic must either apply all of their writes or none,
/// and must perform their checks against the same snapshot as their writes.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---

    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, email: &str, password_hash: &str) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Collections ---

    async fn create_collection(
        &self,
        owner_user_id: Uuid,
        collection: &NewCollection,
    ) -> PortResult<Collection>;

    async fn get_collection(&self, collection_id: Uuid) -> PortResult<Collection>;

    /// Newest first.
    async fn list_collections_by_owner(&self, owner_user_id: Uuid) -> PortResult<Vec<Collection>>;

    async fn update_collection(
        &self,
        collection_id: Uuid,
        changes: &CollectionChanges,
    ) -> PortResult<Collection>;

    /// Removes the collection together with its flashcards and shares.
    async fn delete_collection(&self, collection_id: Uuid) -> PortResult<()>;

    // --- Flashcards ---

    /// Atomic: fails with `Conflict` when the collection already holds `max_cards` cards.
    async fn create_flashcard(
        &self,
        collection_id: Uuid,
        flashcard: &NewFlashcard,
    ) -> PortResult<Flashcard>;

    /// Newest first.
    async fn list_flashcards(&self, collection_id: Uuid) -> PortResult<Vec<Flashcard>>;

    async fn get_flashcard(&self, collection_id: Uuid, flashcard_id: Uuid)
        -> PortResult<Flashcard>;

    async fn update_flashcard(
        &self,
        collection_id: Uuid,
        flashcard_id: Uuid,
        changes: &FlashcardChanges,
    ) -> PortResult<Flashcard>;

    async fn delete_flashcard(&self, collection_id: Uuid, flashcard_id: Uuid) -> PortResult<()>;

    // --- Shares ---

    async fn find_share(
        &self,
        collection_id: Uuid,
        recipient_user_id: Uuid,
    ) -> PortResult<Option<Share>>;

    /// Atomic: re-checks that `share.owner_user_id` owns the collection (`NotFound`
    /// otherwise). A taken code yields `ShareCodeTaken`, an existing grant for the
    /// same recipient yields `Conflict`.
    async fn insert_share(&self, share: &NewShare) -> PortResult<Share>;

    async fn list_shares_for_collection(&self, collection_id: Uuid) -> PortResult<Vec<Share>>;

    async fn list_shares_for_recipient(
        &self,
        recipient_user_id: Uuid,
    ) -> PortResult<Vec<SharedCollection>>;

    /// Atomic, scoped by owner and collection: `NotFound` when no such share exists.
    async fn update_share_permission(
        &self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
        permission: SharePermission,
    ) -> PortResult<Share>;

    /// Atomic, scoped by owner and collection: `NotFound` when no such share exists.
    async fn delete_share(
        &self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
    ) -> PortResult<()>;

    // --- Subscription periods ---

    /// Atomic: cancels any active period of the user, inserts `window` as the new
    /// active period and sets the user's plan to `window.plan`.
    async fn activate_subscription(
        &self,
        user_id: Uuid,
        window: &PeriodWindow,
    ) -> PortResult<(SubscriptionPeriod, User)>;

    async fn create_pending_period(
        &self,
        user_id: Uuid,
        plan: Plan,
        external_ref: &str,
    ) -> PortResult<SubscriptionPeriod>;

    /// Atomic: turns the user's pending period into the active one, canceling any
    /// prior active period and updating the user's plan. `NotFound` when the
    /// period is not a pending period of this user.
    async fn activate_pending_period(
        &self,
        user_id: Uuid,
        period_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> PortResult<(SubscriptionPeriod, User)>;

    /// Atomic: cancels the active period with the latest end date and resets the
    /// user to the free plan. `NotFound` when nothing is active.
    async fn cancel_active_subscription(
        &self,
        user_id: Uuid,
    ) -> PortResult<(SubscriptionPeriod, User)>;

    /// Newest-created first.
    async fn list_periods(&self, user_id: Uuid) -> PortResult<Vec<SubscriptionPeriod>>;

    // --- Usage ---

    async fn generation_usage(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Option<GenerationLog>>;

    /// Atomic: fails with `RateLimited` when the user's counter for `date` already
    /// reached `daily_limit`, and with `Conflict` when `cards` do not all fit in the
    /// collection. Otherwise inserts every card and increments the counter by one.
    async fn record_generation(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        daily_limit: i32,
        collection_id: Uuid,
        cards: &[NewFlashcard],
    ) -> PortResult<(Vec<Flashcard>, GenerationLog)>;
}

/// Turns free text or a topic into question/answer pairs.
#[async_trait]
pub trait FlashcardGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<Vec<GeneratedCard>>;
}

/// Hashes and checks passwords.
pub trait CredentialVerifier: Send + Sync {
    fn hash_password(&self, password: &str) -> PortResult<String>;

    /// `Ok(false)` for a wrong password; errors are reserved for unreadable hashes.
    fn verify_password(&self, password: &str, password_hash: &str) -> PortResult<bool>;

    /// Does the work of one failed `verify_password` when there is no stored hash,
    /// so unknown accounts answer as slowly as wrong passwords. Always `false`.
    fn verify_unknown(&self, password: &str) -> bool;
}

/// Mints and validates bearer tokens.
pub trait SessionIssuer: Send + Sync {
    fn issue(&self, user: &User) -> PortResult<SessionToken>;

    /// `Unauthorized` for malformed, forged or expired tokens.
    fn validate(&self, token: &str) -> PortResult<SessionClaims>;
}
