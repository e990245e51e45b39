//! crates/flashcards_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

//=========================================================================================
// Enumerations
//=========================================================================================

/// The subscription plan attached to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Admin,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Admin => "admin",
        }
    }
}

impl FromStr for Plan {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "admin" => Ok(Plan::Admin),
            other => Err(PortError::InvalidInput(format!("unknown plan '{}'", other))),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The access level a share grants to its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharePermission {
    Read,
    Write,
}

impl SharePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::Read => "read",
            SharePermission::Write => "write",
        }
    }
}

impl FromStr for SharePermission {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(SharePermission::Read),
            "write" => Ok(SharePermission::Write),
            other => Err(PortError::InvalidInput(format!(
                "permission must be 'read' or 'write', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SharePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a billed subscription period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodStatus {
    Pending,
    Active,
    Canceled,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Pending => "pending",
            PeriodStatus::Active => "active",
            PeriodStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for PeriodStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PeriodStatus::Pending),
            "active" => Ok(PeriodStatus::Active),
            "canceled" => Ok(PeriodStatus::Canceled),
            other => Err(PortError::Unexpected(format!(
                "unknown period status '{}'",
                other
            ))),
        }
    }
}

//=========================================================================================
// Users
//=========================================================================================

/// Represents a user - used throughout the app. Never carries the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

//=========================================================================================
// Collections & Flashcards
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub max_cards: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a collection.
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub name: String,
    pub is_public: bool,
    pub max_cards: i32,
}

/// A partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CollectionChanges {
    pub name: Option<String>,
    pub is_public: Option<bool>,
    pub max_cards: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flashcard {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub front: String,
    pub back: String,
    pub video_url: Option<String>,
    pub extra: Option<Map<String, Value>>,
    pub created_by_generation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFlashcard {
    pub front: String,
    pub back: String,
    pub video_url: Option<String>,
    pub extra: Option<Map<String, Value>>,
    pub created_by_generation: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FlashcardChanges {
    pub front: Option<String>,
    pub back: Option<String>,
    pub video_url: Option<String>,
    pub extra: Option<Map<String, Value>>,
}

//=========================================================================================
// Sharing
//=========================================================================================

/// A grant of access over a collection to a user other than its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub recipient_user_id: Uuid,
    pub permission: SharePermission,
    pub share_code: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the store needs to persist a share. `owner_user_id` is re-checked
/// against the collection inside the insert.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub owner_user_id: Uuid,
    pub collection_id: Uuid,
    pub recipient_user_id: Uuid,
    pub permission: SharePermission,
    pub share_code: String,
}

/// A share seen from the recipient's side, with the collection attached.
#[derive(Debug, Clone)]
pub struct SharedCollection {
    pub share: Share,
    pub collection: Collection,
}

//=========================================================================================
// Subscriptions & Usage
//=========================================================================================

/// A billed plan window (stored in the `payments` table).
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPeriod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: Plan,
    pub external_ref: String,
    pub status: PeriodStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The active window to open for a user.
#[derive(Debug, Clone)]
pub struct PeriodWindow {
    pub plan: Plan,
    pub external_ref: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// What the generator is asked to work from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationInput {
    /// Extract cards from the supplied text.
    Text,
    /// Write cards about the supplied subject.
    Topic,
}

impl GenerationInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationInput::Text => "text",
            GenerationInput::Topic => "topic",
        }
    }
}

impl FromStr for GenerationInput {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(GenerationInput::Text),
            "topic" => Ok(GenerationInput::Topic),
            other => Err(PortError::InvalidInput(format!(
                "input_type must be 'text' or 'topic', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub input: GenerationInput,
    pub content: String,
}

/// One question/answer pair proposed by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
}

/// Daily counter of assisted card generations.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub count: i32,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Sessions
//=========================================================================================

/// The claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub plan: Plan,
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted bearer token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
