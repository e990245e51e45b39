//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Check-then-write operations run inside a transaction and lock the rows they
//! check (`SELECT ... FOR UPDATE`), so concurrent requests serialize on the
//! collection or user they touch.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use flashcards_core::domain::{
    Collection, CollectionChanges, Flashcard, FlashcardChanges, GenerationLog, NewCollection,
    NewFlashcard, NewShare, PeriodWindow, Plan, Share, SharePermission, SharedCollection,
    SubscriptionPeriod, User, UserCredentials,
};
use flashcards_core::ports::{DatabaseService, PortError, PortResult};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, plan, created_at, updated_at";
const COLLECTION_COLUMNS: &str =
    "id, owner_user_id, name, is_public, max_cards, created_at, updated_at";
const FLASHCARD_COLUMNS: &str = "id, collection_id, front, back, video_url, extra, \
     created_by_generation, created_at, updated_at";
const SHARE_COLUMNS: &str = "id, collection_id, recipient_user_id, permission, share_code, created_at";
const PERIOD_COLUMNS: &str =
    "id, user_id, plan, external_ref, status, start_date, end_date, created_at, updated_at";

const SHARE_CODE_CONSTRAINT: &str = "shares_share_code_key";
const SHARE_RECIPIENT_CONSTRAINT: &str = "shares_collection_recipient_key";
const USER_EMAIL_CONSTRAINT: &str = "users_email_key";
const GENERATION_LOG_CONSTRAINT: &str = "generation_logs_user_date_key";
const GENERATION_LOG_COLUMNS: &str = "id, user_id, date, count, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// The name of the unique constraint a failed write violated, if any.
fn violated_unique_constraint(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// Locks the user row for the rest of the transaction.
async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> PortResult<()> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(unexpected)?
        .map(|_| ())
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
}

/// Locks the collection row and fails with `Conflict` unless `extra` more cards fit.
async fn ensure_room(conn: &mut PgConnection, collection_id: Uuid, extra: usize) -> PortResult<()> {
    let max_cards = sqlx::query_scalar::<_, i32>(
        "SELECT max_cards FROM collections WHERE id = $1 FOR UPDATE",
    )
    .bind(collection_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(unexpected)?
    .ok_or_else(|| PortError::NotFound(format!("Collection {} not found", collection_id)))?;

    let held = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM flashcards WHERE collection_id = $1")
        .bind(collection_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(unexpected)?;
    if held + extra as i64 > i64::from(max_cards) {
        return Err(PortError::Conflict(format!(
            "collection {} already holds its maximum of {} cards",
            collection_id, max_cards
        )));
    }
    Ok(())
}

async fn insert_flashcard(
    conn: &mut PgConnection,
    collection_id: Uuid,
    flashcard: &NewFlashcard,
    now: DateTime<Utc>,
) -> PortResult<Flashcard> {
    sqlx::query_as::<_, FlashcardRecord>(&format!(
        "INSERT INTO flashcards (id, collection_id, front, back, video_url, extra, \
             created_by_generation, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING {}",
        FLASHCARD_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(collection_id)
    .bind(&flashcard.front)
    .bind(&flashcard.back)
    .bind(flashcard.video_url.as_deref())
    .bind(extra_value(&flashcard.extra))
    .bind(flashcard.created_by_generation)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(unexpected)?
    .to_domain()
}

/// Bumps the user's counter for `date`, creating it on first use. Fails with
/// `RateLimited` when the counter already reached `daily_limit`.
async fn increment_generation(
    conn: &mut PgConnection,
    user_id: Uuid,
    date: NaiveDate,
    daily_limit: i32,
    now: DateTime<Utc>,
) -> PortResult<GenerationLog> {
    sqlx::query_as::<_, GenerationLogRecord>(&format!(
        "INSERT INTO generation_logs (id, user_id, date, count, created_at) \
         VALUES ($1, $2, $3, 1, $4) \
         ON CONFLICT ON CONSTRAINT {} \
         DO UPDATE SET count = generation_logs.count + 1 \
         WHERE generation_logs.count < $5 \
         RETURNING {}",
        GENERATION_LOG_CONSTRAINT, GENERATION_LOG_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .bind(now)
    .bind(daily_limit)
    .fetch_optional(conn)
    .await
    .map_err(unexpected)?
    .map(|r| r.to_domain())
    .ok_or_else(|| {
        PortError::RateLimited(format!("daily limit of {} generations reached", daily_limit))
    })
}

async fn cancel_active_periods(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> PortResult<()> {
    sqlx::query(
        "UPDATE payments SET status = 'canceled', updated_at = $2 \
         WHERE user_id = $1 AND status = 'active'",
    )
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await
    .map_err(unexpected)?;
    Ok(())
}

async fn set_plan(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan: Plan,
    now: DateTime<Utc>,
) -> PortResult<User> {
    sqlx::query_as::<_, UserRecord>(&format!(
        "UPDATE users SET plan = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(user_id)
    .bind(plan.as_str())
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(unexpected)?
    .to_domain()
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    plan: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            plan: self.plan.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    password_hash: String,
}

#[derive(FromRow)]
struct CollectionRecord {
    id: Uuid,
    owner_user_id: Uuid,
    name: String,
    is_public: bool,
    max_cards: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CollectionRecord {
    fn to_domain(self) -> Collection {
        Collection {
            id: self.id,
            owner_user_id: self.owner_user_id,
            name: self.name,
            is_public: self.is_public,
            max_cards: self.max_cards,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct FlashcardRecord {
    id: Uuid,
    collection_id: Uuid,
    front: String,
    back: String,
    video_url: Option<String>,
    extra: Option<Value>,
    created_by_generation: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl FlashcardRecord {
    fn to_domain(self) -> PortResult<Flashcard> {
        let extra = match self.extra {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(PortError::Unexpected(format!(
                    "flashcard {} has a non-object extra field",
                    self.id
                )))
            }
        };
        Ok(Flashcard {
            id: self.id,
            collection_id: self.collection_id,
            front: self.front,
            back: self.back,
            video_url: self.video_url,
            extra,
            created_by_generation: self.created_by_generation,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ShareRecord {
    id: Uuid,
    collection_id: Uuid,
    recipient_user_id: Uuid,
    permission: String,
    share_code: String,
    created_at: DateTime<Utc>,
}
impl ShareRecord {
    fn to_domain(self) -> PortResult<Share> {
        Ok(Share {
            id: self.id,
            collection_id: self.collection_id,
            recipient_user_id: self.recipient_user_id,
            permission: self
                .permission
                .parse()
                .map_err(|_| PortError::Unexpected(format!("share {} has a bad permission", self.id)))?,
            share_code: self.share_code,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct SharedCollectionRecord {
    share_id: Uuid,
    collection_id: Uuid,
    recipient_user_id: Uuid,
    permission: String,
    share_code: String,
    share_created_at: DateTime<Utc>,
    owner_user_id: Uuid,
    name: String,
    is_public: bool,
    max_cards: i32,
    collection_created_at: DateTime<Utc>,
    collection_updated_at: DateTime<Utc>,
}
impl SharedCollectionRecord {
    fn to_domain(self) -> PortResult<SharedCollection> {
        let share = ShareRecord {
            id: self.share_id,
            collection_id: self.collection_id,
            recipient_user_id: self.recipient_user_id,
            permission: self.permission,
            share_code: self.share_code,
            created_at: self.share_created_at,
        }
        .to_domain()?;
        let collection = Collection {
            id: self.collection_id,
            owner_user_id: self.owner_user_id,
            name: self.name,
            is_public: self.is_public,
            max_cards: self.max_cards,
            created_at: self.collection_created_at,
            updated_at: self.collection_updated_at,
        };
        Ok(SharedCollection { share, collection })
    }
}

#[derive(FromRow)]
struct PeriodRecord {
    id: Uuid,
    user_id: Uuid,
    plan: String,
    external_ref: String,
    status: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PeriodRecord {
    fn to_domain(self) -> PortResult<SubscriptionPeriod> {
        Ok(SubscriptionPeriod {
            id: self.id,
            user_id: self.user_id,
            plan: self.plan.parse()?,
            external_ref: self.external_ref,
            status: self.status.parse()?,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct GenerationLogRecord {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    count: i32,
    created_at: DateTime<Utc>,
}
impl GenerationLogRecord {
    fn to_domain(self) -> GenerationLog {
        GenerationLog {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            count: self.count,
            created_at: self.created_at,
        }
    }
}

fn extra_value(extra: &Option<Map<String, Value>>) -> Option<Value> {
    extra.clone().map(Value::Object)
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Users ---

    async fn create_user(&self, email: &str, password_hash: &str) -> PortResult<User> {
        let now = Utc::now();
        sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, password_hash, plan, created_at, updated_at) \
             VALUES ($1, $2, $3, 'free', $4, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_unique_constraint(&e).as_deref() {
            Some(USER_EMAIL_CONSTRAINT) => {
                PortError::Conflict(format!("email {} is already registered", email))
            }
            _ => unexpected(e),
        })?
        .to_domain()
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?
        .to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(&format!(
            "SELECT {}, password_hash FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User with email {} not found", email))
            }
            _ => unexpected(e),
        })?;
        Ok(UserCredentials {
            user: record.user.to_domain()?,
            password_hash: record.password_hash,
        })
    }

    // --- Collections ---

    async fn create_collection(
        &self,
        owner_user_id: Uuid,
        collection: &NewCollection,
    ) -> PortResult<Collection> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, CollectionRecord>(&format!(
            "INSERT INTO collections (id, owner_user_id, name, is_public, max_cards, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {}",
            COLLECTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner_user_id)
        .bind(&collection.name)
        .bind(collection.is_public)
        .bind(collection.max_cards)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                PortError::NotFound(format!("User {} not found", owner_user_id))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_collection(&self, collection_id: Uuid) -> PortResult<Collection> {
        let record = sqlx::query_as::<_, CollectionRecord>(&format!(
            "SELECT {} FROM collections WHERE id = $1",
            COLLECTION_COLUMNS
        ))
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Collection {} not found", collection_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_collections_by_owner(&self, owner_user_id: Uuid) -> PortResult<Vec<Collection>> {
        let records = sqlx::query_as::<_, CollectionRecord>(&format!(
            "SELECT {} FROM collections WHERE owner_user_id = $1 ORDER BY created_at DESC",
            COLLECTION_COLUMNS
        ))
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_collection(
        &self,
        collection_id: Uuid,
        changes: &CollectionChanges,
    ) -> PortResult<Collection> {
        let record = sqlx::query_as::<_, CollectionRecord>(&format!(
            "UPDATE collections SET \
                 name = COALESCE($2, name), \
                 is_public = COALESCE($3, is_public), \
                 max_cards = COALESCE($4, max_cards), \
                 updated_at = $5 \
             WHERE id = $1 RETURNING {}",
            COLLECTION_COLUMNS
        ))
        .bind(collection_id)
        .bind(changes.name.as_deref())
        .bind(changes.is_public)
        .bind(changes.max_cards)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Collection {} not found", collection_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_collection(&self, collection_id: Uuid) -> PortResult<()> {
        // Flashcards and shares go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(collection_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Collection {} not found",
                collection_id
            )));
        }
        Ok(())
    }

    // --- Flashcards ---

    async fn create_flashcard(
        &self,
        collection_id: Uuid,
        flashcard: &NewFlashcard,
    ) -> PortResult<Flashcard> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        ensure_room(&mut *tx, collection_id, 1).await?;
        let created = insert_flashcard(&mut *tx, collection_id, flashcard, Utc::now()).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(created)
    }

    async fn list_flashcards(&self, collection_id: Uuid) -> PortResult<Vec<Flashcard>> {
        sqlx::query_as::<_, FlashcardRecord>(&format!(
            "SELECT {} FROM flashcards WHERE collection_id = $1 ORDER BY created_at DESC",
            FLASHCARD_COLUMNS
        ))
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(|r| r.to_domain())
        .collect()
    }

    async fn get_flashcard(
        &self,
        collection_id: Uuid,
        flashcard_id: Uuid,
    ) -> PortResult<Flashcard> {
        sqlx::query_as::<_, FlashcardRecord>(&format!(
            "SELECT {} FROM flashcards WHERE id = $1 AND collection_id = $2",
            FLASHCARD_COLUMNS
        ))
        .bind(flashcard_id)
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Flashcard {} not found", flashcard_id))
            }
            _ => unexpected(e),
        })?
        .to_domain()
    }

    async fn update_flashcard(
        &self,
        collection_id: Uuid,
        flashcard_id: Uuid,
        changes: &FlashcardChanges,
    ) -> PortResult<Flashcard> {
        sqlx::query_as::<_, FlashcardRecord>(&format!(
            "UPDATE flashcards SET \
                 front = COALESCE($3, front), \
                 back = COALESCE($4, back), \
                 video_url = COALESCE($5, video_url), \
                 extra = COALESCE($6, extra), \
                 updated_at = $7 \
             WHERE id = $1 AND collection_id = $2 RETURNING {}",
            FLASHCARD_COLUMNS
        ))
        .bind(flashcard_id)
        .bind(collection_id)
        .bind(changes.front.as_deref())
        .bind(changes.back.as_deref())
        .bind(changes.video_url.as_deref())
        .bind(extra_value(&changes.extra))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Flashcard {} not found", flashcard_id)))?
        .to_domain()
    }

    async fn delete_flashcard(&self, collection_id: Uuid, flashcard_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = $1 AND collection_id = $2")
            .bind(flashcard_id)
            .bind(collection_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Flashcard {} not found",
                flashcard_id
            )));
        }
        Ok(())
    }

    // --- Shares ---

    async fn find_share(
        &self,
        collection_id: Uuid,
        recipient_user_id: Uuid,
    ) -> PortResult<Option<Share>> {
        sqlx::query_as::<_, ShareRecord>(&format!(
            "SELECT {} FROM shares WHERE collection_id = $1 AND recipient_user_id = $2",
            SHARE_COLUMNS
        ))
        .bind(collection_id)
        .bind(recipient_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(|r| r.to_domain())
        .transpose()
    }

    async fn insert_share(&self, share: &NewShare) -> PortResult<Share> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let owned = sqlx::query("SELECT id FROM collections WHERE id = $1 AND owner_user_id = $2 FOR UPDATE")
            .bind(share.collection_id)
            .bind(share.owner_user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        if owned.is_none() {
            return Err(PortError::NotFound(format!(
                "Collection {} not found",
                share.collection_id
            )));
        }

        let record = sqlx::query_as::<_, ShareRecord>(&format!(
            "INSERT INTO shares (id, collection_id, recipient_user_id, permission, share_code, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            SHARE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(share.collection_id)
        .bind(share.recipient_user_id)
        .bind(share.permission.as_str())
        .bind(&share.share_code)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violated_unique_constraint(&e).as_deref() {
            Some(SHARE_CODE_CONSTRAINT) => PortError::ShareCodeTaken,
            Some(SHARE_RECIPIENT_CONSTRAINT) => PortError::Conflict(format!(
                "collection {} is already shared with user {}",
                share.collection_id, share.recipient_user_id
            )),
            _ if is_foreign_key_violation(&e) => {
                PortError::InvalidRecipient(share.recipient_user_id)
            }
            _ => unexpected(e),
        })?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_shares_for_collection(&self, collection_id: Uuid) -> PortResult<Vec<Share>> {
        sqlx::query_as::<_, ShareRecord>(&format!(
            "SELECT {} FROM shares WHERE collection_id = $1 ORDER BY created_at",
            SHARE_COLUMNS
        ))
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(|r| r.to_domain())
        .collect()
    }

    async fn list_shares_for_recipient(
        &self,
        recipient_user_id: Uuid,
    ) -> PortResult<Vec<SharedCollection>> {
        sqlx::query_as::<_, SharedCollectionRecord>(
            "SELECT s.id AS share_id, s.collection_id, s.recipient_user_id, s.permission, \
                    s.share_code, s.created_at AS share_created_at, \
                    c.owner_user_id, c.name, c.is_public, c.max_cards, \
                    c.created_at AS collection_created_at, c.updated_at AS collection_updated_at \
             FROM shares s JOIN collections c ON c.id = s.collection_id \
             WHERE s.recipient_user_id = $1 \
             ORDER BY s.created_at",
        )
        .bind(recipient_user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(|r| r.to_domain())
        .collect()
    }

    async fn update_share_permission(
        &self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
        permission: SharePermission,
    ) -> PortResult<Share> {
        sqlx::query_as::<_, ShareRecord>(
            "UPDATE shares s SET permission = $4 \
             FROM collections c \
             WHERE s.id = $3 AND s.collection_id = $2 \
               AND c.id = s.collection_id AND c.owner_user_id = $1 \
             RETURNING s.id, s.collection_id, s.recipient_user_id, s.permission, \
                       s.share_code, s.created_at",
        )
        .bind(owner_user_id)
        .bind(collection_id)
        .bind(share_id)
        .bind(permission.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Share {} not found", share_id)))?
        .to_domain()
    }

    async fn delete_share(
        &self,
        owner_user_id: Uuid,
        collection_id: Uuid,
        share_id: Uuid,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "DELETE FROM shares s USING collections c \
             WHERE s.id = $3 AND s.collection_id = $2 \
               AND c.id = s.collection_id AND c.owner_user_id = $1",
        )
        .bind(owner_user_id)
        .bind(collection_id)
        .bind(share_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Share {} not found", share_id)));
        }
        Ok(())
    }

    // --- Subscription periods ---

    async fn activate_subscription(
        &self,
        user_id: Uuid,
        window: &PeriodWindow,
    ) -> PortResult<(SubscriptionPeriod, User)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_user(&mut *tx, user_id).await?;

        let now = Utc::now();
        cancel_active_periods(&mut *tx, user_id, now).await?;

        let period = sqlx::query_as::<_, PeriodRecord>(&format!(
            "INSERT INTO payments (id, user_id, plan, external_ref, status, start_date, end_date, \
                 created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $7) RETURNING {}",
            PERIOD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(window.plan.as_str())
        .bind(&window.external_ref)
        .bind(window.start_date)
        .bind(window.end_date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain()?;

        let user = set_plan(&mut *tx, user_id, window.plan, now).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok((period, user))
    }

    async fn create_pending_period(
        &self,
        user_id: Uuid,
        plan: Plan,
        external_ref: &str,
    ) -> PortResult<SubscriptionPeriod> {
        let now = Utc::now();
        sqlx::query_as::<_, PeriodRecord>(&format!(
            "INSERT INTO payments (id, user_id, plan, external_ref, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'pending', $5, $5) RETURNING {}",
            PERIOD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(plan.as_str())
        .bind(external_ref)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                PortError::NotFound(format!("User {} not found", user_id))
            } else {
                unexpected(e)
            }
        })?
        .to_domain()
    }

    async fn activate_pending_period(
        &self,
        user_id: Uuid,
        period_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> PortResult<(SubscriptionPeriod, User)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_user(&mut *tx, user_id).await?;

        let pending = sqlx::query("SELECT id FROM payments WHERE id = $1 AND user_id = $2 AND status = 'pending' FOR UPDATE")
            .bind(period_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        if pending.is_none() {
            return Err(PortError::NotFound(format!(
                "No pending subscription {} for user {}",
                period_id, user_id
            )));
        }

        let now = Utc::now();
        cancel_active_periods(&mut *tx, user_id, now).await?;

        let period = sqlx::query_as::<_, PeriodRecord>(&format!(
            "UPDATE payments SET status = 'active', start_date = $2, end_date = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {}",
            PERIOD_COLUMNS
        ))
        .bind(period_id)
        .bind(start_date)
        .bind(end_date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain()?;

        let user = set_plan(&mut *tx, user_id, period.plan, now).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok((period, user))
    }

    async fn cancel_active_subscription(
        &self,
        user_id: Uuid,
    ) -> PortResult<(SubscriptionPeriod, User)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_user(&mut *tx, user_id).await?;

        let now = Utc::now();
        let period = sqlx::query_as::<_, PeriodRecord>(&format!(
            "UPDATE payments SET status = 'canceled', updated_at = $2 \
             WHERE id = ( \
                 SELECT id FROM payments WHERE user_id = $1 AND status = 'active' \
                 ORDER BY end_date DESC LIMIT 1 \
             ) RETURNING {}",
            PERIOD_COLUMNS
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("No active subscription for user {}", user_id)))?
        .to_domain()?;

        let user = set_plan(&mut *tx, user_id, Plan::Free, now).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok((period, user))
    }

    async fn list_periods(&self, user_id: Uuid) -> PortResult<Vec<SubscriptionPeriod>> {
        sqlx::query_as::<_, PeriodRecord>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            PERIOD_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(|r| r.to_domain())
        .collect()
    }

    // --- Usage ---

    async fn generation_usage(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Option<GenerationLog>> {
        let record = sqlx::query_as::<_, GenerationLogRecord>(&format!(
            "SELECT {} FROM generation_logs WHERE user_id = $1 AND date = $2",
            GENERATION_LOG_COLUMNS
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn record_generation(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        daily_limit: i32,
        collection_id: Uuid,
        cards: &[NewFlashcard],
    ) -> PortResult<(Vec<Flashcard>, GenerationLog)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        lock_user(&mut *tx, user_id).await?;
        let now = Utc::now();
        let log = increment_generation(&mut *tx, user_id, date, daily_limit, now).await?;
        ensure_room(&mut *tx, collection_id, cards.len()).await?;

        let mut created = Vec::with_capacity(cards.len());
        for card in cards {
            created.push(insert_flashcard(&mut *tx, collection_id, card, now).await?);
        }
        tx.commit().await.map_err(unexpected)?;
        Ok((created, log))
    }
}

#[cfg(test)]
mod tests;
