//! crates/flashcards_core/src/subscription.rs
//!
//! The subscription state machine. It keeps `user.plan` and the period ledger in
//! step: every transition is a single atomic port call, so no caller can observe
//! a period without the matching plan or the other way round.
//!
//! ```text
//!   Free ──upgrade──────────────────────────▶ Active(plan, end)
//!     │                                         │   ▲
//!     └─request_upgrade─▶ PendingUpgrade ─confirm┘   │ upgrade (replaces period)
//!                                               │
//!   Free ◀── (next upgrade starts over) ── Canceled ◀─cancel
//! ```

use chrono::{DateTime, Months, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{PeriodStatus, PeriodWindow, Plan, SubscriptionPeriod, User};
use crate::ports::{DatabaseService, PortError, PortResult};

/// Where a user currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionState {
    Free,
    PendingUpgrade { plan: Plan, period_id: Uuid },
    Active { plan: Plan, period_end: Option<DateTime<Utc>> },
    Canceled { canceled_at: DateTime<Utc> },
}

/// Result of a successful upgrade or confirmation.
#[derive(Debug, Clone)]
pub struct Upgrade {
    pub period: SubscriptionPeriod,
    pub user: User,
}

/// Result of a successful cancellation.
#[derive(Debug, Clone)]
pub struct Cancellation {
    pub period: SubscriptionPeriod,
    pub user: User,
}

/// Adds calendar months, clamping the day to the end of the target month
/// (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(start: DateTime<Utc>, months: u32) -> PortResult<DateTime<Utc>> {
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| PortError::InvalidInput(format!("{} months is out of range", months)))
}

#[derive(Clone)]
pub struct SubscriptionMachine {
    db: Arc<dyn DatabaseService>,
}

impl SubscriptionMachine {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn current_plan(&self, user_id: Uuid) -> PortResult<Plan> {
        Ok(self.db.get_user(user_id).await?.plan)
    }

    /// Opens an active period of `months` calendar months starting now and moves
    /// the user onto `plan`. Any previously active period is canceled first.
    pub async fn upgrade(
        &self,
        user_id: Uuid,
        plan: Plan,
        months: u32,
        external_ref: &str,
    ) -> PortResult<Upgrade> {
        let start_date = Utc::now();
        let end_date = add_months(start_date, months)?;
        let window = PeriodWindow {
            plan,
            external_ref: external_ref.to_string(),
            start_date,
            end_date,
        };
        let (period, user) = self.db.activate_subscription(user_id, &window).await?;
        info!(%user_id, plan = %plan, %end_date, "subscription activated");
        Ok(Upgrade { period, user })
    }

    /// Records an upgrade that still waits for payment confirmation.
    pub async fn request_upgrade(
        &self,
        user_id: Uuid,
        plan: Plan,
        external_ref: &str,
    ) -> PortResult<SubscriptionPeriod> {
        // Surfaces NotFound for unknown users before writing anything.
        self.db.get_user(user_id).await?;
        let period = self
            .db
            .create_pending_period(user_id, plan, external_ref)
            .await?;
        info!(%user_id, period_id = %period.id, plan = %plan, "upgrade pending");
        Ok(period)
    }

    /// Activates a pending period for `months` calendar months from now.
    pub async fn confirm_upgrade(
        &self,
        user_id: Uuid,
        period_id: Uuid,
        months: u32,
    ) -> PortResult<Upgrade> {
        let start_date = Utc::now();
        let end_date = add_months(start_date, months)?;
        let (period, user) = self
            .db
            .activate_pending_period(user_id, period_id, start_date, end_date)
            .await?;
        info!(%user_id, %period_id, plan = %period.plan, "pending upgrade confirmed");
        Ok(Upgrade { period, user })
    }

    /// Cancels the active period with the latest end date and drops the user to free.
    pub async fn cancel(&self, user_id: Uuid) -> PortResult<Cancellation> {
        let (period, user) = self.db.cancel_active_subscription(user_id).await?;
        info!(%user_id, period_id = %period.id, "subscription canceled");
        Ok(Cancellation { period, user })
    }

    /// All periods of the user, newest-created first.
    pub async fn history(&self, user_id: Uuid) -> PortResult<Vec<SubscriptionPeriod>> {
        self.db.list_periods(user_id).await
    }

    pub async fn state(&self, user_id: Uuid) -> PortResult<SubscriptionState> {
        let user = self.db.get_user(user_id).await?;
        let periods = self.db.list_periods(user_id).await?;
        Ok(derive_state(&user, &periods))
    }
}

/// `periods` must be ordered newest-created first.
fn derive_state(user: &User, periods: &[SubscriptionPeriod]) -> SubscriptionState {
    let active = periods
        .iter()
        .filter(|p| p.status == PeriodStatus::Active)
        .max_by_key(|p| p.end_date);
    if let Some(period) = active {
        return SubscriptionState::Active {
            plan: user.plan,
            period_end: period.end_date,
        };
    }
    match periods.first() {
        Some(p) if p.status == PeriodStatus::Pending => SubscriptionState::PendingUpgrade {
            plan: p.plan,
            period_id: p.id,
        },
        Some(p) if p.status == PeriodStatus::Canceled => SubscriptionState::Canceled {
            canceled_at: p.updated_at,
        },
        _ => SubscriptionState::Free,
    }
}
