//! services/api/src/web/subscriptions.rs
//!
//! Plan endpoints over `SubscriptionMachine`. The machine keeps `user.plan`
//! and the period ledger consistent; the checks on `plan` and `months` happen here.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use flashcards_core::domain::{Plan, SubscriptionPeriod};
use flashcards_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::middleware::AuthenticatedUser;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct CurrentPlanResponse {
    pub plan: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpgradeRequest {
    /// `pro`; `admin` is rejected.
    pub plan: String,
    /// Calendar months, at least 1.
    pub months: i64,
    /// Reference of the payment that paid for the period.
    pub payment_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub plan: String,
    pub payment_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub months: i64,
}

#[derive(Serialize, ToSchema)]
pub struct PeriodResponse {
    pub id: Uuid,
    pub plan: String,
    pub external_ref: String,
    /// `pending`, `active` or `canceled`.
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionPeriod> for PeriodResponse {
    fn from(p: SubscriptionPeriod) -> Self {
        Self {
            id: p.id,
            plan: p.plan.as_str().to_string(),
            external_ref: p.external_ref,
            status: p.status.as_str().to_string(),
            start_date: p.start_date,
            end_date: p.end_date,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// The user's plan after a transition, with the period that caused it.
#[derive(Serialize, ToSchema)]
pub struct PlanChangeResponse {
    pub plan: String,
    pub period: PeriodResponse,
}

/// Self-service purchases only reach `pro`; `admin` is granted out of band.
fn paid_plan(raw: &str) -> Result<Plan, PortError> {
    match raw.parse::<Plan>()? {
        Plan::Pro => Ok(Plan::Pro),
        Plan::Free => Err(PortError::InvalidInput(
            "cancel the subscription to return to the free plan".to_string(),
        )),
        Plan::Admin => Err(PortError::InvalidInput(
            "the admin plan cannot be purchased".to_string(),
        )),
    }
}

fn month_count(months: i64) -> Result<u32, PortError> {
    u32::try_from(months)
        .ok()
        .filter(|m| *m >= 1)
        .ok_or_else(|| PortError::InvalidInput("months must be a positive integer".to_string()))
}

fn required_ref(payment_id: &str) -> Result<&str, PortError> {
    let trimmed = payment_id.trim();
    if trimmed.is_empty() {
        return Err(PortError::InvalidInput("payment_id is required".to_string()));
    }
    Ok(trimmed)
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/subscriptions/current",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's plan", body = CurrentPlanResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn current(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<CurrentPlanResponse>, ApiError> {
    let plan = state.subscriptions.current_plan(caller.user_id).await?;
    Ok(Json(CurrentPlanResponse {
        plan: plan.as_str().to_string(),
    }))
}

/// Opens an active period now. Any active period is canceled in the same transaction.
#[utoipa::path(
    post,
    path = "/subscriptions/upgrade",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    request_body = UpgradeRequest,
    responses(
        (status = 201, description = "Subscription active", body = PlanChangeResponse),
        (status = 400, description = "Unknown plan, free plan or bad months", body = ErrorBody)
    )
)]
pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<UpgradeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlanChangeResponse>), ApiError> {
    let Json(req) = payload?;
    let plan = paid_plan(&req.plan)?;
    let months = month_count(req.months)?;
    let external_ref = required_ref(&req.payment_id)?;

    let upgrade = state
        .subscriptions
        .upgrade(caller.user_id, plan, months, external_ref)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PlanChangeResponse {
            plan: upgrade.user.plan.as_str().to_string(),
            period: upgrade.period.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/subscriptions/cancel",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription canceled, plan is free again", body = PlanChangeResponse),
        (status = 404, description = "No active subscription", body = ErrorBody)
    )
)]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<PlanChangeResponse>, ApiError> {
    let cancellation = state.subscriptions.cancel(caller.user_id).await?;
    Ok(Json(PlanChangeResponse {
        plan: cancellation.user.plan.as_str().to_string(),
        period: cancellation.period.into(),
    }))
}

/// Every period of the caller, newest first.
#[utoipa::path(
    get,
    path = "/subscriptions/history",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription periods", body = [PeriodResponse])
    )
)]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<PeriodResponse>>, ApiError> {
    let periods = state.subscriptions.history(caller.user_id).await?;
    Ok(Json(periods.into_iter().map(Into::into).collect()))
}

/// Records a pending period that a later confirmation activates.
#[utoipa::path(
    post,
    path = "/subscriptions/checkout",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Pending period recorded", body = PeriodResponse),
        (status = 400, description = "Unknown or free plan", body = ErrorBody)
    )
)]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PeriodResponse>), ApiError> {
    let Json(req) = payload?;
    let plan = paid_plan(&req.plan)?;
    let external_ref = required_ref(&req.payment_id)?;
    let period = state
        .subscriptions
        .request_upgrade(caller.user_id, plan, external_ref)
        .await?;
    Ok((StatusCode::CREATED, Json(period.into())))
}

#[utoipa::path(
    post,
    path = "/subscriptions/{period_id}/confirm",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    params(("period_id" = Uuid, Path, description = "Pending period id")),
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Pending period activated", body = PlanChangeResponse),
        (status = 400, description = "Bad months", body = ErrorBody),
        (status = 404, description = "No such pending period for the caller", body = ErrorBody)
    )
)]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(period_id): Path<Uuid>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<PlanChangeResponse>, ApiError> {
    let Json(req) = payload?;
    let months = month_count(req.months)?;
    let upgrade = state
        .subscriptions
        .confirm_upgrade(caller.user_id, period_id, months)
        .await?;
    Ok(Json(PlanChangeResponse {
        plan: upgrade.user.plan.as_str().to_string(),
        period: upgrade.period.into(),
    }))
}
