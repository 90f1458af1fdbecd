// src/api/payments.rs

use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::auth::AuthedUser;
use crate::api::razorpay;
use crate::db;
use crate::entitlement;
use crate::error::ApiError;
use crate::models::Pagination;
use crate::plans;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub plan: String,
}

/// Opens a processor order for the selected plan and records the pending
/// transaction. Refused while the user already holds an active subscription.
#[utoipa::path(
    post,
    path = "/api/payment/create-order",
    tag = "payment",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created"),
        (status = 400, description = "Invalid plan or already subscribed"),
        (status = 500, description = "Payment provider error")
    )
)]
#[post("/payment/create-order")]
pub async fn create_order(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.plan.trim().is_empty() {
        return Err(ApiError::Validation("Plan is required".into()));
    }

    let plan = plans::purchasable(&payload.plan).ok_or(ApiError::InvalidPlan)?;
    let today = Utc::now().date_naive();

    // Fast-fail before touching the processor; the authoritative check runs
    // again under the per-user lock in create_pending_exclusive.
    if db::find_active(&state.pool, user.id, today).await?.is_some() {
        return Err(ApiError::AlreadySubscribed);
    }

    let order = razorpay::create_order(
        &state.config.razorpay_key_id,
        &state.config.razorpay_key_secret,
        razorpay::CreateOrderRequest {
            amount: plan.price_paise(),
            currency: plans::CURRENCY.to_string(),
            receipt: format!("receipt_{}", Utc::now().timestamp_millis()),
            notes: json!({
                "userId": user.id.to_string(),
                "plan": plan.name,
                "duration": plan.duration,
            }),
        },
    )
    .await?;

    db::create_pending_exclusive(&state.pool, user.id, plan, &order.id, today).await?;

    log::info!(
        "order created user_id={} plan={} order_id={}",
        user.id,
        plan.name,
        order.id
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "order": {
            "id": order.id,
            "amount": order.amount,
            "currency": order.currency,
            "key_id": state.config.razorpay_key_id,
        },
        "plan": plan,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Authenticates the checkout callback and finalizes the transaction:
/// signature check first (no state change on mismatch), then
/// `pending → completed` with the expiry computed from the recorded duration.
#[utoipa::path(
    post,
    path = "/api/payment/verify",
    tag = "payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified"),
        (status = 400, description = "Invalid signature or state"),
        (status = 404, description = "Transaction not found")
    )
)]
#[post("/payment/verify")]
pub async fn verify_payment(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    if !razorpay::verify_signature(
        &state.config.razorpay_key_secret,
        &payload.razorpay_order_id,
        &payload.razorpay_payment_id,
        &payload.razorpay_signature,
    ) {
        log::warn!(
            "payment signature mismatch user_id={} order_id={}",
            user.id,
            payload.razorpay_order_id
        );
        return Err(ApiError::InvalidSignature);
    }

    let completed = db::complete_payment(
        &state.pool,
        &payload.razorpay_order_id,
        user.id,
        &payload.razorpay_payment_id,
        &payload.razorpay_signature,
        Utc::now(),
    )
    .await?;

    log::info!(
        "payment verified user_id={} order_id={} plan={}",
        user.id,
        payload.razorpay_order_id,
        completed.plan
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Payment verified successfully",
        "transaction": {
            "plan": completed.plan,
            "expiry_date": completed.expiry_date,
            "amount": completed.amount,
        },
    })))
}

/// The user's current plan plus their recent completed transactions.
#[get("/payment/my-plan")]
pub async fn my_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
) -> Result<HttpResponse, ApiError> {
    let today = Utc::now().date_naive();
    let view = entitlement::resolve(&state.pool, user.id, today).await?;
    let transactions = db::completed_history(&state.pool, user.id, 10).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "plan": {
            "name": view.plan,
            "expiry_date": view.expiry_date,
            "is_active": view.is_active,
            "days_remaining": view.days_remaining,
            "features": view.features,
        },
        "transactions": transactions,
    })))
}

/// Public lookup: does this user hold an active subscription right now.
#[get("/api/payment/user/{user_id}")]
pub async fn user_subscription(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let today = Utc::now().date_naive();

    let active = db::find_active(&state.pool, user_id, today).await?;

    match active {
        Some(tx) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "has_active_subscription": true,
            "subscription": {
                "plan": tx.plan,
                "expiry_date": tx.expiry_date,
            },
        }))),
        None => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "has_active_subscription": false,
        }))),
    }
}

/// Cancels the active subscription; the transaction keeps its payment fields
/// and only flips status.
#[post("/payment/cancel")]
pub async fn cancel_subscription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
) -> Result<HttpResponse, ApiError> {
    let today = Utc::now().date_naive();
    db::cancel_active(&state.pool, user.id, today).await?;

    log::info!("subscription cancelled user_id={}", user.id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Subscription cancelled successfully",
    })))
}

/// The static plan catalog.
#[utoipa::path(
    get,
    path = "/api/payment/plans",
    tag = "payment",
    responses((status = 200, description = "Available plans"))
)]
#[get("/api/payment/plans")]
pub async fn get_plans() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "plans": plans::all(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[get("/payment/transactions")]
pub async fn transaction_history(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let (transactions, total) = db::history(&state.pool, user.id, page, limit).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "transactions": transactions,
        "pagination": Pagination::new(page, limit, total),
    })))
}
