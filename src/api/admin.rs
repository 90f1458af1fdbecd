// src/api/admin.rs

use actix_web::{delete, get, put, web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::api::auth::AuthedUser;
use crate::db;
use crate::error::ApiError;
use crate::models::Pagination;
use crate::AppState;

fn ensure_admin(user: &AuthedUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[get("/admin/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
) -> Result<HttpResponse, ApiError> {
    ensure_admin(&user)?;

    let users = db::list_users(&state.pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": users.len(),
        "users": users,
    })))
}

#[get("/admin/users/{id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    ensure_admin(&user)?;

    let found = db::get_user(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": found,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[put("/admin/users/{id}/role")]
pub async fn update_role(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    path: web::Path<i32>,
    payload: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    ensure_admin(&user)?;

    let role = payload.role.as_str();
    if role != "user" && role != "admin" {
        return Err(ApiError::Validation(
            "Invalid role. Allowed roles: user, admin".into(),
        ));
    }

    let updated = db::update_role(&state.pool, path.into_inner(), role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    log::info!("role updated userid={} role={}", updated.id, updated.role);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User role updated successfully",
        "user": updated,
    })))
}

#[delete("/admin/users/{id}")]
pub async fn delete_user(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    ensure_admin(&user)?;

    let target = path.into_inner();
    if target == user.id {
        return Err(ApiError::Validation(
            "Cannot delete your own account".into(),
        ));
    }

    if !db::delete_user(&state.pool, target).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    log::info!("user deleted userid={target} by admin={}", user.id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[get("/admin/payment/transactions")]
pub async fn list_transactions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    query: web::Query<TransactionsQuery>,
) -> Result<HttpResponse, ApiError> {
    ensure_admin(&user)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let filter = db::TransactionFilter {
        status: query.status.clone(),
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let (transactions, total) =
        db::admin_transactions(&state.pool, &filter, page, limit).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "transactions": transactions,
        "pagination": Pagination::new(page, limit, total),
    })))
}

#[get("/admin/payment/revenue-stats")]
pub async fn revenue_stats(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
) -> Result<HttpResponse, ApiError> {
    ensure_admin(&user)?;

    let stats = db::revenue_stats(&state.pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "stats": stats,
    })))
}
