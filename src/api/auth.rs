// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{get, post, put, web, Error, HttpMessage, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, NaiveDate, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::task::{Context, Poll};
use utoipa::ToSchema;

use crate::db;
use crate::error::ApiError;
use crate::AppState;

const TOKEN_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Authenticated identity, placed into request extensions by the middleware
/// and read by handlers through `web::ReqData<AuthedUser>`.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: i32,
    pub email: String,
    pub role: String,
}

impl AuthedUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub fn generate_token(
    secret: &str,
    user_id: i32,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + Duration::hours(TOKEN_VALIDITY_HOURS)).timestamp() as usize;

    let claims = Claims {
        user_id,
        email: email.to_string(),
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone_no: String,
    pub password: String,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }
    if !req.email.contains('@') || !req.email.contains('.') {
        return Err(ApiError::Validation("Please enter a valid email".into()));
    }
    if req.phone_no.trim().is_empty() {
        return Err(ApiError::Validation("Phone number is required".into()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Invalid input or duplicate email/phone")
    )
)]
#[post("/api/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    validate_registration(&payload)?;

    if db::user_exists(&state.pool, &payload.email, &payload.phone_no).await? {
        return Err(ApiError::Validation(
            "User already exists with this email or phone number".into(),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)?;

    let user = db::insert_user(
        &state.pool,
        &db::NewUser {
            name: payload.name.trim(),
            email: &payload.email,
            phone_no: &payload.phone_no,
            password_hash: &password_hash,
            gender: payload.gender.as_deref(),
            dob: payload.dob,
            address: payload.address.as_deref(),
        },
    )
    .await?;

    let token = generate_token(&state.config.jwt_secret, user.id, &user.email, &user.role)
        .map_err(|e| ApiError::Internal(format!("jwt encode error: {e}")))?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully",
        "user": user,
        "token": token,
    })))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/api/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let Some((user, password_hash)) =
        db::credentials_by_email(&state.pool, &payload.email).await?
    else {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    };

    if !verify(&payload.password, &password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let token = generate_token(&state.config.jwt_secret, user.id, &user.email, &user.role)
        .map_err(|e| ApiError::Internal(format!("jwt encode error: {e}")))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "user": user,
        "token": token,
    })))
}

#[get("/auth/profile")]
pub async fn profile(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
) -> Result<HttpResponse, ApiError> {
    let found = db::get_user(&state.pool, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": found,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone_no: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
}

#[put("/auth/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    if let Some(phone) = payload.phone_no.as_deref() {
        if db::phone_taken_by_other(&state.pool, phone, user.id).await? {
            return Err(ApiError::Validation(
                "Phone number already in use by another user".into(),
            ));
        }
    }

    let updated = db::update_profile(
        &state.pool,
        user.id,
        &db::ProfileUpdate {
            name: payload.name.as_deref(),
            phone_no: payload.phone_no.as_deref(),
            gender: payload.gender.as_deref(),
            dob: payload.dob,
            address: payload.address.as_deref(),
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": updated,
    })))
}

/// Middleware that:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the token against the configured secret
/// - places an `AuthedUser` into `req.extensions_mut()`
pub struct JwtMiddleware {
    state: web::Data<AppState>,
}

impl JwtMiddleware {
    pub fn new(state: web::Data<AppState>) -> Self {
        Self { state }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner {
            service,
            state: self.state.clone(),
        }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
    state: web::Data<AppState>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        let Some(token) = auth_header.strip_prefix("Bearer ") else {
            return Box::pin(async move {
                Err(actix_web::error::ErrorUnauthorized(
                    "Missing or invalid Authorization header",
                ))
            });
        };

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(token_data) => {
                let claims = token_data.claims;
                req.extensions_mut().insert(AuthedUser {
                    id: claims.user_id,
                    email: claims.email,
                    role: claims.role,
                });
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(_) => Box::pin(async move {
                Err(actix_web::error::ErrorUnauthorized("Invalid token"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_claims() {
        let secret = "test-secret";
        let token = generate_token(secret, 42, "a@b.com", "user").unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.user_id, 42);
        assert_eq!(data.claims.email, "a@b.com");
        assert_eq!(data.claims.role, "user");
    }

    #[test]
    fn token_rejects_the_wrong_secret() {
        let token = generate_token("secret-a", 1, "a@b.com", "user").unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret-b"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn registration_validation_catches_bad_input() {
        let good = RegisterRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone_no: "9999999999".into(),
            password: "hunter22".into(),
            gender: None,
            dob: None,
            address: None,
        };
        assert!(validate_registration(&good).is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".into(),
            ..good
        };
        assert!(validate_registration(&bad_email).is_err());

        let short_password = RegisterRequest {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone_no: "9999999999".into(),
            password: "abc".into(),
            gender: None,
            dob: None,
            address: None,
        };
        assert!(validate_registration(&short_password).is_err());
    }
}
