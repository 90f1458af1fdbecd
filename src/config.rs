// src/config.rs

use std::env;

/// Process configuration, read once at startup and carried in `AppState`.
/// Nothing below this layer touches the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: (String, u16),
    pub frontend_url: String,

    pub jwt_secret: String,

    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,

    pub ai_gateway_url: String,
    pub ai_gateway_key: String,
    pub ai_model: String,

    pub admin_email: String,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url = require("DATABASE_URL")?;
        let jwt_secret = require("JWT_SECRET")?;
        let razorpay_key_id = require("RAZORPAY_KEY_ID")?;
        let razorpay_key_secret = require("RAZORPAY_KEY_SECRET")?;
        let ai_gateway_url = env::var("AI_GATEWAY_URL")
            .unwrap_or_else(|_| "https://ai.gateway.lovable.dev".to_string());
        let ai_gateway_key = require("AI_GATEWAY_KEY")?;
        let ai_model = env::var("AI_MODEL").unwrap_or_else(|_| "google/gemini-2.5-flash".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| "PORT must be a valid port number".to_string())?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let admin_email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@gmail.com".to_string());
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        Ok(Self {
            database_url,
            bind_addr: (host, port),
            frontend_url,
            jwt_secret,
            razorpay_key_id,
            razorpay_key_secret,
            ai_gateway_url,
            ai_gateway_key,
            ai_model,
            admin_email,
            admin_password,
        })
    }
}

fn require(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{key} must be set"))
}
