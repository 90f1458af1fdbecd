// src/main.rs
use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use dotenvy::dotenv;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use diagnosia_backend::config::AppConfig;
use diagnosia_backend::{api, db, docs, AppState};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    db::seed_admin(&pool, &config.admin_email, &config.admin_password)
        .await
        .expect("Failed to seed admin account");

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState { pool, config });

    log::info!("starting server on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&state.config.frontend_url)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .route("/health", web::get().to(health))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public routes
            .service(api::auth::register)
            .service(api::auth::login)
            .service(api::payments::get_plans)
            .service(api::payments::user_subscription)
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware::new(state.clone()))
                    .service(api::auth::profile)
                    .service(api::auth::update_profile)
                    .service(api::payments::create_order)
                    .service(api::payments::verify_payment)
                    .service(api::payments::my_plan)
                    .service(api::payments::cancel_subscription)
                    .service(api::payments::transaction_history)
                    .service(api::admin::list_users)
                    .service(api::admin::get_user)
                    .service(api::admin::update_role)
                    .service(api::admin::delete_user)
                    .service(api::admin::list_transactions)
                    .service(api::admin::revenue_stats)
                    .service(api::assistant::symptom_analysis)
                    .service(api::assistant::prescription)
                    .service(api::assistant::report_analysis)
                    .service(api::assistant::diet_plan)
                    .service(api::assistant::body_scan),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
