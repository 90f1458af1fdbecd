use sqlx::PgPool;
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

use diagnosia_backend::config::AppConfig;
use diagnosia_backend::AppState;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_RAZORPAY_SECRET: &str = "test_key_secret";

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the test database and runs migrations. Returns `None` when
/// `TEST_DATABASE_URL` is not set, so the suite degrades to a skip instead of
/// failing on machines without Postgres.
pub async fn maybe_init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let Ok(test_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping database-backed test");
        return None;
    };
    let (admin_url, db_name) =
        split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url)
        .await
        .expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    sqlx::query(&create_sql)
        .execute(&admin_pool)
        .await
        .expect("create test db");

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url)
        .await
        .expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");

    Some(TestDb {
        pool,
        _guard: guard,
    })
}

pub fn build_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        config: AppConfig {
            database_url: String::new(),
            bind_addr: ("127.0.0.1".to_string(), 0),
            frontend_url: "http://localhost:3000".to_string(),
            jwt_secret: TEST_JWT_SECRET.to_string(),
            razorpay_key_id: "rzp_test_key".to_string(),
            razorpay_key_secret: TEST_RAZORPAY_SECRET.to_string(),
            ai_gateway_url: "http://localhost:9".to_string(),
            ai_gateway_key: "test-ai-key".to_string(),
            ai_model: "test-model".to_string(),
            admin_email: "admin@test.local".to_string(),
            admin_password: "admin123".to_string(),
        },
    }
}
