// src/db.rs

use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::ApiError;
use crate::models::{AdminTransaction, Transaction, TransactionStatus, User};
use crate::plans::{Plan, CURRENCY};

const TX_COLUMNS: &str = "transaction_id, user_id, razorpay_order_id, razorpay_payment_id, \
     razorpay_signature, amount::text AS amount, currency, status, plan, plan_duration, \
     transaction_date, expiry_date, created_at";

fn map_transaction(r: &PgRow) -> Result<Transaction, sqlx::Error> {
    let status: String = r.get("status");
    let status = TransactionStatus::parse(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: format!("unknown transaction status: {status}").into(),
    })?;

    Ok(Transaction {
        transaction_id: r.get("transaction_id"),
        user_id: r.get("user_id"),
        razorpay_order_id: r.get("razorpay_order_id"),
        razorpay_payment_id: r.get("razorpay_payment_id"),
        razorpay_signature: r.get("razorpay_signature"),
        amount: r.get("amount"),
        currency: r.get("currency"),
        status,
        plan: r.get("plan"),
        plan_duration: r.get("plan_duration"),
        transaction_date: r.get("transaction_date"),
        expiry_date: r.get("expiry_date"),
        created_at: r.get("created_at"),
    })
}

fn map_user(r: &PgRow) -> User {
    User {
        id: r.get("userid"),
        name: r.get("name"),
        email: r.get("email"),
        phone_no: r.get("phone_no"),
        gender: r.get("gender"),
        dob: r.get("dob"),
        address: r.get("address"),
        role: r.get("role"),
        created_at: r.get("created_at"),
    }
}

/// The single transaction that currently grants an entitlement: completed and
/// expiring strictly after `today`, most recent first. Absence is a normal
/// outcome, not an error.
pub async fn find_active<'e>(
    exec: impl sqlx::Executor<'e, Database = sqlx::Postgres>,
    user_id: i32,
    today: NaiveDate,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {TX_COLUMNS} FROM transactions \
         WHERE user_id = $1 AND status = 'completed' AND expiry_date > $2 \
         ORDER BY transaction_date DESC \
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(today)
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(map_transaction).transpose()
}

/// A pending order younger than this still blocks new order creation; older
/// ones are treated as abandoned checkouts and superseded.
const PENDING_ORDER_MAX_AGE_MINUTES: i32 = 60;

/// Creates the pending transaction for a freshly opened processor order.
///
/// The check-then-insert runs under a per-user advisory lock, so two
/// near-simultaneous order requests serialize and exactly one creates a row:
/// the second sees either the winner's fresh pending order or, once verified,
/// its active subscription. Stale pending orders from abandoned checkouts are
/// cancelled here before the new one is inserted, which keeps the retry path
/// open without ever allowing two open orders at once.
pub async fn create_pending_exclusive(
    pool: &PgPool,
    user_id: i32,
    plan: &Plan,
    razorpay_order_id: &str,
    today: NaiveDate,
) -> Result<Transaction, ApiError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(i64::from(user_id))
        .execute(&mut *tx)
        .await?;

    if find_active(&mut *tx, user_id, today).await?.is_some() {
        return Err(ApiError::AlreadySubscribed);
    }

    let fresh_pending = sqlx::query(
        "SELECT 1 AS one FROM transactions \
         WHERE user_id = $1 AND status = 'pending' \
           AND created_at > CURRENT_TIMESTAMP - make_interval(mins => $2)",
    )
    .bind(user_id)
    .bind(PENDING_ORDER_MAX_AGE_MINUTES)
    .fetch_optional(&mut *tx)
    .await?;

    if fresh_pending.is_some() {
        return Err(ApiError::AlreadySubscribed);
    }

    sqlx::query(
        "UPDATE transactions SET status = 'cancelled' \
         WHERE user_id = $1 AND status = 'pending'",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query(&format!(
        "INSERT INTO transactions \
             (user_id, razorpay_order_id, amount, currency, plan, plan_duration, status) \
         VALUES ($1, $2, $3::numeric, $4, $5, $6, 'pending') \
         RETURNING {TX_COLUMNS}"
    ))
    .bind(user_id)
    .bind(razorpay_order_id)
    .bind(plan.price.to_string())
    .bind(CURRENCY)
    .bind(plan.name)
    .bind(plan.duration)
    .fetch_one(&mut *tx)
    .await?;

    let created = map_transaction(&row)?;
    tx.commit().await?;
    Ok(created)
}

/// Finalizes a verified payment: `pending → completed`, payment reference and
/// signature recorded, expiry computed from the duration copied at order time.
///
/// Replaying the same payment reference against the already-completed row
/// returns the stored result without another write; any other attempt to
/// re-finalize is an illegal transition.
pub async fn complete_payment(
    pool: &PgPool,
    razorpay_order_id: &str,
    user_id: i32,
    razorpay_payment_id: &str,
    razorpay_signature: &str,
    now: DateTime<Utc>,
) -> Result<Transaction, ApiError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!(
        "SELECT {TX_COLUMNS} FROM transactions \
         WHERE razorpay_order_id = $1 AND user_id = $2 \
         FOR UPDATE"
    ))
    .bind(razorpay_order_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let current = match row.as_ref().map(map_transaction).transpose()? {
        Some(t) => t,
        None => return Err(ApiError::NotFound("Transaction not found".into())),
    };

    match current.status {
        TransactionStatus::Pending => {}
        TransactionStatus::Completed
            if current.razorpay_payment_id.as_deref() == Some(razorpay_payment_id) =>
        {
            return Ok(current);
        }
        _ => {
            return Err(ApiError::InvalidState(
                "Transaction has already been processed".into(),
            ));
        }
    }

    let expiry_date = now.date_naive() + Duration::days(i64::from(current.plan_duration));

    let row = sqlx::query(&format!(
        "UPDATE transactions \
         SET razorpay_payment_id = $1, \
             razorpay_signature = $2, \
             status = 'completed', \
             expiry_date = $3, \
             transaction_date = $4 \
         WHERE razorpay_order_id = $5 AND status = 'pending' \
         RETURNING {TX_COLUMNS}"
    ))
    .bind(razorpay_payment_id)
    .bind(razorpay_signature)
    .bind(expiry_date)
    .bind(now)
    .bind(razorpay_order_id)
    .fetch_one(&mut *tx)
    .await?;

    let completed = map_transaction(&row)?;
    tx.commit().await?;
    Ok(completed)
}

/// Cancels the user's active subscription. Only a completed, unexpired
/// transaction can be cancelled; the status flip is the whole change.
pub async fn cancel_active(
    pool: &PgPool,
    user_id: i32,
    today: NaiveDate,
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "SELECT transaction_id FROM transactions \
         WHERE user_id = $1 AND status = 'completed' AND expiry_date > $2 \
         ORDER BY transaction_date DESC \
         LIMIT 1 \
         FOR UPDATE",
    )
    .bind(user_id)
    .bind(today)
    .fetch_optional(&mut *tx)
    .await?;

    let transaction_id: i32 = match row {
        Some(r) => r.get("transaction_id"),
        None => {
            return Err(ApiError::InvalidState(
                "No active subscription found".into(),
            ));
        }
    };

    sqlx::query("UPDATE transactions SET status = 'cancelled' WHERE transaction_id = $1")
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Full transaction history for a user, most recent first, with the total
/// count for pagination.
pub async fn history(
    pool: &PgPool,
    user_id: i32,
    page: i64,
    limit: i64,
) -> Result<(Vec<Transaction>, i64), sqlx::Error> {
    let offset = (page - 1) * limit;

    let rows = sqlx::query(&format!(
        "SELECT {TX_COLUMNS} FROM transactions \
         WHERE user_id = $1 \
         ORDER BY created_at DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(map_transaction)
        .collect::<Result<Vec<_>, _>>()?;

    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?
        .get("count");

    Ok((items, total))
}

/// Recent completed transactions, shown alongside the current plan.
pub async fn completed_history(
    pool: &PgPool,
    user_id: i32,
    limit: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {TX_COLUMNS} FROM transactions \
         WHERE user_id = $1 AND status = 'completed' \
         ORDER BY transaction_date DESC \
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_transaction).collect()
}

#[derive(Debug, Default)]
pub struct TransactionFilter {
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Admin listing: every transaction joined with its owner, filterable by
/// status and creation-date window.
pub async fn admin_transactions(
    pool: &PgPool,
    filter: &TransactionFilter,
    page: i64,
    limit: i64,
) -> Result<(Vec<AdminTransaction>, i64), sqlx::Error> {
    let offset = (page - 1) * limit;

    const CONDITIONS: &str = "($1::text IS NULL OR t.status = $1) \
         AND ($2::date IS NULL OR t.created_at::date >= $2) \
         AND ($3::date IS NULL OR t.created_at::date <= $3)";

    let rows = sqlx::query(&format!(
        "SELECT t.transaction_id, t.user_id, t.razorpay_order_id, t.razorpay_payment_id, \
                t.razorpay_signature, t.amount::text AS amount, t.currency, t.status, t.plan, \
                t.plan_duration, t.transaction_date, t.expiry_date, t.created_at, \
                u.name AS user_name, u.email \
         FROM transactions t \
         JOIN users u ON t.user_id = u.userid \
         WHERE {CONDITIONS} \
         ORDER BY t.created_at DESC \
         LIMIT $4 OFFSET $5"
    ))
    .bind(&filter.status)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(|r| {
            Ok(AdminTransaction {
                transaction: map_transaction(r)?,
                user_name: r.get("user_name"),
                email: r.get("email"),
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let total: i64 = sqlx::query(&format!(
        "SELECT COUNT(*) AS count \
         FROM transactions t \
         JOIN users u ON t.user_id = u.userid \
         WHERE {CONDITIONS}"
    ))
    .bind(&filter.status)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .fetch_one(pool)
    .await?
    .get("count");

    Ok((items, total))
}

/// Revenue aggregates for the admin dashboard: daily (30d), monthly (12m),
/// per-plan and today's totals, completed transactions only.
pub async fn revenue_stats(pool: &PgPool) -> Result<serde_json::Value, sqlx::Error> {
    let daily = sqlx::query(
        "SELECT transaction_date::date AS date, \
                COUNT(*) AS transactions, \
                SUM(amount)::text AS revenue \
         FROM transactions \
         WHERE status = 'completed' \
           AND transaction_date >= CURRENT_DATE - INTERVAL '30 days' \
         GROUP BY transaction_date::date \
         ORDER BY date",
    )
    .fetch_all(pool)
    .await?;

    let monthly = sqlx::query(
        "SELECT EXTRACT(YEAR FROM transaction_date)::int AS year, \
                EXTRACT(MONTH FROM transaction_date)::int AS month, \
                COUNT(*) AS transactions, \
                SUM(amount)::text AS revenue \
         FROM transactions \
         WHERE status = 'completed' \
           AND transaction_date >= CURRENT_DATE - INTERVAL '12 months' \
         GROUP BY year, month \
         ORDER BY year, month",
    )
    .fetch_all(pool)
    .await?;

    let per_plan = sqlx::query(
        "SELECT plan, COUNT(*) AS transactions, SUM(amount)::text AS revenue \
         FROM transactions \
         WHERE status = 'completed' \
         GROUP BY plan \
         ORDER BY SUM(amount) DESC",
    )
    .fetch_all(pool)
    .await?;

    let today = sqlx::query(
        "SELECT COUNT(*) AS today_transactions, SUM(amount)::text AS today_revenue \
         FROM transactions \
         WHERE status = 'completed' AND transaction_date::date = CURRENT_DATE",
    )
    .fetch_one(pool)
    .await?;

    let daily: Vec<serde_json::Value> = daily
        .iter()
        .map(|r| {
            serde_json::json!({
                "date": r.get::<NaiveDate, _>("date"),
                "transactions": r.get::<i64, _>("transactions"),
                "revenue": r.get::<Option<String>, _>("revenue"),
            })
        })
        .collect();

    let monthly: Vec<serde_json::Value> = monthly
        .iter()
        .map(|r| {
            serde_json::json!({
                "year": r.get::<i32, _>("year"),
                "month": r.get::<i32, _>("month"),
                "transactions": r.get::<i64, _>("transactions"),
                "revenue": r.get::<Option<String>, _>("revenue"),
            })
        })
        .collect();

    let per_plan: Vec<serde_json::Value> = per_plan
        .iter()
        .map(|r| {
            serde_json::json!({
                "plan": r.get::<String, _>("plan"),
                "transactions": r.get::<i64, _>("transactions"),
                "revenue": r.get::<Option<String>, _>("revenue"),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "daily_revenue": daily,
        "monthly_revenue": monthly,
        "plan_revenue": per_plan,
        "today": {
            "today_transactions": today.get::<i64, _>("today_transactions"),
            "today_revenue": today.get::<Option<String>, _>("today_revenue"),
        },
    }))
}

const USER_COLUMNS: &str =
    "userid, name, email, phone_no, gender, dob, address, role, created_at";

pub async fn get_user(pool: &PgPool, user_id: i32) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE userid = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_user))
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(map_user).collect())
}

pub async fn user_exists(
    pool: &PgPool,
    email: &str,
    phone_no: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS one FROM users WHERE email = $1 OR phone_no = $2")
        .bind(email)
        .bind(phone_no)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone_no: &'a str,
    pub password_hash: &'a str,
    pub gender: Option<&'a str>,
    pub dob: Option<NaiveDate>,
    pub address: Option<&'a str>,
}

pub async fn insert_user(pool: &PgPool, user: &NewUser<'_>) -> Result<User, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO users (name, email, phone_no, password, gender, dob, address) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user.name)
    .bind(user.email)
    .bind(user.phone_no)
    .bind(user.password_hash)
    .bind(user.gender)
    .bind(user.dob)
    .bind(user.address)
    .fetch_one(pool)
    .await?;

    Ok(map_user(&row))
}

pub async fn credentials_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(User, String)>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS}, password FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(|r| (map_user(r), r.get("password"))))
}

pub async fn phone_taken_by_other(
    pool: &PgPool,
    phone_no: &str,
    user_id: i32,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS one FROM users WHERE phone_no = $1 AND userid != $2")
        .bind(phone_no)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub phone_no: Option<&'a str>,
    pub gender: Option<&'a str>,
    pub dob: Option<NaiveDate>,
    pub address: Option<&'a str>,
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: i32,
    update: &ProfileUpdate<'_>,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "UPDATE users \
         SET name = COALESCE($1, name), \
             phone_no = COALESCE($2, phone_no), \
             gender = COALESCE($3, gender), \
             dob = COALESCE($4, dob), \
             address = COALESCE($5, address), \
             updated_at = CURRENT_TIMESTAMP \
         WHERE userid = $6 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(update.name)
    .bind(update.phone_no)
    .bind(update.gender)
    .bind(update.dob)
    .bind(update.address)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_user))
}

pub async fn update_role(
    pool: &PgPool,
    user_id: i32,
    role: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "UPDATE users SET role = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE userid = $2 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(role)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_user))
}

pub async fn delete_user(pool: &PgPool, user_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE userid = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Ensures the configured admin account exists, creating it on first start.
pub async fn seed_admin(pool: &PgPool, email: &str, password: &str) -> Result<(), ApiError> {
    let existing = sqlx::query("SELECT 1 AS one FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let password_hash = hash(password, DEFAULT_COST)?;

    sqlx::query(
        "INSERT INTO users (name, email, phone_no, password, role) \
         VALUES ('Admin', $1, '0000000000', $2, 'admin')",
    )
    .bind(email)
    .bind(password_hash)
    .execute(pool)
    .await?;

    log::info!("admin account seeded email={email}");
    Ok(())
}
