// src/entitlement.rs

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db;
use crate::models::Transaction;
use crate::plans;

/// Read-only projection of a user's current entitlement, merging catalog
/// metadata with the live transaction fields. Safe to compute as often as
/// needed; never writes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntitlementView {
    pub plan: String,
    pub is_active: bool,
    pub expiry_date: Option<NaiveDate>,
    pub days_remaining: i64,
    pub price: i64,
    pub duration: i32,
    pub features: Vec<String>,
}

impl EntitlementView {
    pub fn free() -> Self {
        let free = &plans::FREE;
        Self {
            plan: free.name.to_string(),
            is_active: false,
            expiry_date: None,
            days_remaining: 0,
            price: free.price,
            duration: free.duration,
            features: free.features.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Projects an active transaction (or its absence) onto the entitlement view
/// for a given day. `today` is the caller's clock normalized to a calendar
/// date, so a plan expiring tomorrow counts a full remaining day.
pub fn project(active: Option<&Transaction>, today: NaiveDate) -> EntitlementView {
    let Some(tx) = active else {
        return EntitlementView::free();
    };
    let Some(expiry) = tx.expiry_date else {
        return EntitlementView::free();
    };

    let days_remaining = (expiry - today).num_days().max(0);
    if days_remaining == 0 {
        return EntitlementView::free();
    }

    // Catalog metadata for display; price/duration the user actually paid for
    // come from the transaction itself.
    let features = plans::by_key(&tx.plan)
        .map(|p| p.features.iter().map(|f| f.to_string()).collect())
        .unwrap_or_default();
    let price = plans::by_key(&tx.plan).map(|p| p.price).unwrap_or(0);

    EntitlementView {
        plan: tx.plan.clone(),
        is_active: true,
        expiry_date: Some(expiry),
        days_remaining,
        price,
        duration: tx.plan_duration,
        features,
    }
}

/// Resolves the live entitlement for a user as of `today`.
pub async fn resolve(
    pool: &PgPool,
    user_id: i32,
    today: NaiveDate,
) -> Result<EntitlementView, sqlx::Error> {
    let active = db::find_active(pool, user_id, today).await?;
    Ok(project(active.as_ref(), today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionStatus;
    use chrono::NaiveDate;

    fn completed_tx(plan: &str, duration: i32, expiry: NaiveDate) -> Transaction {
        Transaction {
            transaction_id: 1,
            user_id: 7,
            razorpay_order_id: "order_test".into(),
            razorpay_payment_id: Some("pay_test".into()),
            razorpay_signature: Some("sig".into()),
            amount: "299.00".into(),
            currency: "INR".into(),
            status: TransactionStatus::Completed,
            plan: plan.into(),
            plan_duration: duration,
            transaction_date: None,
            expiry_date: Some(expiry),
            created_at: None,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn no_active_transaction_means_free() {
        let view = project(None, d(2024, 1, 15));
        assert_eq!(view.plan, "free");
        assert!(!view.is_active);
        assert_eq!(view.expiry_date, None);
        assert_eq!(view.days_remaining, 0);
    }

    #[test]
    fn mid_term_subscription_is_active() {
        // basic bought 2024-01-01, 30 days: expires 2024-01-31
        let tx = completed_tx("basic", 30, d(2024, 1, 31));
        let view = project(Some(&tx), d(2024, 1, 15));

        assert!(view.is_active);
        assert_eq!(view.plan, "basic");
        assert_eq!(view.days_remaining, 16);
        assert_eq!(view.price, 299);
        assert!(!view.features.is_empty());
    }

    #[test]
    fn expiry_day_itself_is_not_active() {
        let tx = completed_tx("basic", 30, d(2024, 1, 31));
        let view = project(Some(&tx), d(2024, 1, 31));

        assert!(!view.is_active);
        assert_eq!(view.plan, "free");
        assert_eq!(view.days_remaining, 0);
    }

    #[test]
    fn day_before_expiry_counts_one_remaining_day() {
        let tx = completed_tx("premium", 30, d(2024, 1, 31));
        let view = project(Some(&tx), d(2024, 1, 30));

        assert!(view.is_active);
        assert_eq!(view.days_remaining, 1);
    }

    #[test]
    fn past_expiry_falls_back_to_free() {
        let tx = completed_tx("basic", 30, d(2024, 1, 31));
        let view = project(Some(&tx), d(2024, 2, 1));

        assert!(!view.is_active);
        assert_eq!(view.plan, "free");
    }

    #[test]
    fn projection_is_pure() {
        let tx = completed_tx("basic", 30, d(2024, 1, 31));
        let a = project(Some(&tx), d(2024, 1, 15));
        let b = project(Some(&tx), d(2024, 1, 15));

        assert_eq!(a.plan, b.plan);
        assert_eq!(a.days_remaining, b.days_remaining);
        assert_eq!(a.is_active, b.is_active);
    }

    #[test]
    fn unknown_plan_key_still_projects_live_fields() {
        // a plan later removed from the catalog keeps granting until expiry
        let tx = completed_tx("legacy", 90, d(2024, 4, 1));
        let view = project(Some(&tx), d(2024, 3, 1));

        assert!(view.is_active);
        assert_eq!(view.plan, "legacy");
        assert_eq!(view.duration, 90);
        assert!(view.features.is_empty());
    }
}
