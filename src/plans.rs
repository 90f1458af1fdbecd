// src/plans.rs

use serde::Serialize;

/// Purchasable plan definition. The catalog is fixed at compile time and
/// never re-read after a transaction has copied its price/duration.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub name: &'static str,
    /// Price in whole rupees. Razorpay wants paise, see `price_paise`.
    pub price: i64,
    /// Validity in days once payment completes.
    pub duration: i32,
    pub features: &'static [&'static str],
}

impl Plan {
    pub fn price_paise(&self) -> i64 {
        self.price * 100
    }
}

pub const CURRENCY: &str = "INR";

pub const FREE: Plan = Plan {
    name: "free",
    price: 0,
    duration: 0,
    features: &["Basic features", "Limited access"],
};

pub const BASIC: Plan = Plan {
    name: "basic",
    price: 299,
    duration: 30,
    features: &["All basic features", "Priority support", "Advanced analytics"],
};

pub const PREMIUM: Plan = Plan {
    name: "premium",
    price: 599,
    duration: 30,
    features: &[
        "All basic features",
        "24/7 support",
        "Advanced AI features",
        "Unlimited usage",
    ],
};

pub const ENTERPRISE: Plan = Plan {
    name: "enterprise",
    price: 1499,
    duration: 30,
    features: &[
        "All premium features",
        "Custom solutions",
        "Dedicated account manager",
    ],
};

/// Every plan, in display order.
pub fn all() -> &'static [Plan] {
    const ALL: [Plan; 4] = [FREE, BASIC, PREMIUM, ENTERPRISE];
    &ALL
}

/// Case-insensitive lookup by plan key.
pub fn by_key(key: &str) -> Option<&'static Plan> {
    match key.to_ascii_lowercase().as_str() {
        "free" => Some(&FREE),
        "basic" => Some(&BASIC),
        "premium" => Some(&PREMIUM),
        "enterprise" => Some(&ENTERPRISE),
        _ => None,
    }
}

/// Paid plans are the only ones an order can be created for.
pub fn purchasable(key: &str) -> Option<&'static Plan> {
    by_key(key).filter(|p| p.price > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(by_key("BASIC").map(|p| p.name), Some("basic"));
        assert_eq!(by_key("Premium").map(|p| p.price), Some(599));
    }

    #[test]
    fn unknown_key_is_none() {
        assert!(by_key("platinum").is_none());
        assert!(purchasable("platinum").is_none());
    }

    #[test]
    fn free_plan_is_not_purchasable() {
        assert!(by_key("free").is_some());
        assert!(purchasable("free").is_none());
    }

    #[test]
    fn catalog_has_one_entry_per_key() {
        let mut names: Vec<_> = all().iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn paise_conversion() {
        assert_eq!(BASIC.price_paise(), 29_900);
        assert_eq!(ENTERPRISE.price_paise(), 149_900);
    }
}
