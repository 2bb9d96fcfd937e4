//! Static plan catalog.
//!
//! Each [`Plan`] maps to exactly one [`Entitlement`]. The table is built at
//! compile time and never mutated.

use serde::Serialize;

use super::plan::Plan;

/// `-1` in a limit field means unlimited.
pub const UNLIMITED: i64 = -1;

/// Limits and capability level attached to a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    pub id: Plan,
    pub name: &'static str,
    pub price_monthly: f64,
    pub price_yearly: f64,
    pub features: &'static [&'static str],
    pub code_completions_limit: i64, // per day
    pub code_generation_limit: i64,  // per day
    pub project_understanding_level: u8,
}

static NONE: Entitlement = Entitlement {
    id: Plan::None,
    name: "No Plan",
    price_monthly: 0.0,
    price_yearly: 0.0,
    features: &[],
    code_completions_limit: 0,
    code_generation_limit: 0,
    project_understanding_level: 0,
};

static BASIC: Entitlement = Entitlement {
    id: Plan::Basic,
    name: "Basic Plan",
    price_monthly: 9.99,
    price_yearly: 99.99,
    features: &[
        "AI Code Autocompletion (Standard)",
        "Code Generation from Natural Language (Limited)",
        "Contextual Awareness",
        "Documentation Suggestions",
    ],
    code_completions_limit: 1000,
    code_generation_limit: 50,
    project_understanding_level: 0,
};

static PREMIUM: Entitlement = Entitlement {
    id: Plan::Premium,
    name: "Premium Plan",
    price_monthly: 19.99,
    price_yearly: 199.99,
    features: &[
        "All Basic features",
        "AI Code Autocompletion (Advanced)",
        "Code Generation from Natural Language (Extended)",
        "Multi-file Understanding",
        "Testing Support (Basic)",
        "Refactoring Suggestions",
        "Code Explanation",
    ],
    code_completions_limit: 5000,
    code_generation_limit: 200,
    project_understanding_level: 1,
};

static PRO: Entitlement = Entitlement {
    id: Plan::Pro,
    name: "Pro Plan",
    price_monthly: 49.99,
    price_yearly: 499.99,
    features: &[
        "All Premium features",
        "Full Project Understanding",
        "Security Vulnerability Warnings",
        "AI-driven Code Review (Beta)",
        "Priority Support",
        "Access to Future Advancements (e.g., Voice-to-Code, Custom Models)",
    ],
    code_completions_limit: UNLIMITED,
    code_generation_limit: UNLIMITED,
    project_understanding_level: 2,
};

/// Entitlement for `plan`. Total over the enum.
pub fn get(plan: Plan) -> &'static Entitlement {
    match plan {
        Plan::None => &NONE,
        Plan::Basic => &BASIC,
        Plan::Premium => &PREMIUM,
        Plan::Pro => &PRO,
    }
}

/// Plans that can be bought, in ascending order.
pub fn purchasable() -> Vec<&'static Entitlement> {
    Plan::ALL
        .into_iter()
        .filter(Plan::is_paid)
        .map(get)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn understanding_level_is_monotonic_in_plan_order() {
        let levels: Vec<u8> = Plan::ALL
            .iter()
            .map(|p| get(*p).project_understanding_level)
            .collect();
        assert!(levels.windows(2).all(|w| w[0] <= w[1]), "{levels:?}");
    }

    #[test]
    fn every_entry_is_keyed_by_its_own_plan() {
        for plan in Plan::ALL {
            assert_eq!(get(plan).id, plan);
        }
    }

    #[test]
    fn purchasable_excludes_none() {
        let ids: Vec<Plan> = purchasable().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![Plan::Basic, Plan::Premium, Plan::Pro]);
    }

    #[test]
    fn pro_is_unlimited() {
        assert_eq!(get(Plan::Pro).code_generation_limit, UNLIMITED);
        assert_eq!(get(Plan::Pro).code_completions_limit, UNLIMITED);
        assert_eq!(get(Plan::None).code_generation_limit, 0);
    }

    #[test]
    fn serializes_with_plan_id() {
        let json = serde_json::to_value(get(Plan::Premium)).unwrap();
        assert_eq!(json["id"], "premium");
        assert_eq!(json["project_understanding_level"], 1);
        assert_eq!(json["features"].as_array().unwrap().len(), 7);
    }
}
