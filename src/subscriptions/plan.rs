use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Subscription tier. Declaration order is entitlement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[serde(alias = "None")]
    None,
    #[serde(alias = "Basic")]
    Basic,
    #[serde(alias = "Premium")]
    Premium,
    #[serde(alias = "Pro")]
    Pro,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan {0:?}")]
pub struct UnknownPlan(pub String);

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::None, Plan::Basic, Plan::Premium, Plan::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::None => "none",
            Plan::Basic => "basic",
            Plan::Premium => "premium",
            Plan::Pro => "pro",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::None => "None",
            Plan::Basic => "Basic",
            Plan::Premium => "Premium",
            Plan::Pro => "Pro",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::None)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Plan::None),
            "basic" => Ok(Plan::Basic),
            "premium" => Ok(Plan::Premium),
            "pro" => Ok(Plan::Pro),
            _ => Err(UnknownPlan(s.to_string())),
        }
    }
}
