//! # Call Engine Configuration
//!
//! [`CallCenterConfig`] groups the routing and offer settings. Every field has
//! a default, and TOML files may set any subset:
//!
//! ```toml
//! [routing]
//! tie_break = "registration_order"
//!
//! [offers]
//! offer_timeout_ms = 20000
//! mark_away_on_no_answer = false
//! ```

use crate::error::{CallCenterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ordering among eligible agents that share a priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// Never-offered agents first, then the one whose last offer is oldest
    #[default]
    LeastRecentlyAssigned,
    /// Earliest registered agent first
    RegistrationOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub tie_break: TieBreakPolicy,
    /// Use the organization's catch-all pool when the selected pool has no
    /// eligible agent
    pub fallback_to_catch_all: bool,
    /// Resolve again, excluding agents already tried, when every snapshot
    /// entry turned out stale
    pub reresolve_when_stale: bool,
    /// Capacity for agents registered without an explicit limit. `None`
    /// means unlimited.
    pub default_max_simultaneous_simulations: Option<u32>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            tie_break: TieBreakPolicy::default(),
            fallback_to_catch_all: true,
            reresolve_when_stale: true,
            default_max_simultaneous_simulations: Some(25),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferConfig {
    /// How long an offered agent may ring before the offer moves on
    pub offer_timeout_ms: u64,
    /// Force an agent away after an unanswered offer
    pub mark_away_on_no_answer: bool,
    pub no_answer_message: String,
    pub unavailable_message: String,
}

impl Default for OfferConfig {
    fn default() -> Self {
        Self {
            offer_timeout_ms: 30_000,
            mark_away_on_no_answer: true,
            no_answer_message:
                "You've been marked as Away because you didn't answer an incoming call."
                    .to_string(),
            unavailable_message: "No agents are available right now".to_string(),
        }
    }
}

impl OfferConfig {
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.offer_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallCenterConfig {
    pub routing: RoutingConfig,
    pub offers: OfferConfig,
}

impl CallCenterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CallCenterError::configuration(e.to_string()))?;
        config.validate().map_err(CallCenterError::configuration)?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CallCenterError::configuration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.offers.offer_timeout_ms == 0 {
            return Err("offer_timeout_ms must be greater than 0".to_string());
        }
        if self.routing.default_max_simultaneous_simulations == Some(0) {
            return Err("default_max_simultaneous_simulations must be greater than 0".to_string());
        }
        if self.offers.mark_away_on_no_answer && self.offers.no_answer_message.trim().is_empty() {
            return Err("no_answer_message cannot be empty".to_string());
        }
        Ok(())
    }
}
