//! Ranked agent list for a visitor request

use super::path_rules::SiteConfig;
use crate::agent::{Agent, AgentRegistry};
use crate::config::{RoutingConfig, TieBreakPolicy};
use crate::error::{CallCenterError, Result};
use crate::pool::{PoolDirectory, PriorityTier};
use dashmap::DashMap;
use greeter_infra_common::protocol::{AgentId, PoolId, SiteId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One entry of the ranked offer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub agent_id: AgentId,
    pub pool_id: PoolId,
    pub tier: PriorityTier,
    pub priority_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// Eligible agents in offer order, best first
    Candidates {
        pool_id: PoolId,
        used_catch_all: bool,
        candidates: Vec<Candidate>,
    },
    /// Nobody can take the call
    Exhausted { reason: String },
}

impl RoutingOutcome {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            RoutingOutcome::Candidates { candidates, .. } => candidates,
            RoutingOutcome::Exhausted { .. } => &[],
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RoutingOutcome::Exhausted { .. })
    }
}

pub struct RoutingResolver {
    registry: Arc<AgentRegistry>,
    pools: Arc<PoolDirectory>,
    sites: DashMap<SiteId, SiteConfig>,
    config: RoutingConfig,
}

impl RoutingResolver {
    pub fn new(registry: Arc<AgentRegistry>, pools: Arc<PoolDirectory>, config: RoutingConfig) -> Self {
        Self {
            registry,
            pools,
            sites: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn pools(&self) -> &Arc<PoolDirectory> {
        &self.pools
    }

    pub fn upsert_site(&self, site: SiteConfig) {
        info!("🌐 Routing config for site {}: {} path rule(s)", site.site_id, site.path_rules.len());
        self.sites.insert(site.site_id.clone(), site);
    }

    pub fn remove_site(&self, site_id: &SiteId) -> Option<SiteConfig> {
        self.sites.remove(site_id).map(|(_, site)| site)
    }

    pub fn site(&self, site_id: &SiteId) -> Option<SiteConfig> {
        self.sites.get(site_id).map(|s| s.clone())
    }

    /// Rank the eligible agents for a visitor on `page_url`.
    ///
    /// Agents in `exclude` are skipped; the coordinator passes the agents it
    /// already tried when it re-resolves.
    pub fn resolve(
        &self,
        site_id: &SiteId,
        page_url: &str,
        exclude: &HashSet<AgentId>,
    ) -> Result<RoutingOutcome> {
        let site = self
            .site(site_id)
            .ok_or_else(|| CallCenterError::not_found(format!("site {}", site_id)))?;

        let selected = site.select_pool(page_url);
        if let Some(pool_id) = &selected {
            if self.pools.get(pool_id).is_none() {
                warn!("⚠️ Site {} routes to unknown pool {}", site_id, pool_id);
            } else {
                let candidates = self.rank_pool(pool_id, exclude);
                if !candidates.is_empty() {
                    debug!(pool_id = %pool_id, count = candidates.len(), "Resolved candidates");
                    return Ok(RoutingOutcome::Candidates {
                        pool_id: pool_id.clone(),
                        used_catch_all: false,
                        candidates,
                    });
                }
            }
        }

        if !self.config.fallback_to_catch_all {
            return Ok(RoutingOutcome::Exhausted {
                reason: "no eligible agent in the selected pool".to_string(),
            });
        }

        let Some(catch_all) = self.pools.catch_all(site.org_id.as_ref()) else {
            return Ok(RoutingOutcome::Exhausted {
                reason: "no eligible agent and no catch-all pool".to_string(),
            });
        };

        if selected.as_ref() == Some(&catch_all.id) {
            return Ok(RoutingOutcome::Exhausted {
                reason: "no eligible agent in the catch-all pool".to_string(),
            });
        }

        let candidates = self.rank_pool(&catch_all.id, exclude);
        if candidates.is_empty() {
            return Ok(RoutingOutcome::Exhausted {
                reason: "no eligible agent in the catch-all pool".to_string(),
            });
        }

        info!("🔀 Falling back to catch-all pool {} for site {}", catch_all.id, site_id);
        Ok(RoutingOutcome::Candidates {
            pool_id: catch_all.id,
            used_catch_all: true,
            candidates,
        })
    }

    /// Eligible members of a pool, tier by tier, tie-broken per policy.
    pub fn rank_pool(&self, pool_id: &PoolId, exclude: &HashSet<AgentId>) -> Vec<Candidate> {
        let mut ranked: Vec<(Candidate, Agent)> = self
            .pools
            .members(pool_id)
            .into_iter()
            .filter(|m| !exclude.contains(&m.agent_id))
            .filter_map(|m| {
                let agent = self.registry.get(&m.agent_id)?;
                if let Some(reason) = agent.ineligibility() {
                    debug!(agent_id = %agent.id, reason, "Not eligible");
                    return None;
                }
                let candidate = Candidate {
                    tier: m.tier(),
                    agent_id: m.agent_id,
                    pool_id: m.pool_id,
                    priority_rank: m.priority_rank,
                };
                Some((candidate, agent))
            })
            .collect();

        match self.config.tie_break {
            TieBreakPolicy::LeastRecentlyAssigned => ranked.sort_by(|(ca, a), (cb, b)| {
                ca.tier
                    .cmp(&cb.tier)
                    .then(a.last_assignment_seq.cmp(&b.last_assignment_seq))
                    .then(a.registration_seq.cmp(&b.registration_seq))
                    .then(a.id.as_str().cmp(b.id.as_str()))
            }),
            TieBreakPolicy::RegistrationOrder => ranked.sort_by(|(ca, a), (cb, b)| {
                ca.tier
                    .cmp(&cb.tier)
                    .then(a.registration_seq.cmp(&b.registration_seq))
                    .then(a.id.as_str().cmp(b.id.as_str()))
            }),
        }

        ranked.into_iter().map(|(candidate, _)| candidate).collect()
    }
}
