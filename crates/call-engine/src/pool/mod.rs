//! # Pools and Priority Tiers
//!
//! A pool is a named group of agents. Each membership carries a
//! `priority_rank` (1 is best) which maps onto a [`PriorityTier`]:
//!
//! | rank | tier     |
//! |------|----------|
//! | 1    | Primary  |
//! | 2    | Standard |
//! | 3+   | Backup   |
//!
//! Each organization has at most one catch-all pool, used when the pool
//! chosen for a page has no eligible agent.

use crate::error::{CallCenterError, Result};
use chrono::{DateTime, Utc};
use greeter_infra_common::protocol::{AgentId, OrgId, PoolId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Primary,
    Standard,
    Backup,
}

impl PriorityTier {
    pub fn from_rank(rank: u32) -> Result<Self> {
        match rank {
            0 => Err(CallCenterError::validation("priority rank must be at least 1")),
            1 => Ok(PriorityTier::Primary),
            2 => Ok(PriorityTier::Standard),
            _ => Ok(PriorityTier::Backup),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub org_id: Option<OrgId>,
    pub is_catch_all: bool,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    pub fn new(id: impl Into<PoolId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            org_id: None,
            is_catch_all: false,
            created_at: Utc::now(),
        }
    }

    pub fn catch_all(id: impl Into<PoolId>, name: impl Into<String>) -> Self {
        Self {
            is_catch_all: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_org(mut self, org_id: impl Into<OrgId>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMembership {
    pub agent_id: AgentId,
    pub pool_id: PoolId,
    pub priority_rank: u32,
}

impl PoolMembership {
    pub fn tier(&self) -> PriorityTier {
        // Ranks are validated on insert.
        PriorityTier::from_rank(self.priority_rank).unwrap_or(PriorityTier::Backup)
    }
}

#[derive(Default)]
struct DirectoryState {
    pools: HashMap<PoolId, Pool>,
    // pool -> agent -> rank
    members: HashMap<PoolId, HashMap<AgentId, u32>>,
}

/// All pools and memberships.
#[derive(Default)]
pub struct PoolDirectory {
    state: RwLock<DirectoryState>,
}

impl PoolDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool. A second catch-all pool for the same organization is
    /// rejected.
    pub fn add_pool(&self, pool: Pool) -> Result<()> {
        let mut state = self.state.write();
        if state.pools.contains_key(&pool.id) {
            return Err(CallCenterError::already_exists(format!("pool {}", pool.id)));
        }
        if pool.is_catch_all {
            if let Some(existing) = state
                .pools
                .values()
                .find(|p| p.is_catch_all && p.org_id == pool.org_id)
            {
                return Err(CallCenterError::pool(format!(
                    "organization already has catch-all pool {}",
                    existing.id
                )));
            }
        }
        info!("🗂️ Adding pool {} ({}){}", pool.name, pool.id, if pool.is_catch_all { " [catch-all]" } else { "" });
        state.members.insert(pool.id.clone(), HashMap::new());
        state.pools.insert(pool.id.clone(), pool);
        Ok(())
    }

    /// Remove a pool and its memberships.
    pub fn remove_pool(&self, pool_id: &PoolId) -> Option<Pool> {
        let mut state = self.state.write();
        state.members.remove(pool_id);
        state.pools.remove(pool_id)
    }

    pub fn get(&self, pool_id: &PoolId) -> Option<Pool> {
        self.state.read().pools.get(pool_id).cloned()
    }

    pub fn catch_all(&self, org_id: Option<&OrgId>) -> Option<Pool> {
        self.state
            .read()
            .pools
            .values()
            .find(|p| p.is_catch_all && p.org_id.as_ref() == org_id)
            .cloned()
    }

    pub fn add_member(&self, pool_id: &PoolId, agent_id: &AgentId, priority_rank: u32) -> Result<()> {
        PriorityTier::from_rank(priority_rank)?;
        let mut state = self.state.write();
        let members = state
            .members
            .get_mut(pool_id)
            .ok_or_else(|| CallCenterError::not_found(format!("pool {}", pool_id)))?;
        if members.contains_key(agent_id) {
            return Err(CallCenterError::already_exists(format!(
                "agent {} in pool {}",
                agent_id, pool_id
            )));
        }
        members.insert(agent_id.clone(), priority_rank);
        Ok(())
    }

    /// Change an existing membership's rank. Takes effect on the next resolve.
    pub fn set_priority_rank(&self, pool_id: &PoolId, agent_id: &AgentId, priority_rank: u32) -> Result<()> {
        PriorityTier::from_rank(priority_rank)?;
        let mut state = self.state.write();
        let rank = state
            .members
            .get_mut(pool_id)
            .and_then(|m| m.get_mut(agent_id))
            .ok_or_else(|| {
                CallCenterError::not_found(format!("agent {} in pool {}", agent_id, pool_id))
            })?;
        *rank = priority_rank;
        Ok(())
    }

    pub fn remove_member(&self, pool_id: &PoolId, agent_id: &AgentId) -> bool {
        self.state
            .write()
            .members
            .get_mut(pool_id)
            .map(|m| m.remove(agent_id).is_some())
            .unwrap_or(false)
    }

    /// Drop the agent from every pool. Returns how many memberships went.
    pub fn remove_agent_everywhere(&self, agent_id: &AgentId) -> usize {
        self.state
            .write()
            .members
            .values_mut()
            .filter_map(|m| m.remove(agent_id))
            .count()
    }

    pub fn members(&self, pool_id: &PoolId) -> Vec<PoolMembership> {
        self.state
            .read()
            .members
            .get(pool_id)
            .map(|m| {
                m.iter()
                    .map(|(agent_id, rank)| PoolMembership {
                        agent_id: agent_id.clone(),
                        pool_id: pool_id.clone(),
                        priority_rank: *rank,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn memberships_for(&self, agent_id: &AgentId) -> Vec<PoolMembership> {
        self.state
            .read()
            .members
            .iter()
            .filter_map(|(pool_id, m)| {
                m.get(agent_id).map(|rank| PoolMembership {
                    agent_id: agent_id.clone(),
                    pool_id: pool_id.clone(),
                    priority_rank: *rank,
                })
            })
            .collect()
    }
}
