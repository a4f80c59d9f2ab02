//! Visitor simulation assignment
//!
//! Every visitor on a widget page watches one agent's simulated greeting.
//! Watching visitors count against the agent's
//! `max_simultaneous_simulations`, which call routing also checks, so the
//! assignment here decides who still has room for a call.
//!
//! Placement goes through the [`RoutingResolver`](crate::routing::RoutingResolver)
//! with the visitor's page, so the pool and tier rules that pick a call's
//! agent also pick the greeting. When an agent takes a call or goes offline
//! their other visitors are placed again without that agent; visitors nobody
//! can host wait until an agent logs in.

use super::core::CallCoordinator;
use super::types::{Reassignment, StatCounters, VisitorAssignment};
use crate::agent::Agent;
use crate::error::{CallCenterError, Result};
use greeter_infra_common::protocol::{
    AgentAssignedPayload, AgentId, AgentReassignedPayload, AgentUnavailablePayload,
    ReassignReason, SiteId, VisitorEvent, VisitorId, VisitorJoinPayload,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

impl CallCoordinator {
    /// Handle `visitor:join`: pick the agent whose greeting the visitor
    /// watches. A visitor joining again (new page) is moved.
    ///
    /// Returns `None` when nobody can host them; the visitor is told and
    /// waits for an agent to log in.
    pub async fn assign_visitor(&self, join: VisitorJoinPayload) -> Result<Option<AgentId>> {
        if self.resolver.site(&join.site_id).is_none() {
            return Err(CallCenterError::not_found(format!("site {}", join.site_id)));
        }
        if let Some((_, previous)) = self.visitors.remove(&join.visitor_id) {
            if let Some(agent_id) = &previous.agent_id {
                self.detach_visitor(agent_id, &join.visitor_id);
            }
        }

        let placed = self.place_visitor(&join.visitor_id, &join.site_id, &join.page_url, &HashSet::new());
        self.visitors.insert(
            join.visitor_id.clone(),
            VisitorAssignment {
                visitor_id: join.visitor_id.clone(),
                agent_id: placed.as_ref().map(|a| a.id.clone()),
                site_id: join.site_id,
                page_url: join.page_url,
            },
        );

        match placed {
            Some(agent) => {
                info!(
                    "👀 Visitor {} watching agent {} ({} simulation(s))",
                    join.visitor_id,
                    agent.id,
                    agent.simulations.len()
                );
                self.send_visitor(
                    &join.visitor_id,
                    VisitorEvent::AgentAssigned(AgentAssignedPayload {
                        visitor_id: join.visitor_id.clone(),
                        agent_id: agent.id.clone(),
                        display_name: agent.display_name,
                    }),
                )
                .await;
                Ok(Some(agent.id))
            }
            None => {
                info!("👀 No agent free to greet visitor {}", join.visitor_id);
                self.send_unavailable(&join.visitor_id).await;
                Ok(None)
            }
        }
    }

    /// Handle `visitor:leave`. Returns the agent that was hosting them.
    pub fn release_visitor(&self, visitor_id: &VisitorId) -> Option<AgentId> {
        let (_, assignment) = self.visitors.remove(visitor_id)?;
        let agent_id = assignment.agent_id?;
        self.detach_visitor(&agent_id, visitor_id);
        debug!(visitor_id = %visitor_id, agent_id = %agent_id, "Visitor left");
        Some(agent_id)
    }

    /// Move everyone watching `agent_id` to another agent, except `keep`
    /// (the visitor now in a call with them).
    pub async fn reassign_visitors(
        &self,
        agent_id: &AgentId,
        keep: Option<&VisitorId>,
        reason: ReassignReason,
    ) -> Reassignment {
        let mut result = Reassignment::default();
        let visitors = self.registry.take_visitors(agent_id, keep);
        if visitors.is_empty() {
            return result;
        }

        let exclude = HashSet::from([agent_id.clone()]);
        for visitor_id in visitors {
            let Some((site_id, page_url)) = self
                .visitors
                .get(&visitor_id)
                .map(|a| (a.site_id.clone(), a.page_url.clone()))
            else {
                debug!(visitor_id = %visitor_id, "Dropping simulation of a visitor who already left");
                continue;
            };

            let placed = self.place_visitor(&visitor_id, &site_id, &page_url, &exclude);
            if let Some(mut assignment) = self.visitors.get_mut(&visitor_id) {
                assignment.agent_id = placed.as_ref().map(|a| a.id.clone());
            }

            match placed {
                Some(agent) => {
                    StatCounters::bump(&self.counters.visitors_reassigned);
                    self.send_visitor(
                        &visitor_id,
                        VisitorEvent::AgentReassigned(AgentReassignedPayload {
                            previous_agent_id: agent_id.clone(),
                            new_agent_id: agent.id.clone(),
                            display_name: agent.display_name,
                            reason,
                        }),
                    )
                    .await;
                    result.reassigned.push((visitor_id, agent.id));
                }
                None => {
                    self.send_unavailable(&visitor_id).await;
                    result.unassigned.push(visitor_id);
                }
            }
        }

        info!(
            "🔀 Moved {} visitor(s) off agent {} ({:?}), {} now waiting",
            result.reassigned.len(),
            agent_id,
            reason,
            result.unassigned.len()
        );
        result
    }

    pub fn visitor_assignment(&self, visitor_id: &VisitorId) -> Option<VisitorAssignment> {
        self.visitors.get(visitor_id).map(|a| a.clone())
    }

    /// Place visitors who are waiting for an agent. Returns how many found one.
    pub(super) async fn place_waiting_visitors(&self) -> usize {
        let waiting: Vec<VisitorAssignment> = self
            .visitors
            .iter()
            .filter(|a| a.agent_id.is_none())
            .map(|a| a.value().clone())
            .collect();

        let mut placed_count = 0;
        for waiting in waiting {
            let Some(agent) =
                self.place_visitor(&waiting.visitor_id, &waiting.site_id, &waiting.page_url, &HashSet::new())
            else {
                continue;
            };

            let claimed = match self.visitors.get_mut(&waiting.visitor_id) {
                Some(mut assignment) if assignment.agent_id.is_none() => {
                    assignment.agent_id = Some(agent.id.clone());
                    true
                }
                _ => false,
            };
            if !claimed {
                // Left or re-joined while we were placing them.
                self.detach_visitor(&agent.id, &waiting.visitor_id);
                continue;
            }

            placed_count += 1;
            self.send_visitor(
                &waiting.visitor_id,
                VisitorEvent::AgentAssigned(AgentAssignedPayload {
                    visitor_id: waiting.visitor_id.clone(),
                    agent_id: agent.id.clone(),
                    display_name: agent.display_name,
                }),
            )
            .await;
        }

        if placed_count > 0 {
            info!("👀 Placed {} waiting visitor(s)", placed_count);
        }
        placed_count
    }

    /// Take the first routing candidate with a free simulation slot.
    fn place_visitor(
        &self,
        visitor_id: &VisitorId,
        site_id: &SiteId,
        page_url: &str,
        exclude: &HashSet<AgentId>,
    ) -> Option<Agent> {
        let outcome = match self.resolver.resolve(site_id, page_url, exclude) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("⚠️ Could not route visitor {}: {}", visitor_id, e);
                return None;
            }
        };

        outcome.candidates().iter().find_map(|candidate| {
            match self.registry.assign_visitor(&candidate.agent_id, visitor_id) {
                Ok(_) => self.registry.get(&candidate.agent_id),
                Err(e) => {
                    debug!(agent_id = %candidate.agent_id, error = %e, "Skipping greeting candidate");
                    None
                }
            }
        })
    }

    fn detach_visitor(&self, agent_id: &AgentId, visitor_id: &VisitorId) {
        if let Err(e) = self.registry.release_visitor(agent_id, visitor_id) {
            debug!(agent_id = %agent_id, visitor_id = %visitor_id, error = %e, "Visitor not detached");
        }
    }

    async fn send_unavailable(&self, visitor_id: &VisitorId) {
        self.send_visitor(
            visitor_id,
            VisitorEvent::AgentUnavailable(AgentUnavailablePayload {
                request_id: None,
                message: self.config.offers.unavailable_message.clone(),
            }),
        )
        .await;
    }
}
