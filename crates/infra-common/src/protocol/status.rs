//! Agent status model shared by client and server

use crate::errors::types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational status of an agent.
///
/// `Idle` and `InSimulation` are the only statuses that can receive call
/// offers. `Away` is entered by the agent, by the inactivity timer, or forced
/// by the server after an unanswered offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Online and waiting for visitors
    Idle,
    /// Online but not accepting calls
    Away,
    /// Broadcasting at least one simulated (pre-recorded) greeting
    InSimulation,
    /// Connected to a visitor
    InCall,
    /// Signed out or deactivated
    Offline,
}

impl AgentStatus {
    /// Whether an agent in this status may be offered a call.
    pub fn is_available(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::InSimulation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Away => "away",
            AgentStatus::InSimulation => "in_simulation",
            AgentStatus::InCall => "in_call",
            AgentStatus::Offline => "offline",
        }
    }

    /// Check a status change against the agent lifecycle.
    ///
    /// Staying in the same status is always allowed. Any status may go
    /// `Offline`; `Offline` only comes back through `Idle`. `Away` and
    /// `InCall` move freely into each other since an admin may force an
    /// agent away mid-call.
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;

        if *self == next || next == Offline {
            return true;
        }

        matches!(
            (self, next),
            (Offline, Idle)
                | (Idle, Away)
                | (Away, Idle)
                | (Idle, InSimulation)
                | (InSimulation, Idle)
                | (InSimulation, Away)
                | (Idle, InCall)
                | (InSimulation, InCall)
                | (InCall, Idle)
                | (Away, InCall)
                | (InCall, Away)
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but as a `Result`.
    pub fn validate_transition(&self, next: AgentStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "away" => Ok(AgentStatus::Away),
            "in_simulation" => Ok(AgentStatus::InSimulation),
            "in_call" => Ok(AgentStatus::InCall),
            "offline" => Ok(AgentStatus::Offline),
            other => Err(Error::config(format!("Unknown agent status: {}", other))),
        }
    }
}

/// Why an agent went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwayReason {
    /// The agent pressed "away"
    Manual,
    /// The inactivity timer fired
    Idle,
    /// The agent let an offered call ring out
    RingNoAnswer,
}

impl fmt::Display for AwayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AwayReason::Manual => "manual",
            AwayReason::Idle => "idle",
            AwayReason::RingNoAnswer => "ring_no_answer",
        };
        f.write_str(s)
    }
}
