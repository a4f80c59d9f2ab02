//! # Call Routing Module
//!
//! Decides which agents a visitor's call may be offered to, and in what order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Visitor call request                     │
//! │            (site id, page URL, visitor id)                  │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────────────┐
//! │                     Path rules                              │
//! │  active rules by descending priority, then the site's       │
//! │  default pool                                               │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ selected pool (or none)
//! ┌─────────────────────────▼───────────────────────────────────┐
//! │                   Routing resolver                          │
//! │  - eligibility snapshot from the agent registry             │
//! │  - Primary → Standard → Backup                              │
//! │  - tie-break inside each tier                               │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!           ┌───────────────┼────────────────────┐
//!           │               │                    │
//! ┌─────────▼─────────┐ ┌───▼──────────────┐ ┌───▼──────────┐
//! │ Selected pool     │ │ Catch-all pool   │ │  Exhausted   │
//! │ has candidates    │ │ has candidates   │ │  visitor is  │
//! │                   │ │                  │ │  told nobody │
//! │                   │ │                  │ │  is free     │
//! └───────────────────┘ └──────────────────┘ └──────────────┘
//! ```
//!
//! ## Path patterns
//!
//! | pattern      | matches                                   |
//! |--------------|-------------------------------------------|
//! | `/pricing`   | exactly `/pricing` (trailing slash ignored) |
//! | `/docs*`     | any path starting with `/docs`            |
//! | `/blog/*`    | direct children of `/blog`                |
//! | `/shop/**`   | `/shop` and everything below it           |
//!
//! ## Tie-breaking
//!
//! Inside a tier, [`TieBreakPolicy::LeastRecentlyAssigned`](crate::config::TieBreakPolicy)
//! rotates offers round-robin: agents who were never offered a call come
//! first, then the one whose last offer is oldest. Assignment stamps come
//! from a monotonic counter, not wall clock time, so two offers in the same
//! millisecond still order correctly.
//!
//! The candidate list is a snapshot. Any agent on it may become ineligible
//! before their turn; the coordinator re-checks each one when offering.
//!
//! ## Modules
//!
//! - [`path_rules`]: page URL to pool selection
//! - [`resolver`]: tiered candidate ordering and catch-all fallback

pub mod path_rules;
pub mod resolver;

pub use path_rules::{extract_path, matches_pattern, PathRule, SiteConfig};
pub use resolver::{Candidate, RoutingOutcome, RoutingResolver};
