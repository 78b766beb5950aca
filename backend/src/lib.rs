//! Automated lead sales funnel engine for a real-estate SaaS backend.
//!
//! The core is three engines sharing two leaf components: the funnel state
//! machine drives a lead stage by stage, the negotiation engine evaluates
//! buyer offers against per-lead rules with an AI-assisted strategy
//! fallback, and the viewing scheduler books conflict-free appointments.
//! Notifications fan out over a prioritized channel list (chat, SMS, email)
//! and the decision advisor is a pluggable capability that degrades to
//! deterministic fallbacks.

use std::sync::Arc;

pub mod advisor;
pub mod auth;
pub mod automation;
pub mod config;
pub mod error;
pub mod funnel;
pub mod leads;
pub mod models;
pub mod negotiation;
pub mod notify;
pub mod offers;
pub mod scheduler;
pub mod slots;
pub mod store;
#[cfg(test)]
pub(crate) mod testkit;
pub mod transports;
pub mod viewings;

use crate::config::AppConfig;
use crate::funnel::FunnelEngine;
use crate::negotiation::NegotiationEngine;
use crate::scheduler::ViewingScheduler;
use crate::store::FunnelStore;

/// Shared handler state: configuration plus the wired engines.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn FunnelStore>,
    pub funnel: Arc<FunnelEngine>,
    pub negotiation: Arc<NegotiationEngine>,
    pub scheduler: Arc<ViewingScheduler>,
}
