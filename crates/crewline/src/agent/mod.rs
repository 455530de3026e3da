//! Agent runtime: role configuration, agent construction and the per-stage
//! tool-use loop.
//!
//! - [`config::AgentsConfig`]: the YAML role table, validated on load.
//! - [`factory::AgentFactory`]: turns a role entry into an
//!   [`AgentDescriptor`] bound to a model through the router.
//! - [`runner::StageRunner`]: runs one agent until it answers with text or
//!   hits its limits.
//! - [`events`]: [`EventHandler`] trait and [`HarnessEvent`] enum for
//!   observing runs. Includes [`LoggingHandler`] and [`CompositeEventHandler`].

pub mod config;
pub mod events;
pub mod factory;
pub mod runner;

pub use config::{AgentsConfig, PIPELINE_ROLES, RoleConfig};
pub use events::{
    CompositeEventHandler, EventHandler, EventObserver, EventResponse, HarnessEvent,
    LoggingHandler, NoopHandler,
};
pub use factory::{AgentDescriptor, AgentFactory, AgentLimits};
pub use runner::{AgentRun, StageRunner};
