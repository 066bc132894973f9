//! Route data model.
//!
//! - `route.rs`: persisted records ([`RouteConfig`], [`LoadBalancingTarget`]) and enums
//! - `definition.rs`: operator input ([`RouteDefinition`]) and its validation
//! - `event.rs`: [`ChangeEvent`], the notification broadcast after each commit

pub mod definition;
pub mod event;
pub mod route;

pub use definition::{LoadBalancing, RouteDefinition, SecurityPolicy};
pub use event::ChangeEvent;
pub use route::{
    AuthType, ChangeKind, LbAlgorithm, LoadBalancingTarget, RouteConfig, RouteStatus,
    RouteWithTargets,
};
