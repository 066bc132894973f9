//! Route configuration control plane for API gateways.
//!
//! Operators create, update and delete route definitions through the control API. Each
//! committed change is broadcast to connected gateways as a `config_update`, and gateways
//! reconcile by pulling the active snapshot.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod net;
pub mod notifier;
pub mod observability;
pub mod repository;
pub mod snapshot;
pub mod store;

pub use config::schema::ControlPlaneConfig;
pub use error::{ControlPlaneError, ControlPlaneResult};
pub use gateway::ChannelManager;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use repository::RouteRepository;
pub use snapshot::SnapshotProvider;
pub use store::ConfigStore;
