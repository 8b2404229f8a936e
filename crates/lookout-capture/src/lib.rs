//! Lookout Capture
//!
//! Wires the watchers into a running service: configuration, the
//! [`Lookout`] coordinator, the capturing outbound client, the axum
//! middleware that scopes each inbound request to a batch, and a
//! `tracing` layer that turns log events into entries.
//!
//! ```no_run
//! use axum::{middleware, routing::get, Router};
//! use lookout_capture::{capture_requests, Lookout, LookoutConfig, LookoutOptions};
//! use lookout_domain::EntryStorage;
//! use std::sync::Arc;
//! use tracing_subscriber::prelude::*;
//!
//! fn build(storage: Arc<dyn EntryStorage>) -> Result<Router, lookout_capture::ConfigError> {
//!     let lookout = Lookout::setup(LookoutOptions::new(LookoutConfig::default()), storage)?;
//!
//!     tracing_subscriber::registry()
//!         .with(tracing_subscriber::fmt::layer())
//!         .with(lookout.log_layer())
//!         .init();
//!
//!     Ok(Router::new()
//!         .route("/", get(|| async { "ok" }))
//!         .layer(middleware::from_fn_with_state(lookout, capture_requests)))
//! }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
mod coordinator;
mod log_layer;
mod middleware;

pub use client::{CapturingClient, CapturingRequestBuilder, InterceptorSet};
pub use config::{Authorizer, ConfigError, LookoutConfig, LookoutOptions, UserResolver};
pub use coordinator::Lookout;
pub use log_layer::LogLayer;
pub use lookout_watchers::batch;
pub use middleware::capture_requests;
