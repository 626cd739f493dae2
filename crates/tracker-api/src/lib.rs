//! # tracker-api
//!
//! REST gateway and server binary for the tracker service:
//!
//! - API routes under `/api/v1alpha1` for events, locks, and catalogs
//! - `/swagger.json` + `/docs` API documentation
//! - `/config.js` runtime frontend configuration and SPA hosting
//! - a dedicated metrics listener exposing Prometheus text format
//! - environment-driven configuration and graceful shutdown

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod frontend;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiErrorBody, ApiResult};
pub use server::{metrics_router, router, run, serve, AppState};
