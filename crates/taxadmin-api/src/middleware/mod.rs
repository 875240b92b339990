//! # Middleware
//!
//! Tower layers wrapped around the authenticated API router. Authentication
//! lives in [`crate::auth`]; request tracing is `tower-http`'s `TraceLayer`.

pub mod metrics;
