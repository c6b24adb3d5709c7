//! Prometheus metrics exposed on the `/metrics` endpoint.

pub mod metrics;
