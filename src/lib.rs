//! CRM Metrics API Library
//!
//! Derives the customer dashboard's KPIs and behavioral segments from
//! snapshots of the CRM customer collection, and serves them over HTTP.
//!
//! # Modules
//!
//! - `api`: Routes, middleware and the OpenAPI document.
//! - `core`: Pure engine (metrics, segments, trend, dashboard).
//! - `data`: Data access layer.
//! - `integrations`: Upstream guards and the insight stub.
//! - `obs`: Observability and logging.
//! - `circuit_breaker`: Circuit breaker for the remote customer source.
//! - `config`: Configuration management.
//! - `dashboard`: Overview composition and memoization.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `insights`: Canned customer insight generator.
//! - `metrics`: Headline KPIs.
//! - `models`: Customer record and request models.
//! - `normalize`: Lenient field parsing and formatting helpers.
//! - `segments`: Behavioral segment rules.
//! - `store`: Customer sources and the snapshot cache.
//! - `trend`: Daily acquisition series.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and other binaries
pub mod circuit_breaker;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod insights;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod segments;
pub mod store;
pub mod trend;
