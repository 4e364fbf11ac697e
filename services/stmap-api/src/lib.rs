//! Stmap API Service Library
//!
//! HTTP front end for the query pipeline: the `/api` call endpoint, TMS
//! tiles, health and Prometheus metrics. Every call runs on the blocking
//! pool under the configured timeout and successful responses are kept in
//! an in-memory cache.

pub mod cache;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod state;
