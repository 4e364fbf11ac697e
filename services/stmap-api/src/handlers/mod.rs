//! HTTP request handlers for the stmap API.

pub mod api;
pub mod common;
pub mod health;
pub mod tiles;

pub use api::{api_get_handler, api_post_handler};
pub use health::{health_handler, metrics_handler, ready_handler};
pub use tiles::tile_handler;
