//! Data models and schemas for the relay API.

pub mod api;
pub mod metric;

pub use api::*;
pub use metric::*;
