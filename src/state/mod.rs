//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemState`: lifecycle of a single work item's search request
//! - `HostState`: per-host backoff and reachability shared by all workers

mod host_state;
mod item_state;

pub use host_state::HostState;
pub use item_state::ItemState;
