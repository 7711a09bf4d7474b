//! Administrative surface.
//!
//! Two operations are supported: a status listing of the configured feeds
//! and a manual check that runs a polling cycle immediately. Both are served
//! by the optional HTTP API in [`http`], which only admits callers holding
//! the admin token.

pub mod http;
pub mod service;

pub use http::{create_router, AdminState};
pub use service::{AdminService, CheckOutcome, CheckSummary, InactiveFeed, StatusReport};
