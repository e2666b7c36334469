//! REST binding of the zone-management API.
pub mod client;
pub mod types;
