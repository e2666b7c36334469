//! Crate entrypoint: DNS zone management against an Azure-style management
//! API, the zone workflow driver, and a local emulator of the service.

pub mod api;
pub mod auth;
pub mod config;
pub mod emulator;
pub mod error;
pub mod management;
pub mod model;
pub mod pager;
pub mod store;
pub mod validation;
pub mod workflow;

pub use api::{Page, PageRequest, Precondition, ZoneApi};
pub use error::DnsError;
pub use management::client::DnsManagementClient;
pub use store::InMemoryZoneStore;
pub use workflow::{StepReport, Workflow};
