//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `DataSource`: JSON market-data and news providers
//! - `Analyst`: Language model completions
//! - `Delivery`: Chat transport for reports and alerts
//! - `RunTrigger`: Inbound on-demand run (scheduler, HTTP)

pub mod analyst;
pub mod data_source;
pub mod delivery;
pub mod trigger;

pub use analyst::Analyst;
pub use data_source::{DataRequest, DataSource};
pub use delivery::Delivery;
pub use trigger::{RunObserver, RunTrigger};
