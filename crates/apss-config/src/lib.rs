//! Environment-variable configuration structs for the three APSS binaries.

pub mod admission;
pub mod agent;
pub mod aggregator;
pub mod env;

pub use admission::AdmissionConfig;
pub use agent::AgentConfig;
pub use aggregator::AggregatorConfig;
pub use env::EnvError;
