//! Runtime lifecycle: the top-level [`Manager`] and its child-process
//! [`Supervisor`].

pub mod manager;
pub mod supervisor;

pub use manager::{HealthSnapshot, HealthSource, HealthStatus, Manager};
pub use supervisor::Supervisor;
