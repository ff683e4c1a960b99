//! Core data types for the rate monitor.

pub mod alert;
pub mod chain;
pub mod rate;
pub mod snapshot;
pub mod threshold;

pub use alert::*;
pub use chain::*;
pub use rate::*;
pub use snapshot::*;
pub use threshold::*;
