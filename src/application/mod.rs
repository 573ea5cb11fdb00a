// Application layer - use cases and orchestration.
// Money movements run through MoneyMovementService; reads are assembled
// into the overview models for the CLI and exports.

pub mod error;
pub mod outcome;
pub mod overview;
pub mod service;

pub use error::*;
pub use outcome::*;
pub use overview::*;
pub use service::*;
