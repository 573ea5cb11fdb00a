mod balance;
mod parties;
mod poster;
mod repository;
mod sequence;

pub use balance::*;
pub use parties::*;
pub use poster::*;
pub use repository::*;
pub use sequence::*;

/// SQL migration for the party tables and the append-only ledger
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
