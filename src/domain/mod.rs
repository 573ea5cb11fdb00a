mod entry;
mod integrity;
mod ledger;
mod money;
mod movement;
mod party;

pub use entry::*;
pub use integrity::*;
pub use ledger::*;
pub use money::*;
pub use movement::*;
pub use party::*;
