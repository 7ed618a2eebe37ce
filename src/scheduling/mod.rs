//! Pure scheduling logic: expanding recurrence rules into concrete
//! instances and detecting calendar conflicts. Nothing here touches the
//! store or the network, which keeps these rules directly testable.

pub mod conflict;
pub mod recurrence;

pub use conflict::{find_conflict, BookedSlot, ConflictWindow};
pub use recurrence::expand;
