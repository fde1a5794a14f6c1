//! On-disk state for restoscout.
//!
//! - [`CounterFile`]: the persistent identifier allocator (plain-text counter)
//! - [`SnapshotWriter`]: per-unit JSON snapshot files
//!
//! Both assume a single writing process; there is no file locking.

mod counter;
mod snapshot;

pub use counter::{CounterFile, ID_WIDTH, IdAllocator, format_id};
pub use snapshot::SnapshotWriter;
