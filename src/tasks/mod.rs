//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - GC: Sweeps expired cache entries at configured intervals
//! - Dump: Writes a snapshot of the cache at configured intervals

mod dump;
mod gc;

pub use dump::spawn_dump_task;
pub use gc::spawn_gc_task;
