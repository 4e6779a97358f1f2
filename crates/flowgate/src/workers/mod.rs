//! The two pipeline workers. Both are plain tokio tasks, not an abstraction layered on top of
//! tokio's own task spawning.

pub mod sink_worker;
pub mod source_worker;
