//! Embassy async tasks
//!
//! Each task runs independently and communicates via signals.

pub mod engine;
pub mod irq;

pub use engine::engine_task;
pub use irq::irq_task;
