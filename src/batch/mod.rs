pub mod item;
pub mod scheduler;

pub use item::{BatchEvent, Progress, SlidePage, WorkItem, WorkStatus};
pub use scheduler::BatchScheduler;
