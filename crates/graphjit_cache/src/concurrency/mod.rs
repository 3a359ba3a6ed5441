// Background compilation
pub mod scheduler;

pub use scheduler::AsyncCompileScheduler;
