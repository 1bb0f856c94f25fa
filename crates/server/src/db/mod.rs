pub mod pool;
pub mod progress;
