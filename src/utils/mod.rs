pub mod progress;
pub mod retry;

pub use progress::{format_bytes, format_duration, progress_bar};
pub use retry::RetryStrategy;
