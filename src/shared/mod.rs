pub mod errors;
pub mod retry;
pub mod shutdown;

pub use errors::*;
pub use retry::{retry_with_backoff, RetryConfig};
pub use shutdown::ShutdownSignal;
