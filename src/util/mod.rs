//! Request policy: retry, inactivity timeout, and the client decorator that applies them.

pub mod resilient;
pub mod retry;
pub mod timeout;

pub use resilient::ResilientClient;
pub use retry::RetryPolicy;
pub use timeout::idle_timeout;
