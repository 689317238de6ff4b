//! Domain services for the webhook dispatch service.
//!
//! Services contain business logic that operates on domain models.

pub mod retry;

pub use retry::{JitterSource, RetryDelayCalculator, RetryPolicyError, ThreadRngJitter};
