//! Text-generation provider adapter.
//!
//! Implements the [`Refiner`](crate::domain::ports::Refiner) port on top of
//! the Anthropic Messages API with token-bucket rate limiting and
//! exponential-backoff retries for transient failures.

pub mod client;
pub mod errors;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use client::{AnthropicClient, AnthropicRefiner};
pub use errors::LlmApiError;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
