//! # Resilience Module
//!
//! Retry policies for remote calls that are safe to repeat.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kg_integration::error::GatewayError;
//! use kg_integration::resilience::{retry_with_backoff, RetryOn, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), GatewayError> {
//! let policy = RetryPolicy::new(5, Duration::from_secs(1));
//!
//! let token = retry_with_backoff(&policy, "service_account_token", RetryOn::TokenExchange, || async {
//!     Ok::<_, GatewayError>("token".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{retry_with_backoff, RetryOn, RetryPolicy};
