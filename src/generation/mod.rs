//! Client for the external question generation API.
//!
//! Every request goes through [`crate::retry::with_retry`] using the policy
//! from [`GenerationConfig`].

pub mod client;
pub mod config;
pub mod error;

pub use client::{GeneratedQuestion, GenerationClient, GenerationRequest};
pub use config::GenerationConfig;
pub use error::GenerationError;
