//! Advisory service clients.
//!
//! The engine can optionally consult an external text-generation service
//! for planning and validation. Everything goes through the [`AIProvider`]
//! trait; the engine never trusts a response without the rule-based
//! fallback behind it.
//!
//! # Feature Flag
//!
//! The [`AIProvider`] trait is always available for custom implementations.
//! The bundled [`OpenRouterProvider`] requires the `ai` feature (default).
//!
//! ```toml
//! # Disable the HTTP client for a smaller binary
//! lex-cleaning = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_cleaning::ai::OpenRouterProvider;
//! use lex_cleaning::CleaningEngine;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(OpenRouterProvider::new("your-api-key")?);
//!
//! let outcome = CleaningEngine::builder()
//!     .ai_provider(provider)
//!     .build()?
//!     .run(dataframe)?;
//! ```

mod provider;
pub use provider::AIProvider;

#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
