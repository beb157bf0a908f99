//! Provider trait for the advisory text-generation service.
//!
//! Implementations turn a prompt into raw response text. Decoding and
//! validation of that text happen in the planner and validator, which also
//! own the fallback behavior.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `ollama.rs`)
//! 2. Implement the [`AIProvider`] trait for your provider struct
//! 3. Export the provider in `src/ai/mod.rs`

use anyhow::Result;

/// A text-generation backend.
///
/// Implementations must bound their own latency (e.g., an HTTP timeout):
/// the engine calls `generate` synchronously between steps.
pub trait AIProvider: Send + Sync {
    /// Send a prompt and return the raw response text.
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Model identifier, if the provider has one.
    fn model(&self) -> Option<&str> {
        None
    }
}
