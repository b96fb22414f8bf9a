//! Report pipeline: prompt construction, LLM synthesis, output decoding,
//! and best-effort quality scoring.

pub mod decoder;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod scoring;
pub mod synthesizer;
