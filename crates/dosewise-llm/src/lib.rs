//! Prompt templates and answer extraction for generative dosage sources.
//!
//! This crate is network-free. It builds the prompts sent to a generative
//! language model and turns the model's free text back into typed answers, so
//! callers never handle raw completion text themselves.

pub mod prompts;
pub mod extraction;

pub use extraction::*;
pub use prompts::*;
