//! # Completion providers
//!
//! The boundary between the evaluator and a language model. Network
//! connectors live outside this crate; they implement
//! [`CompletionProvider`](provider::CompletionProvider) and hand back an ordered
//! stream of `(sample_index, token)` pairs.
//!
//! Two in-crate adapters cover tests, benches and local experiments:
//!
//! - [`FnProvider`](llms::fn_provider::FnProvider): wraps a closure producing a token stream
//! - [`ScriptedProvider`](llms::scripted::ScriptedProvider): pattern → answer knowledge base

pub mod llms;
#[allow(clippy::module_inception)]
pub mod provider;
pub mod types;
