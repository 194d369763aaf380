//! Transaction-Chat Agent
//!
//! A conversational agent that answers natural-language questions about a
//! user's financial transactions:
//! - Classifies each turn and deflects small talk and abusive input
//!   before any tool-driven work
//! - Drives a bounded model⟷tool loop over a declarative,
//!   schema-validated transaction query engine
//! - Resolves free-text category/type names against cached catalogs
//! - Persists each completed turn to short-lived conversational memory
//!
//! TURN PIPELINE:
//! CLASSIFY → {CHITCHAT, GUARDRAIL, LOAD CONTEXT} → MODEL ⟷ TOOLS → PERSIST

pub mod api;
pub mod catalog;
pub mod config;
pub mod datastore;
pub mod error;
pub mod events;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod models;
pub mod profile;
pub mod query;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use config::AgentConfig;
pub use graph::{Orchestrator, TurnState};
pub use models::*;
