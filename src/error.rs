//! Error types for the transaction-chat agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Turn Pipeline Errors
    // =============================

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Tool correlation error: {0}")]
    ToolCorrelationError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Memory store error: {0}")]
    MemoryError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
