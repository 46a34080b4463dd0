use thiserror::Error;
use uuid::Uuid;

/// Market data could not be obtained. The cycle is skipped.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {code} - {message}")]
    Api { code: i64, message: String },

    #[error("Malformed market data: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No market data available")]
    Empty,
}

/// An order could not be placed or its fill could not be applied.
/// Position and budget are left untouched; the cycle is abandoned.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Order {client_order_id} rejected: {reason}")]
    Rejected {
        client_order_id: Uuid,
        reason: String,
    },

    #[error("Transport error submitting order {client_order_id}: {message}")]
    Transport {
        client_order_id: Uuid,
        message: String,
    },

    #[error("Insufficient capital: requested ${requested:.2}, available ${available:.2}")]
    InsufficientCapital { requested: f64, available: f64 },

    #[error("No open position to sell")]
    NoPosition,

    #[error("Invalid fill: {0}")]
    InvalidFill(String),
}

/// A notification channel failed. Never fatal.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}
