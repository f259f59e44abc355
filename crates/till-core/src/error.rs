//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  ├── DbError          - Storage failures, incl. retryable Contention   │
//! │  └── LedgerError      - Engine boundary: Core ∪ Db, with error codes   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, ids, quantities)
//! 3. Errors are enum variants, never String
//! 4. Each variant maps to a user-facing message naming the entity at fault

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised inside the engine boundary.
///
/// Every variant either aborts the whole transaction or is raised before one
/// begins; callers never observe partial state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist (or belongs to a different tenant).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A stock-tracked product cannot cover the requested quantity.
    ///
    /// Raised by the stock ledger's guarded update during a sale; aborts the
    /// whole sale. The message names the product so the operator can act.
    #[error("Insufficient stock for \"{name}\": requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        name: String,
        requested: i64,
        available: i64,
    },

    /// Order does not exist (or belongs to a different tenant).
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The order was already voided. Stock is restored exactly once; the
    /// second void call gets this instead.
    #[error("Order {order_id} is already voided")]
    AlreadyVoided { order_id: String },

    /// Session does not exist (or belongs to a different tenant).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The cashier already has an unclosed session.
    #[error("An open session already exists: {session_id}")]
    SessionAlreadyOpen { session_id: String },

    /// The session was already closed.
    #[error("Session {session_id} is already closed")]
    AlreadyClosed { session_id: String },

    /// Purchase does not exist (or belongs to a different tenant).
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    /// The purchase is not in a state that allows the requested transition
    /// (e.g. cancelling a draft or an already-cancelled purchase).
    #[error("Purchase {purchase_id} is {status}, cannot perform operation")]
    InvalidPurchaseState {
        purchase_id: String,
        status: String,
    },

    /// Location does not exist or is inactive.
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Rejected before any transaction begins.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. invalid UUID, conflicting fields).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Cash sales must be covered by the tendered amount.
    #[error("Amount paid {amount_paid} does not cover total {total}")]
    InsufficientPayment { amount_paid: i64, total: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for \"Coca-Cola 330ml\": requested 5, available 3"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");

        let err = ValidationError::InsufficientPayment {
            amount_paid: 10000,
            total: 12000,
        };
        assert_eq!(
            err.to_string(),
            "Amount paid 10000 does not cover total 12000"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "items".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
