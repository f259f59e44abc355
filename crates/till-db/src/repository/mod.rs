//! # Repository Layer
//!
//! One repository per aggregate. Repositories come in two flavors of method:
//!
//! - **Pool-bound reads**: instance methods on a pool-holding struct, used
//!   by callers outside any transaction.
//! - **Transaction-scoped writes**: associated functions taking
//!   `&mut SqliteConnection`, composed by the engines into one atomic unit
//!   of work. Nothing in this module opens or commits a transaction.

pub mod cost_history;
pub mod location;
pub mod movement;
pub mod order;
pub mod product;
pub mod purchase;
pub mod session;
pub mod stock;

use uuid::Uuid;

/// Generates a new entity ID (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
