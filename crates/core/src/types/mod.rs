//! Core value types.
//!
//! Type-safe wrappers for ids, money amounts, email addresses and order stages.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use status::OrderStage;
