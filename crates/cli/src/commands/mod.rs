//! Subcommand implementations.
//!
//! Each command prints its result to stdout; failures bubble up as
//! `ClientError` and are reported by `main`.

pub mod account;
pub mod cart;
pub mod orders;
pub mod products;
