//! Pocket Shop Core - cart and order state without I/O.
//!
//! This crate holds the parts of the sync core that are pure functions of
//! their inputs:
//! - the Cart Store ([`Cart`]) and its reducer actions
//! - the order model and the three-way lifecycle partition ([`OrderBuckets`])
//! - newtype ids, money and email types shared with the client crate
//!
//! # Architecture
//!
//! Nothing in here touches the network, a clock, or a global. The client crate
//! owns instances of these types and decides when they change; this crate only
//! decides *how* they change.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod orders;
pub mod types;

pub use cart::{Cart, CartAction, CartLine};
pub use orders::{Order, OrderBuckets, OrderLine};
pub use types::*;
