//! Pocket Shop client library.
//!
//! The networked half of the storefront sync core: the Cart Sync Engine, the
//! Order Lifecycle Manager, the Order Detail Expander, and the Remote Gateway
//! they talk through. Pure cart and order logic lives in `pocket_shop_core`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart_sync;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod session;
pub mod state;

pub use cart_sync::{CartSnapshot, CartSync, PendingPush, PushOutcome, SyncError, SyncStatus};
pub use catalog::{CatalogClient, CatalogError, CatalogLookup, Product};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use gateway::{CartRemote, GatewayError, OrderRemote, RemoteGateway};
pub use orders::details::ExpandError;
pub use orders::{OrderDetailExpander, OrderError, OrderItemDetail, OrderLifecycleManager};
pub use session::{Session, SessionContext, UserProfile};
pub use state::AppState;
