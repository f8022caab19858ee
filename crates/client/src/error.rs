//! Unified error handling with Sentry integration.
//!
//! Provides a unified `ClientError` type. Callers at the edge (the CLI, a UI
//! shell) call [`ClientError::report`], which captures unexpected failures to
//! Sentry and returns the text to show the user.

use thiserror::Error;

use pocket_shop_core::{EmailError, OrderId, OrderStage};

use crate::cart_sync::SyncError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::orders::OrderError;
use crate::orders::details::ExpandError;

/// Application-level error type for the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Backend call failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Cart push or pull failed. The local cart is intact.
    #[error("Cart sync error: {0}")]
    Sync(#[from] SyncError),

    /// Order detail expansion failed.
    #[error("{0}")]
    Expand(#[from] ExpandError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Email failed validation.
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// The order is already at or past the requested stage.
    #[error("Order {order_id} is {from}; cannot move it to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStage,
        to: OrderStage,
    },

    /// No such order in the current view.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Checkout with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,
}

impl From<OrderError> for ClientError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Remote(e) => Self::Gateway(e),
            OrderError::InvalidTransition { order_id, from, to } => {
                Self::InvalidTransition { order_id, from, to }
            }
            OrderError::EmptyOrder => Self::EmptyCart,
        }
    }
}

impl ClientError {
    /// Whether this is a failure the user cannot fix by themselves.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Gateway(e) => is_internal_gateway(e),
            Self::Sync(e) => e.gateway().is_none_or(is_internal_gateway),
            Self::Catalog(e) => is_internal_catalog(e),
            Self::Expand(e) => is_internal_catalog(&e.source),
            Self::Config(_) => true,
            Self::Email(_)
            | Self::InvalidTransition { .. }
            | Self::OrderNotFound(_)
            | Self::EmptyCart => false,
        }
    }

    /// Text to show the user. Internal details are hidden; server messages
    /// are passed through.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(e) => gateway_message(e),
            Self::Sync(SyncError::Push { source, .. }) => format!(
                "Your cart was saved on this device but not synced: {}",
                gateway_message(source)
            ),
            Self::Sync(SyncError::Pull(source)) => gateway_message(source),
            Self::Sync(SyncError::Task(_)) => "Internal error".to_string(),
            Self::Catalog(e) => catalog_message(e),
            Self::Expand(e) => catalog_message(&e.source),
            Self::Config(e) => e.to_string(),
            Self::Email(_) => "Invalid email address".to_string(),
            Self::InvalidTransition { order_id, from, .. } => {
                format!("Order {order_id} is already {from}")
            }
            Self::OrderNotFound(_) | Self::EmptyCart => self.to_string(),
        }
    }

    /// Log the error, capture it to Sentry if it is internal, and return the
    /// user-facing message.
    ///
    /// Capturing is a no-op when Sentry was never initialised.
    pub fn report(&self) -> String {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        } else {
            tracing::warn!(error = %self, "Operation refused");
        }
        self.user_message()
    }
}

const fn is_internal_gateway(err: &GatewayError) -> bool {
    matches!(
        err,
        GatewayError::Http(_) | GatewayError::Parse(_) | GatewayError::Url(_)
    )
}

const fn is_internal_catalog(err: &CatalogError) -> bool {
    !matches!(
        err,
        CatalogError::NotFound(_) | CatalogError::RateLimited(_)
    )
}

fn gateway_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Http(_) => "Could not reach the shop, please try again".to_string(),
        GatewayError::Parse(_) | GatewayError::Url(_) => {
            "Unexpected response from the shop".to_string()
        }
        GatewayError::Rejected { message, .. } => message.clone(),
        GatewayError::RateLimited(secs) => {
            format!("Too many requests, try again in {secs} seconds")
        }
        GatewayError::NotAuthenticated => "Please sign in first".to_string(),
        GatewayError::NotFound(_) => "Not found".to_string(),
    }
}

fn catalog_message(err: &CatalogError) -> String {
    match err {
        CatalogError::NotFound(id) => format!("Product {id} is no longer available"),
        CatalogError::RateLimited(secs) => {
            format!("Too many requests, try again in {secs} seconds")
        }
        _ => "Could not load product details".to_string(),
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart and
/// order actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "add", Some(&[("revision", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
