//! Application state shared across screens and commands.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, instrument};

use pocket_shop_core::{Email, OrderId};

use crate::cart_sync::{CartSync, PendingPush};
use crate::catalog::CatalogClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, clear_sentry_user, set_sentry_user};
use crate::gateway::RemoteGateway;
use crate::orders::{OrderDetailExpander, OrderLifecycleManager};
use crate::session::{SessionContext, UserProfile};

/// Application state.
///
/// This struct is cheaply cloneable via `Arc` and wires the engines to one
/// session and one gateway.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    session: SessionContext,
    gateway: RemoteGateway,
    catalog: CatalogClient,
    cart: CartSync<RemoteGateway>,
    orders: OrderLifecycleManager<RemoteGateway>,
    details: OrderDetailExpander<CatalogClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("session", &self.inner.session.current())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the engines from configuration.
    ///
    /// A token in `config` restores a signed-in session.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let session = config
            .token
            .clone()
            .map_or_else(SessionContext::new, SessionContext::with_token);
        let gateway = RemoteGateway::new(config.api_url.clone(), session.clone());
        let catalog = CatalogClient::new(config.catalog_url.clone());

        Self {
            inner: Arc::new(AppStateInner {
                cart: CartSync::new(gateway.clone()),
                orders: OrderLifecycleManager::new(gateway.clone()),
                details: OrderDetailExpander::new(catalog.clone()),
                config,
                session,
                gateway,
                catalog,
            }),
        }
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the session.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    /// Get a reference to the remote gateway.
    #[must_use]
    pub fn gateway(&self) -> &RemoteGateway {
        &self.inner.gateway
    }

    /// Get a reference to the catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the cart sync engine.
    #[must_use]
    pub fn cart(&self) -> &CartSync<RemoteGateway> {
        &self.inner.cart
    }

    /// Get a reference to the order lifecycle manager.
    #[must_use]
    pub fn orders(&self) -> &OrderLifecycleManager<RemoteGateway> {
        &self.inner.orders
    }

    /// Get a reference to the order detail expander.
    #[must_use]
    pub fn details(&self) -> &OrderDetailExpander<CatalogClient> {
        &self.inner.details
    }

    /// Create an account, sign in, and load the user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if sign-up or the cart pull fails.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserProfile, ClientError> {
        let profile = self.inner.gateway.sign_up(name, email, password).await?;
        set_sentry_user(&profile.id, Some(profile.email.as_str()));
        self.inner.cart.pull().await?;
        Ok(profile)
    }

    /// Forget the session.
    pub fn sign_out(&self) {
        self.inner.session.sign_out();
        clear_sentry_user();
    }

    /// Turn the cart into an order, then empty the cart.
    ///
    /// The cart is cleared only after the backend accepted the order.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::EmptyCart` for an empty cart, or the failure of
    /// the order call.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<(Option<OrderId>, PendingPush), ClientError> {
        let lines = self.inner.cart.cart().to_order_lines();
        if lines.is_empty() {
            return Err(ClientError::EmptyCart);
        }

        let order_id = self.inner.orders.place_order(&lines).await?;
        info!(order_id = ?order_id, "Checked out");
        Ok((order_id, self.inner.cart.clear()))
    }
}
