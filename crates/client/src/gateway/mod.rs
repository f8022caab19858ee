//! Remote Gateway: authenticated HTTP calls to the cart, order and user
//! endpoints.
//!
//! # Architecture
//!
//! - The sync engines talk to the backend through the [`CartRemote`] and
//!   [`OrderRemote`] traits; [`RemoteGateway`] is the `reqwest` implementation
//! - The bearer token is read from [`SessionContext`] on every call
//! - Any non-2xx code, or a body whose `status` is not `"OK"`, is a failure
//! - No retries and no timeouts at this layer
//!
//! # Example
//!
//! ```rust,ignore
//! use pocket_shop_client::gateway::{CartRemote, RemoteGateway};
//!
//! let gateway = RemoteGateway::new(config.api_url.clone(), session.clone());
//! let lines = gateway.fetch_cart().await?;
//! ```

mod wire;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use pocket_shop_core::{CartLine, Email, Order, OrderId, OrderLine, OrderStage};

use crate::session::{SessionContext, UserProfile};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed (network unreachable, connection reset, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend refused the request.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// No bearer token in the session.
    #[error("Not signed in")]
    NotAuthenticated,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An endpoint path did not join onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl GatewayError {
    /// Whether the failure happened before or during transport, as opposed to
    /// the backend answering with a refusal.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_))
    }
}

// =============================================================================
// Remote traits
// =============================================================================

/// Remote side of the cart.
pub trait CartRemote: Send + Sync + 'static {
    /// Fetch the server's cart snapshot.
    fn fetch_cart(&self) -> impl Future<Output = Result<Vec<CartLine>, GatewayError>> + Send;

    /// Replace the server's cart with `lines`.
    fn push_cart(
        &self,
        lines: &[CartLine],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Remote side of orders.
pub trait OrderRemote: Send + Sync + 'static {
    /// Every order belonging to the signed-in user, in backend order.
    fn list_orders(&self) -> impl Future<Output = Result<Vec<Order>, GatewayError>> + Send;

    /// Submit a new order. Returns the new id when the backend reports one.
    fn place_order(
        &self,
        lines: &[OrderLine],
    ) -> impl Future<Output = Result<Option<OrderId>, GatewayError>> + Send;

    /// Set the order's flags to those of `stage`.
    fn update_order(
        &self,
        id: OrderId,
        stage: OrderStage,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

// =============================================================================
// RemoteGateway
// =============================================================================

/// `reqwest` implementation of the remote traits.
///
/// Cheap to clone; clones share the connection pool and session.
#[derive(Clone)]
pub struct RemoteGateway {
    inner: Arc<RemoteGatewayInner>,
}

struct RemoteGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    session: SessionContext,
}

impl std::fmt::Debug for RemoteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("authenticated", &self.inner.session.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl RemoteGateway {
    /// Create a gateway for the backend at `base_url`.
    #[must_use]
    pub fn new(base_url: Url, session: SessionContext) -> Self {
        Self {
            inner: Arc::new(RemoteGatewayInner {
                client: reqwest::Client::new(),
                base_url,
                session,
            }),
        }
    }

    /// The session this gateway authenticates with.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    /// Create an account and sign the session in with the issued token.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Rejected` if the backend refuses the sign-up or
    /// answers without a token.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_up(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserProfile, GatewayError> {
        let body = wire::SignUp {
            name,
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let request = self
            .inner
            .client
            .post(self.endpoint("users/signup")?)
            .json(&body);

        let (status, response): (u16, wire::SignUpResponse) =
            self.execute(request, "sign_up").await?;
        response.ack.check(status)?;

        let token = response.token.ok_or_else(|| GatewayError::Rejected {
            status,
            message: "sign-up response carried no token".to_string(),
        })?;
        let Some(id) = response.id else {
            return Err(GatewayError::Rejected {
                status,
                message: "sign-up response carried no user id".to_string(),
            });
        };

        let profile = UserProfile {
            id,
            name: response.name.unwrap_or_else(|| name.to_string()),
            email: response
                .email
                .and_then(|e| Email::parse(&e).ok())
                .unwrap_or_else(|| email.clone()),
        };
        self.inner
            .session
            .sign_in(SecretString::from(token), Some(profile.clone()));
        Ok(profile)
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Start an authenticated request, failing early without a token.
    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        let token = self
            .inner
            .session
            .bearer_token()
            .ok_or(GatewayError::NotAuthenticated)?;
        Ok(self
            .inner
            .client
            .request(method, self.endpoint(path)?)
            .bearer_auth(token.expose_secret()))
    }

    /// Send a request and parse the JSON body.
    ///
    /// Returns the HTTP status alongside the body so callers can attach it to
    /// a body-level rejection.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<(u16, T), GatewayError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        // Body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                operation,
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(GatewayError::NotFound(operation.to_string()));
            }
            let message = wire::rejection_message(&response_text)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match serde_json::from_str(&response_text) {
            Ok(body) => Ok((status.as_u16(), body)),
            Err(e) => {
                tracing::error!(
                    operation,
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse backend response"
                );
                Err(GatewayError::Parse(e))
            }
        }
    }
}

impl CartRemote for RemoteGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Vec<CartLine>, GatewayError> {
        let request = self.authed(Method::GET, "cart")?;
        let (status, response): (u16, wire::CartResponse) =
            self.execute(request, "fetch_cart").await?;
        response.ack.check(status)?;
        debug!(lines = response.items.len(), "Fetched cart");
        Ok(response.items)
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn push_cart(&self, lines: &[CartLine]) -> Result<(), GatewayError> {
        let request = self
            .authed(Method::PUT, "cart")?
            .json(&wire::CartPush { items: lines });
        let (status, response): (u16, wire::AckResponse) =
            self.execute(request, "push_cart").await?;
        response.ack.check(status)
    }
}

impl OrderRemote for RemoteGateway {
    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, GatewayError> {
        let request = self.authed(Method::GET, "orders/all")?;
        let (status, response): (u16, wire::OrdersResponse) =
            self.execute(request, "list_orders").await?;
        response.ack.check(status)?;

        let orders = response
            .orders
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(orders = orders.len(), "Fetched orders");
        Ok(orders)
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn place_order(&self, lines: &[OrderLine]) -> Result<Option<OrderId>, GatewayError> {
        let request = self
            .authed(Method::POST, "orders/neworder")?
            .json(&wire::NewOrder { items: lines });
        let (status, response): (u16, wire::NewOrderResponse) =
            self.execute(request, "place_order").await?;
        response.ack.check(status)?;
        Ok(response.order_id)
    }

    #[instrument(skip(self), fields(order_id = %id, stage = %stage))]
    async fn update_order(&self, id: OrderId, stage: OrderStage) -> Result<(), GatewayError> {
        let request = self
            .authed(Method::POST, "orders/updateorder")?
            .json(&wire::OrderUpdate::new(id, stage.flags()));
        let (status, response): (u16, wire::AckResponse) =
            self.execute(request, "update_order").await?;
        response.ack.check(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gateway() -> RemoteGateway {
        RemoteGateway::new(
            Url::parse("http://127.0.0.1:9/api/").unwrap(),
            SessionContext::new(),
        )
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let url = gateway().endpoint("orders/updateorder").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/api/orders/updateorder");
    }

    #[tokio::test]
    async fn test_signed_out_calls_fail_before_the_wire() {
        let gateway = gateway();
        assert!(matches!(
            gateway.fetch_cart().await,
            Err(GatewayError::NotAuthenticated)
        ));
        assert!(matches!(
            gateway.update_order(OrderId::new(1), OrderStage::Paid).await,
            Err(GatewayError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let session = SessionContext::with_token(SecretString::from("tok-very-secret"));
        let gateway = RemoteGateway::new(Url::parse("http://localhost/").unwrap(), session);
        let debug_output = format!("{gateway:?}");
        assert!(!debug_output.contains("tok-very-secret"));
        assert!(debug_output.contains("authenticated: true"));
    }

    #[test]
    fn test_transport_classification() {
        let parse = serde_json::from_str::<u8>("x").unwrap_err();
        assert!(GatewayError::Parse(parse).is_transport());
        assert!(!GatewayError::NotAuthenticated.is_transport());
        assert!(
            !GatewayError::Rejected {
                status: 400,
                message: "nope".into()
            }
            .is_transport()
        );
    }
}
