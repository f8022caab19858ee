//! Wire types for the backend's JSON bodies, and their conversion to core types.
//!
//! The backend stores order lines as serialized JSON text and flags as
//! integers; everything here exists to absorb those quirks so the rest of the
//! crate works with [`Order`] and [`CartLine`] only.

use serde::{Deserialize, Deserializer, Serialize};

use pocket_shop_core::{CartLine, Money, Order, OrderId, OrderLine, UserId};

use super::GatewayError;

/// The `{status, message}` pair most responses carry.
#[derive(Debug, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Ack {
    /// Fail unless the body reports success.
    ///
    /// A missing `status` on a 2xx response counts as success.
    pub fn check(self, http_status: u16) -> Result<(), GatewayError> {
        match self.status {
            Some(status) if !status.eq_ignore_ascii_case("ok") => Err(GatewayError::Rejected {
                status: http_status,
                message: self.message.unwrap_or(status),
            }),
            _ => Ok(()),
        }
    }
}

/// Best-effort message from an error body.
pub fn rejection_message(body: &str) -> Option<String> {
    let ack: Ack = serde_json::from_str(body).ok()?;
    ack.message.or(ack.status)
}

// =============================================================================
// Cart
// =============================================================================

/// `GET /cart` response.
#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub ack: Ack,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

/// `PUT /cart` body.
#[derive(Debug, Serialize)]
pub struct CartPush<'a> {
    pub items: &'a [CartLine],
}

/// Response carrying only `{status, message}`.
#[derive(Debug, Deserialize)]
pub struct AckResponse {
    #[serde(flatten)]
    pub ack: Ack,
}

// =============================================================================
// Orders
// =============================================================================

/// `GET /orders/all` response.
#[derive(Debug, Deserialize)]
pub struct OrdersResponse {
    #[serde(flatten)]
    pub ack: Ack,
    #[serde(default)]
    pub orders: Vec<OrderRow>,
}

/// An order row as the backend stores it.
#[derive(Debug, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    #[serde(default)]
    pub order_items: OrderItems,
    pub total_price: i64,
    #[serde(default)]
    pub item_numbers: Option<u32>,
    #[serde(deserialize_with = "flag")]
    pub is_paid: bool,
    #[serde(deserialize_with = "flag")]
    pub is_delivered: bool,
}

/// Order lines as JSON text (what the backend stores) or an inline array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrderItems {
    Inline(Vec<OrderLine>),
    Text(String),
}

impl Default for OrderItems {
    fn default() -> Self {
        Self::Inline(Vec::new())
    }
}

impl OrderItems {
    fn into_lines(self) -> Result<Vec<OrderLine>, serde_json::Error> {
        match self {
            Self::Inline(lines) => Ok(lines),
            Self::Text(text) if text.trim().is_empty() => Ok(Vec::new()),
            Self::Text(text) => serde_json::from_str(&text),
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = serde_json::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let lines = row.order_items.into_lines()?;
        let item_count = row
            .item_numbers
            .unwrap_or_else(|| {
                lines
                    .iter()
                    .fold(0, |total, l| total.saturating_add(l.quantity))
            });

        Ok(Self {
            id: row.id,
            lines,
            total_price: Money::from_minor_units(row.total_price),
            item_count,
            is_paid: row.is_paid,
            is_delivered: row.is_delivered,
        })
    }
}

/// Accept `0`/`1` as well as `false`/`true`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// `POST /orders/neworder` body.
#[derive(Debug, Serialize)]
pub struct NewOrder<'a> {
    pub items: &'a [OrderLine],
}

/// `POST /orders/neworder` response.
#[derive(Debug, Deserialize)]
pub struct NewOrderResponse {
    #[serde(flatten)]
    pub ack: Ack,
    #[serde(default, alias = "orderID", alias = "id")]
    pub order_id: Option<OrderId>,
}

/// `POST /orders/updateorder` body. Flags go out as integers.
#[derive(Debug, Serialize)]
pub struct OrderUpdate {
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
    #[serde(rename = "isPaid")]
    pub is_paid: u8,
    #[serde(rename = "isDelivered")]
    pub is_delivered: u8,
}

impl OrderUpdate {
    pub fn new(order_id: OrderId, (is_paid, is_delivered): (bool, bool)) -> Self {
        Self {
            order_id,
            is_paid: u8::from(is_paid),
            is_delivered: u8::from(is_delivered),
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// `POST /users/signup` body.
#[derive(Serialize)]
pub struct SignUp<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /users/signup` response.
#[derive(Deserialize)]
pub struct SignUpResponse {
    #[serde(flatten)]
    pub ack: Ack,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
