//! Integration tests for Pocket Shop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pocket-shop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - optimistic cart pushes and pulls over HTTP
//! - `order_lifecycle` - fetch, place and transition orders
//! - `order_details` - catalog expansion of order lines
//! - `gateway` - wire formats, auth and error mapping
//!
//! Every test starts its own [`FakeBackend`]: an axum server on an ephemeral
//! port that speaks the backend's JSON dialect (text-encoded order items,
//! integer flags, `{status, message}` envelopes) and also serves the catalog.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use pocket_shop_client::{AppState, ClientConfig};

/// Token the fake backend accepts and issues.
pub const TEST_TOKEN: &str = "tok-7Hq2xLm9Pz4vKc8R";

/// An order row as the fake backend stores it.
#[derive(Debug, Clone, Serialize)]
pub struct StoredOrder {
    pub id: i64,
    pub order_items: String,
    pub total_price: i64,
    pub item_numbers: u32,
    pub is_paid: u8,
    pub is_delivered: u8,
}

#[derive(Default)]
struct Counters {
    cart_gets: AtomicUsize,
    cart_puts: AtomicUsize,
    order_updates: AtomicUsize,
    product_gets: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    reject_cart_push: AtomicBool,
    fail_order_updates: AtomicBool,
    rate_limit_orders: AtomicBool,
}

struct BackendState {
    cart: Mutex<Vec<Value>>,
    cart_history: Mutex<Vec<Vec<Value>>>,
    orders: Mutex<Vec<StoredOrder>>,
    products: HashMap<i64, Value>,
    users: Mutex<Vec<String>>,
    next_id: AtomicI64,
    counters: Counters,
    faults: Faults,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running fake backend.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Start a backend on `127.0.0.1` with a small catalog (products 1 to 5).
    ///
    /// Odd ids are in category `things`, even ids in `gadgets`.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let products = (1..=5)
            .map(|id| {
                let category = if id % 2 == 0 { "gadgets" } else { "things" };
                (
                    id,
                    json!({
                        "id": id,
                        "title": format!("Product {id}"),
                        "price": 10.5 * f64::from(i32::try_from(id).unwrap_or(1)),
                        "description": "A thing",
                        "category": category,
                        "image": format!("https://img.test/{id}.png"),
                        "rating": {"rate": 4.1, "count": 10}
                    }),
                )
            })
            .collect();

        let state = Arc::new(BackendState {
            cart: Mutex::new(Vec::new()),
            cart_history: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
            products,
            users: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            counters: Counters::default(),
            faults: Faults::default(),
        });

        let app = Router::new()
            .route("/cart", get(get_cart).put(put_cart))
            .route("/orders/all", get(list_orders))
            .route("/orders/neworder", post(new_order))
            .route("/orders/updateorder", post(update_order))
            .route("/products", get(list_products))
            .route("/products/{id}", get(get_product))
            .route("/users/signup", post(sign_up))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// Base URL of the backend.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Configuration pointing the backend and the catalog at this server.
    ///
    /// # Panics
    ///
    /// Panics if the base URL does not parse.
    #[must_use]
    pub fn config(&self, signed_in: bool) -> ClientConfig {
        let mut config = ClientConfig::for_base_url(&self.base_url()).expect("valid base url");
        if signed_in {
            config.token = Some(SecretString::from(TEST_TOKEN));
        }
        config
    }

    /// Application state wired to this backend.
    #[must_use]
    pub fn app(&self, signed_in: bool) -> AppState {
        AppState::new(self.config(signed_in))
    }

    /// Store an order. `items` are `(product id, price, quantity)`.
    pub fn seed_order(&self, items: &[(i64, f64, u32)], is_paid: bool, is_delivered: bool) -> i64 {
        let lines: Vec<Value> = items
            .iter()
            .map(|(id, price, qty)| json!({"prodID": id, "price": price, "quantity": qty}))
            .collect();
        self.state.store_order(&lines, is_paid, is_delivered)
    }

    /// Replace the server-side cart.
    pub fn seed_cart(&self, lines: Value) {
        if let Value::Array(lines) = lines {
            *lock(&self.state.cart) = lines;
        }
    }

    /// The server-side cart.
    #[must_use]
    pub fn server_cart(&self) -> Vec<Value> {
        lock(&self.state.cart).clone()
    }

    /// Every cart body received via `PUT /cart`, in arrival order.
    #[must_use]
    pub fn cart_history(&self) -> Vec<Vec<Value>> {
        lock(&self.state.cart_history).clone()
    }

    /// Stored order rows.
    #[must_use]
    pub fn orders(&self) -> Vec<StoredOrder> {
        lock(&self.state.orders).clone()
    }

    #[must_use]
    pub fn cart_gets(&self) -> usize {
        self.state.counters.cart_gets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cart_puts(&self) -> usize {
        self.state.counters.cart_puts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn order_updates(&self) -> usize {
        self.state.counters.order_updates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn product_gets(&self) -> usize {
        self.state.counters.product_gets.load(Ordering::SeqCst)
    }

    /// Answer cart pushes with `{"status": "FAILED"}`.
    pub fn reject_cart_push(&self, on: bool) {
        self.state.faults.reject_cart_push.store(on, Ordering::SeqCst);
    }

    /// Answer order updates with HTTP 500.
    pub fn fail_order_updates(&self, on: bool) {
        self.state
            .faults
            .fail_order_updates
            .store(on, Ordering::SeqCst);
    }

    /// Answer order listing with HTTP 429.
    pub fn rate_limit_orders(&self, on: bool) {
        self.state
            .faults
            .rate_limit_orders
            .store(on, Ordering::SeqCst);
    }
}

impl BackendState {
    fn store_order(&self, lines: &[Value], is_paid: bool, is_delivered: bool) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut total_cents = 0_i64;
        let mut item_numbers = 0_u32;
        for line in lines {
            let price = line["price"].as_f64().unwrap_or_default();
            let quantity = u32::try_from(line["quantity"].as_u64().unwrap_or_default())
                .unwrap_or_default();
            #[allow(clippy::cast_possible_truncation)] // test amounts are small
            let cents = (price * 100.0).round() as i64;
            total_cents += cents * i64::from(quantity);
            item_numbers += quantity;
        }

        lock(&self.orders).push(StoredOrder {
            id,
            order_items: Value::Array(lines.to_vec()).to_string(),
            total_price: total_cents,
            item_numbers,
            is_paid: u8::from(is_paid),
            is_delivered: u8::from(is_delivered),
        });
        id
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": "ERR", "message": "Invalid token"})),
    )
        .into_response()
}

async fn get_cart(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.counters.cart_gets.fetch_add(1, Ordering::SeqCst);
    let items = lock(&state.cart).clone();
    Json(json!({"status": "OK", "items": items})).into_response()
}

#[derive(Deserialize)]
struct CartBody {
    items: Vec<Value>,
}

async fn put_cart(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<CartBody>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.counters.cart_puts.fetch_add(1, Ordering::SeqCst);
    if state.faults.reject_cart_push.load(Ordering::SeqCst) {
        return Json(json!({"status": "FAILED", "message": "cart store unavailable"}))
            .into_response();
    }
    lock(&state.cart_history).push(body.items.clone());
    *lock(&state.cart) = body.items;
    Json(json!({"status": "OK"})).into_response()
}

async fn list_orders(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if state.faults.rate_limit_orders.load(Ordering::SeqCst) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "7")],
            "slow down",
        )
            .into_response();
    }
    // No `status` field here; clients must treat that as success.
    let orders = lock(&state.orders).clone();
    Json(json!({ "orders": orders })).into_response()
}

#[derive(Deserialize)]
struct NewOrderBody {
    items: Vec<Value>,
}

async fn new_order(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<NewOrderBody>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = state.store_order(&body.items, false, false);
    Json(json!({"status": "OK", "orderID": id})).into_response()
}

#[derive(Deserialize)]
struct UpdateBody {
    #[serde(rename = "orderID")]
    order_id: i64,
    #[serde(rename = "isPaid")]
    is_paid: u8,
    #[serde(rename = "isDelivered")]
    is_delivered: u8,
}

async fn update_order(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.counters.order_updates.fetch_add(1, Ordering::SeqCst);
    if state.faults.fail_order_updates.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let mut orders = lock(&state.orders);
    let Some(order) = orders.iter_mut().find(|o| o.id == body.order_id) else {
        return Json(json!({"status": "FAILED", "message": "Order not found"})).into_response();
    };
    order.is_paid = body.is_paid;
    order.is_delivered = body.is_delivered;
    Json(json!({"status": "OK", "message": "Order updated"})).into_response()
}

async fn list_products(State(state): State<Arc<BackendState>>) -> Response {
    let mut products: Vec<&Value> = state.products.values().collect();
    products.sort_by_key(|p| p["id"].as_i64());
    Json(json!(products)).into_response()
}

async fn get_product(State(state): State<Arc<BackendState>>, Path(id): Path<i64>) -> Response {
    state.counters.product_gets.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    match state.products.get(&id) {
        Some(product) => Json(product.clone()).into_response(),
        // Unknown ids come back as an empty 200, like the public catalog.
        None => (StatusCode::OK, "").into_response(),
    }
}

#[derive(Deserialize)]
struct SignUpBody {
    name: String,
    email: String,
    password: String,
}

async fn sign_up(State(state): State<Arc<BackendState>>, Json(body): Json<SignUpBody>) -> Response {
    if body.password.len() < 8 {
        return Json(json!({"status": "FAILED", "message": "Password too short"})).into_response();
    }
    let mut users = lock(&state.users);
    if users.contains(&body.email) {
        return Json(json!({"status": "FAILED", "message": "User already exists"}))
            .into_response();
    }
    users.push(body.email.clone());
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);

    Json(json!({
        "status": "OK",
        "token": TEST_TOKEN,
        "id": id,
        "name": body.name,
        "email": body.email,
    }))
    .into_response()
}
