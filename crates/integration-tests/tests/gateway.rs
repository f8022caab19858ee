//! Integration tests for the gateway, session and catalog over HTTP.

#![allow(clippy::unwrap_used)]

use pocket_shop_client::{
    CartRemote, CatalogError, CatalogLookup, ClientConfig, ClientError, GatewayError, OrderRemote,
    RemoteGateway, SessionContext,
};
use pocket_shop_core::{Email, OrderStage, ProductId};
use pocket_shop_integration_tests::{FakeBackend, TEST_TOKEN};
use secrecy::{ExposeSecret, SecretString};

// =============================================================================
// Sign-up and session
// =============================================================================

#[tokio::test]
async fn test_sign_up_signs_session_in() {
    let backend = FakeBackend::start().await;
    let app = backend.app(false);
    let email = Email::parse("ada@example.com").unwrap();

    let profile = app
        .sign_up("Ada", &email, &SecretString::from("correct-horse"))
        .await
        .unwrap();

    assert_eq!(profile.name, "Ada");
    assert_eq!(profile.email, email);
    assert!(app.session().is_authenticated());
    assert_eq!(
        app.session().bearer_token().unwrap().expose_secret(),
        TEST_TOKEN
    );
    // Sign-up loads the user's cart
    assert_eq!(backend.cart_gets(), 1);
}

#[tokio::test]
async fn test_duplicate_sign_up_passes_server_message_through() {
    let backend = FakeBackend::start().await;
    let app = backend.app(false);
    let email = Email::parse("ada@example.com").unwrap();
    let password = SecretString::from("correct-horse");

    app.sign_up("Ada", &email, &password).await.unwrap();
    app.sign_out();

    let err = app.sign_up("Ada", &email, &password).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Gateway(GatewayError::Rejected { .. })
    ));
    assert_eq!(err.user_message(), "User already exists");
    assert!(!app.session().is_authenticated());
}

#[tokio::test]
async fn test_wrong_token_is_rejected_with_status() {
    let backend = FakeBackend::start().await;
    let config = ClientConfig::for_base_url(&backend.base_url()).unwrap();
    let session = SessionContext::with_token(SecretString::from("not-the-right-token"));
    let gateway = RemoteGateway::new(config.api_url, session);

    match gateway.fetch_cart().await {
        Err(GatewayError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid token");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

// =============================================================================
// Wire formats
// =============================================================================

#[tokio::test]
async fn test_list_orders_decodes_backend_rows() {
    let backend = FakeBackend::start().await;
    backend.seed_order(&[(1, 10.5, 2), (4, 42.0, 1)], true, false);
    let gateway = backend.app(true).gateway().clone();

    let orders = gateway.list_orders().await.unwrap();

    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.item_count, 3);
    assert_eq!(order.total_price.minor_units(), 6300);
    assert_eq!(order.stage(), OrderStage::Paid);
    assert_eq!(
        order.distinct_products(),
        vec![ProductId::new(1), ProductId::new(4)]
    );
}

#[tokio::test]
async fn test_update_sends_integer_flags() {
    let backend = FakeBackend::start().await;
    let id = backend.seed_order(&[(1, 10.5, 1)], false, false);
    let gateway = backend.app(true).gateway().clone();

    gateway
        .update_order(pocket_shop_core::OrderId::new(id), OrderStage::Delivered)
        .await
        .unwrap();

    let row = &backend.orders()[0];
    assert_eq!((row.is_paid, row.is_delivered), (1, 1));
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_lookup_and_cache() {
    let backend = FakeBackend::start().await;
    let app = backend.app(false);

    let product = app.catalog().get_product(ProductId::new(3)).await.unwrap();
    assert_eq!(product.title, "Product 3");
    app.catalog().get_product(ProductId::new(3)).await.unwrap();
    assert_eq!(backend.product_gets(), 1);

    let all = app.catalog().list_products().await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn test_catalog_categories() {
    let backend = FakeBackend::start().await;
    let app = backend.app(false);

    let categories = app.catalog().categories().await.unwrap();
    assert_eq!(categories, ["things", "gadgets"]);

    let gadgets = app.catalog().products_in_category("gadgets").await.unwrap();
    let ids: Vec<_> = gadgets.iter().map(|p| p.id).collect();
    assert_eq!(ids, [ProductId::new(2), ProductId::new(4)]);

    assert!(
        app.catalog()
            .products_in_category("nothing")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_catalog_empty_body_is_not_found() {
    let backend = FakeBackend::start().await;
    let app = backend.app(false);

    let err = app
        .catalog()
        .get_product(ProductId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(id) if id == ProductId::new(404)));
}
