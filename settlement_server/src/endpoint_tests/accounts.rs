use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use settlement_engine::{
    db_types::{Account, Money, Product, ProductType, Stock, UserSubscription},
    AccountApi,
};

use super::{
    helpers::{get_request, json},
    mocks::MockAccountManager,
};
use crate::routes::{BalanceRoute, ProductStockRoute, SubscriptionsRoute};

fn configure(cfg: &mut ServiceConfig, account_manager: MockAccountManager) {
    let accounts_api = AccountApi::new(account_manager);
    cfg.service(BalanceRoute::<MockAccountManager>::new())
        .service(ProductStockRoute::<MockAccountManager>::new())
        .service(SubscriptionsRoute::<MockAccountManager>::new())
        .app_data(web::Data::new(accounts_api));
}

fn alice() -> Account {
    Account { id: 7, external_id: "alice".into(), cached_balance: Money::from(9_999), ..Default::default() }
}

fn product(id: i64, product_type: ProductType) -> Product {
    Product {
        id,
        name: "Premium".into(),
        price: Money::from(3_000),
        category: None,
        product_type,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        fulfillment_content: None,
        subscription_period_days: 30,
    }
}

#[actix_web::test]
async fn balance_for_unknown_account() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_account_by_external_id().returning(|_| Ok(None));
    let (status, body) = get_request("/accounts/nobody/balance", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. No account for nobody"}"#);
}

#[actix_web::test]
async fn balance_is_read_from_the_ledger() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_account_by_external_id().times(1).returning(|_| Ok(Some(alice())));
    mock.expect_fetch_balance().withf(|id| *id == 7).returning(|_| Ok(Money::from(12_550)));
    let (status, body) = get_request("/accounts/alice/balance", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["account_id"], 7);
    assert_eq!(body["external_id"], "alice");
    // The ledger sum, not the cached value
    assert_eq!(body["balance"], 12_550);
}

#[actix_web::test]
async fn subscriptions_have_unbounded_stock() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_product().returning(|id| Ok(Some(product(id, ProductType::Subscription))));
    mock.expect_fetch_stock().returning(|_| Ok(Some(Stock::Unbounded)));
    let (status, body) = get_request("/products/3/stock", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["product_id"], 3);
    assert_eq!(body["stock"], "unbounded");
}

#[actix_web::test]
async fn item_stock_is_a_number() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_product().returning(|id| Ok(Some(product(id, ProductType::Item))));
    mock.expect_fetch_stock().returning(|_| Ok(Some(Stock::Finite(4))));
    let (status, body) = get_request("/products/5/stock", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["stock"], 4);
}

#[actix_web::test]
async fn stock_for_unknown_product() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_product().returning(|_| Ok(None));
    let (status, _) = get_request("/products/99/stock", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn subscriptions_for_account() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_account_by_external_id().times(1).returning(|_| Ok(Some(alice())));
    mock.expect_fetch_subscriptions().withf(|id| *id == 7).returning(|_| {
        let now = Utc::now();
        Ok(vec![UserSubscription {
            id: 1,
            account_id: 7,
            product_id: 3,
            order_id: 11,
            started_at: now,
            expires_at: now + chrono::Duration::days(30),
            is_active: true,
            created_at: now,
            updated_at: now,
        }])
    });
    let (status, body) = get_request("/accounts/alice/subscriptions", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));
    assert_eq!(body[0]["product_id"], 3);
    assert_eq!(body[0]["order_id"], 11);
    assert_eq!(body[0]["is_active"], true);
}

#[actix_web::test]
async fn subscriptions_for_unknown_account() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockAccountManager::new();
    mock.expect_fetch_account_by_external_id().returning(|_| Ok(None));
    mock.expect_fetch_subscriptions().never();
    let (status, _) = get_request("/accounts/nobody/subscriptions", |cfg| configure(cfg, mock)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
