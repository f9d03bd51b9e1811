use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};
use serde_json::json as json_body;
use settlement_engine::{
    db_types::{Money, NewAccount, NewProduct},
    gateways::GatewayRegistry,
    CatalogManagement,
    SettlementDatabase,
    SqliteDatabase,
};

use super::helpers::{configure_apis, get_request, json, send_request, tear_down, test_db};
use crate::routes::{
    BalanceRoute,
    CancelOrderRoute,
    DeleteAccountRoute,
    IssueDepositRoute,
    PurchaseRoute,
    ReconcileBalanceRoute,
    UpsertAccountRoute,
};

fn configure(cfg: &mut ServiceConfig, db: &SqliteDatabase) {
    configure_apis(cfg, db, GatewayRegistry::new());
    cfg.service(PurchaseRoute::<SqliteDatabase>::new())
        .service(CancelOrderRoute::<SqliteDatabase>::new())
        .service(BalanceRoute::<SqliteDatabase>::new())
        .service(UpsertAccountRoute::<SqliteDatabase>::new())
        .service(DeleteAccountRoute::<SqliteDatabase>::new())
        .service(IssueDepositRoute::<SqliteDatabase>::new())
        .service(ReconcileBalanceRoute::<SqliteDatabase>::new());
}

/// A customer with 100.00 and a product priced at 40.00 with 3 units.
async fn seed(db: &SqliteDatabase) -> i64 {
    let account = db.upsert_account(NewAccount::new("carol")).await.unwrap();
    db.issue_deposit(account.id, Money::from(10_000), "Seed").await.unwrap();
    db.create_product(NewProduct::item("Lamp", Money::from(4_000), 3)).await.unwrap().id
}

fn purchase(product_id: i64, quantity: i64) -> TestRequest {
    TestRequest::post().uri("/orders/purchase").set_json(json_body!({
        "external_account_id": "carol",
        "product_id": product_id,
        "quantity": quantity,
    }))
}

#[actix_web::test]
async fn purchase_and_cancel() {
    let _ = env_logger::try_init().ok();
    let db = test_db().await;
    let product_id = seed(&db).await;

    let (status, body) = send_request(purchase(product_id, 2), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let receipt = json(&body);
    assert_eq!(receipt["new_balance"], 2_000);
    assert_eq!(receipt["debit"]["amount"], -8_000);
    assert_eq!(receipt["sale"]["quantity"], -2);
    let order_id = receipt["order"]["id"].as_i64().unwrap();

    let (status, body) = get_request("/accounts/carol/balance", |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["balance"], 2_000);

    let cancel = || TestRequest::post().uri(&format!("/orders/{order_id}/cancel"));
    let (status, body) = send_request(cancel(), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["order"]["status"], "cancelled");

    let (status, _) = send_request(cancel(), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get_request("/accounts/carol/balance", |cfg| configure(cfg, &db)).await;
    assert_eq!(json(&body)["balance"], 10_000);
    tear_down(db).await;
}

#[actix_web::test]
async fn rejected_purchases() {
    let _ = env_logger::try_init().ok();
    let db = test_db().await;
    let product_id = seed(&db).await;

    let (status, body) = send_request(purchase(product_id, 3), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, r#"{"error":"Insufficient balance"}"#);

    let (status, body) = send_request(purchase(product_id, 4), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, r#"{"error":"Lamp is out of stock"}"#);

    let (status, _) = send_request(purchase(product_id + 100, 1), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_request(purchase(product_id, 0), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_request(TestRequest::post().uri("/orders/4040/cancel"), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(db).await;
}

#[actix_web::test]
async fn account_lifecycle() {
    let _ = env_logger::try_init().ok();
    let db = test_db().await;
    let create = || TestRequest::post().uri("/accounts").set_json(json_body!({"external_id": "dan", "username": "dan"}));

    let (status, body) = send_request(create(), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["is_deleted"], false);

    let deposit = TestRequest::post().uri("/accounts/dan/deposits").set_json(json_body!({"amount": 500}));
    let (status, body) = send_request(deposit, |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["description"], "Manual deposit");

    let (status, body) = send_request(TestRequest::delete().uri("/accounts/dan"), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["is_deleted"], true);

    let deposit = TestRequest::post().uri("/accounts/dan/deposits").set_json(json_body!({"amount": 500}));
    let (status, _) = send_request(deposit, |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Returning customers are reactivated and keep their ledger
    let (_, body) = send_request(create(), |cfg| configure(cfg, &db)).await;
    assert_eq!(json(&body)["is_deleted"], false);
    let (_, body) = get_request("/accounts/dan/balance", |cfg| configure(cfg, &db)).await;
    assert_eq!(json(&body)["balance"], 500);
    tear_down(db).await;
}

#[actix_web::test]
async fn subscription_purchase_delivers_content() {
    let _ = env_logger::try_init().ok();
    let db = test_db().await;
    seed(&db).await;
    let vpn = NewProduct::subscription("VPN", Money::from(1_500)).with_period_days(30).with_fulfillment("vpn://key-123");
    let vpn = db.create_product(vpn).await.unwrap();

    let (status, body) = send_request(purchase(vpn.id, 1), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let receipt = json(&body);
    assert_eq!(receipt["fulfilled_content"], "vpn://key-123");
    assert_eq!(receipt["order"]["fulfilled_content"], "vpn://key-123");
    assert!(receipt["sale"].is_null());
    let subscription_id = receipt["subscription"]["id"].as_i64().unwrap();
    let first_expiry = receipt["subscription"]["expires_at"].as_str().unwrap().to_string();

    // A second purchase extends the same subscription
    let (status, body) = send_request(purchase(vpn.id, 1), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let receipt = json(&body);
    assert_eq!(receipt["subscription"]["id"], subscription_id);
    assert_ne!(receipt["subscription"]["expires_at"].as_str().unwrap(), first_expiry);
    assert_eq!(receipt["new_balance"], 7_000);
    tear_down(db).await;
}

#[actix_web::test]
async fn order_totals_that_overflow_are_rejected() {
    let _ = env_logger::try_init().ok();
    let db = test_db().await;
    seed(&db).await;
    let gold = db.create_product(NewProduct::item("Gold bar", Money::from(i64::MAX / 2), 10)).await.unwrap();

    let (status, body) = send_request(purchase(gold.id, 3), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body.contains("too large"), "{body}");
    let (_, body) = get_request("/accounts/carol/balance", |cfg| configure(cfg, &db)).await;
    assert_eq!(json(&body)["balance"], 10_000);
    tear_down(db).await;
}

#[actix_web::test]
async fn balance_cache_is_reconciled() {
    let _ = env_logger::try_init().ok();
    let db = test_db().await;
    seed(&db).await;
    sqlx::query("UPDATE accounts SET cached_balance = 12345 WHERE external_id = 'carol'")
        .execute(db.pool())
        .await
        .unwrap();
    let reconcile = || TestRequest::post().uri("/accounts/carol/balance/reconcile");

    let (status, body) = send_request(reconcile(), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json(&body);
    assert_eq!(result["ledger"], 10_000);
    assert_eq!(result["cached"], 12_345);

    let (_, body) = send_request(reconcile(), |cfg| configure(cfg, &db)).await;
    let result = json(&body);
    assert_eq!(result["ledger"], 10_000);
    assert_eq!(result["cached"], 10_000);

    let (status, _) =
        send_request(TestRequest::post().uri("/accounts/nobody/balance/reconcile"), |cfg| configure(cfg, &db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(db).await;
}
