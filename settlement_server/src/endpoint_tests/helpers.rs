use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web::{self, ServiceConfig},
    App,
};
use log::*;
use settlement_engine::{
    events::EventProducers,
    gateways::GatewayRegistry,
    test_utils::prepare_env::fresh_database,
    AccountApi,
    OrderFlowApi,
    PaymentApi,
    SettlementDatabase,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

/// Sends `req` to an app configured by `configure` and returns the status and body.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub async fn get_request<F>(path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::get().uri(path), configure).await
}

pub async fn test_db() -> SqliteDatabase {
    fresh_database(4).await
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("Failed to close database: {e}");
    }
    let _ = Sqlite::drop_database(&url).await;
}

/// Registers all the API objects against a real database.
pub fn configure_apis(cfg: &mut ServiceConfig, db: &SqliteDatabase, registry: GatewayRegistry) {
    let producers = EventProducers::default();
    cfg.app_data(web::Data::new(OrderFlowApi::new(db.clone(), producers.clone())))
        .app_data(web::Data::new(AccountApi::new(db.clone())))
        .app_data(web::Data::new(PaymentApi::new(db.clone(), registry, producers)));
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("Response was not JSON")
}
