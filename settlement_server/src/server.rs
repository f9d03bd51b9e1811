use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    gateways::{GatewayRegistry, MockProviderGateway},
    AccountApi,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    notifier::DepositNotifier,
    payment_worker::start_payment_worker,
    routes::{
        health,
        not_found,
        BalanceRoute,
        CancelOrderRoute,
        CreateInvoiceRoute,
        DeleteAccountRoute,
        GatewaysRoute,
        InvoiceMessageRoute,
        InvoiceRoute,
        IssueDepositRoute,
        ProductStockRoute,
        PurchaseRoute,
        ReconcileBalanceRoute,
        SubscriptionsRoute,
        UpsertAccountRoute,
        WebhookRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let registry = build_gateway_registry(&config)?;

    let mut hooks = EventHooks::default();
    if let Some(notifier_config) = config.notifier.clone() {
        DepositNotifier::new(notifier_config)?.attach(&mut hooks);
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    if config.polling_enabled {
        let api = PaymentApi::new(db.clone(), registry.clone(), producers.clone())
            .with_gateway_timeout(config.gateway_timeout);
        // The join handle is dropped. The worker lives as long as the runtime does.
        let _ = start_payment_worker(api, config.poll_interval);
    }

    let srv = create_server_instance(config, db, registry, producers)?;
    srv.await.map_err(|e| ServerError::InitializeError(e.to_string()))
}

/// Builds the gateway registry from the configuration. Gateways without configuration are simply not registered.
pub fn build_gateway_registry(config: &ServerConfig) -> Result<GatewayRegistry, ServerError> {
    let mut registry = GatewayRegistry::new();
    if let Some(mock_config) = config.mock_gateway.clone() {
        let gateway = MockProviderGateway::new(mock_config)
            .map_err(|e| ServerError::InitializeError(format!("Could not configure the mock provider. {e}")))?;
        registry.register(gateway);
    }
    if registry.is_empty() {
        warn!("🚀️ No payment gateways are configured. Customers will not be able to top up their balances.");
    }
    Ok(registry)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    registry: GatewayRegistry,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateway_timeout = config.gateway_timeout;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let accounts_api = AccountApi::new(db.clone());
        let payments_api =
            PaymentApi::new(db.clone(), registry.clone(), producers.clone()).with_gateway_timeout(gateway_timeout);
        let api_scope = web::scope("/api")
            .service(UpsertAccountRoute::<SqliteDatabase>::new())
            .service(DeleteAccountRoute::<SqliteDatabase>::new())
            .service(BalanceRoute::<SqliteDatabase>::new())
            .service(IssueDepositRoute::<SqliteDatabase>::new())
            .service(ReconcileBalanceRoute::<SqliteDatabase>::new())
            .service(SubscriptionsRoute::<SqliteDatabase>::new())
            .service(ProductStockRoute::<SqliteDatabase>::new())
            .service(PurchaseRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(GatewaysRoute::<SqliteDatabase>::new())
            .service(CreateInvoiceRoute::<SqliteDatabase>::new())
            .service(InvoiceRoute::<SqliteDatabase>::new())
            .service(InvoiceMessageRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sfs::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(payments_api))
            .service(health)
            .service(api_scope)
            .service(WebhookRoute::<SqliteDatabase>::new())
            .default_service(web::to(not_found))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
