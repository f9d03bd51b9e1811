//! Request handler definitions
//!
//! Define each route and its handler here. Handlers are thin: they decode the request, call into the engine APIs and
//! encode the result. Every rule about balances, stock and invoices lives in `settlement_engine`.
//!
//! Handlers must not block the worker thread. Every database or gateway call is awaited, so a worker keeps serving
//! other requests while one is in flight.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use log::*;
use settlement_engine::{
    db_types::NewAccount,
    gateways::WebhookNotification,
    traits::{AccountManagement, PurchaseRequest, SettlementDatabase, SettlementError},
    AccountApi,
    OrderFlowApi,
    PaymentApi,
};

use crate::{
    data_objects::{DepositParams, InvoiceParams, JsonResponse, MessageIdParams, UpsertAccountRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Accounts  ----------------------------------------------------
route!(upsert_account => Post "/accounts" impl SettlementDatabase);
/// Registers a customer, or reactivates a previously deleted one.
pub async fn upsert_account<B: SettlementDatabase>(
    body: web::Json<UpsertAccountRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UpsertAccountRequest { external_id, username } = body.into_inner();
    debug!("💻️ POST account for {external_id}");
    let mut account = NewAccount::new(external_id);
    if let Some(username) = username {
        account = account.with_username(username);
    }
    let account = api.upsert_account(account).await?;
    Ok(HttpResponse::Ok().json(account))
}

route!(delete_account => Delete "/accounts/{external_id}" impl SettlementDatabase);
pub async fn delete_account<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let external_id = path.into_inner();
    debug!("💻️ DELETE account {external_id}");
    let account = api.soft_delete_account(&external_id).await?;
    Ok(HttpResponse::Ok().json(account))
}

route!(balance => Get "/accounts/{external_id}/balance" impl AccountManagement);
/// The balance is always summed from the ledger, never read from the cached column.
pub async fn balance<B: AccountManagement>(
    path: web::Path<String>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let external_id = path.into_inner();
    debug!("💻️ GET balance for {external_id}");
    let balance = api.balance_for_external_id(&external_id).await.map_err(|e| {
        debug!("💻️ Could not fetch balance. {e}");
        ServerError::from(e)
    })?;
    match balance {
        Some(balance) => Ok(HttpResponse::Ok().json(balance)),
        None => Err(ServerError::NoRecordFound(format!("No account for {external_id}"))),
    }
}

route!(issue_deposit => Post "/accounts/{external_id}/deposits" impl SettlementDatabase);
/// Credits an account by hand. Nothing is charged at any payment gateway.
pub async fn issue_deposit<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<DepositParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let external_id = path.into_inner();
    let DepositParams { amount, description } = body.into_inner();
    debug!("💻️ POST deposit of {amount} for {external_id}");
    let account = api
        .db()
        .fetch_account_by_external_id(&external_id)
        .await?
        .filter(|a| !a.is_deleted)
        .ok_or_else(|| SettlementError::not_found("account", &external_id))?;
    let entry = api.issue_deposit(account.id, amount, description.as_deref().unwrap_or_default()).await?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(reconcile_balance => Post "/accounts/{external_id}/balance/reconcile" impl SettlementDatabase);
/// Recomputes the cached balance from the ledger and reports how far it had drifted.
pub async fn reconcile_balance<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let external_id = path.into_inner();
    debug!("💻️ POST balance reconciliation for {external_id}");
    let account = api
        .db()
        .fetch_account_by_external_id(&external_id)
        .await?
        .ok_or_else(|| SettlementError::not_found("account", &external_id))?;
    let result = api.reconcile_balance(account.id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(subscriptions => Get "/accounts/{external_id}/subscriptions" impl AccountManagement);
pub async fn subscriptions<B: AccountManagement>(
    path: web::Path<String>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let external_id = path.into_inner();
    debug!("💻️ GET subscriptions for {external_id}");
    let account = api
        .account_by_external_id(&external_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No account for {external_id}")))?;
    let subscriptions = api.subscriptions(account.id).await?;
    Ok(HttpResponse::Ok().json(subscriptions))
}

//----------------------------------------------   Products  ----------------------------------------------------
route!(product_stock => Get "/products/{id}/stock" impl AccountManagement);
pub async fn product_stock<B: AccountManagement>(
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ GET stock for product #{product_id}");
    match api.stock_for_product(product_id).await? {
        Some(stock) => Ok(HttpResponse::Ok().json(stock)),
        None => Err(ServerError::NoRecordFound(format!("No product with id {product_id}"))),
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(purchase => Post "/orders/purchase" impl SettlementDatabase);
/// Buys a product from the customer's prepaid balance.
///
/// The order, the balance debit, the stock sale and any referral credit are committed together or not at all.
pub async fn purchase<B: SettlementDatabase>(
    body: web::Json<PurchaseRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!(
        "💻️ POST purchase of {} x product #{} for {}",
        request.quantity, request.product_id, request.external_account_id
    );
    let receipt = api.purchase_from_balance(request).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl SettlementDatabase);
pub async fn cancel_order<B: SettlementDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST cancel order #{order_id}");
    let receipt = api.cancel_order(order_id).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(gateways => Get "/gateways" impl SettlementDatabase);
pub async fn gateways<B: SettlementDatabase>(api: web::Data<PaymentApi<B>>) -> impl Responder {
    trace!("💻️ GET gateways");
    HttpResponse::Ok().json(api.available_gateways())
}

route!(create_invoice => Post "/invoices" impl SettlementDatabase);
/// Opens a top-up invoice at the named gateway.
///
/// The response carries the local invoice and the URL the customer should be sent to.
pub async fn create_invoice<B: SettlementDatabase>(
    body: web::Json<InvoiceParams>,
    payments: web::Data<PaymentApi<B>>,
    accounts: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let InvoiceParams { external_account_id, gateway, amount } = body.into_inner();
    debug!("💻️ POST invoice for {amount} via {gateway} for {external_account_id}");
    let account = accounts
        .account_by_external_id(&external_account_id)
        .await?
        .ok_or_else(|| SettlementError::not_found("account", &external_account_id))?;
    let created = payments.create_invoice(account.id, &gateway, amount).await?;
    Ok(HttpResponse::Created().json(created))
}

route!(invoice => Get "/invoices/{order_token}" impl SettlementDatabase);
pub async fn invoice<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let token = path.into_inner();
    debug!("💻️ GET invoice {token}");
    match api.fetch_invoice(&token).await? {
        Some(invoice) => Ok(HttpResponse::Ok().json(invoice)),
        None => Err(ServerError::NoRecordFound(format!("No invoice with token {token}"))),
    }
}

route!(invoice_message => Put "/invoices/{order_token}/message" impl SettlementDatabase);
/// Attaches the id of the chat message that shows this invoice to the customer.
pub async fn invoice_message<B: SettlementDatabase>(
    path: web::Path<String>,
    body: web::Json<MessageIdParams>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let token = path.into_inner();
    let message_id = body.message_id;
    debug!("💻️ PUT message id {message_id} on invoice {token}");
    let invoice = api.set_invoice_message_id(&token, message_id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(webhook => Post "/webhooks/{gateway}" impl SettlementDatabase);
/// Receives payment notifications from a gateway.
///
/// The raw body is handed to the gateway adapter untouched so that it can verify signatures over the exact bytes that
/// were sent. Notifications that are not payment completions, and repeats of an already settled payment, are
/// acknowledged with a 200.
pub async fn webhook<B: SettlementDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    body: Bytes,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let gateway = path.into_inner();
    trace!("💻️ Received webhook from {gateway}");
    let notification = req
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(WebhookNotification::new(body.to_vec()), |n, (name, value)| n.with_header(name, value));
    let outcome = api.handle_webhook(&gateway, &notification).await.map_err(|e| {
        warn!("💻️ Webhook from {gateway} was not processed. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   Fallback  ----------------------------------------------------
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    debug!("💻️ No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(JsonResponse::failure(format!("No route for {}", req.path())))
}
