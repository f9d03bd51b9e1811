use std::time::Duration;

use cucumber::{given, then, when};
use settlement_engine::{
    db_types::{BalanceEntryKind, InvoiceStatus},
    gateways::{GatewayPaymentStatus, WebhookNotification},
    events::EventProducers,
    payment_objects::WebhookOutcome,
    test_utils::scripted_gateway::{CreateBehaviour, ScriptedGateway, ScriptedWebhook},
    AccountManagement,
    PaymentApi,
    SettlementDatabase,
};

use crate::cucumber::{
    store_world::{error_name, money, TEST_GATEWAY},
    StoreWorld,
};

fn last_invoice_token(world: &StoreWorld) -> String {
    match &world.system().last_invoice {
        Some(Ok(invoice)) => invoice.order_token.clone(),
        other => panic!("No invoice was created: {other:?}"),
    }
}

async fn deliver(world: &mut StoreWorld, gateway: &str, notification: WebhookNotification) {
    let result = world.system().payments.handle_webhook(gateway, &notification).await;
    let system = world.system_mut();
    match result {
        Ok(outcome) => {
            system.last_error = None;
            system.last_outcome = Some(outcome);
        },
        Err(e) => {
            system.last_error = Some(e);
            system.last_outcome = None;
        },
    }
}

#[given(expr = "the payment gateway is {word}")]
async fn gateway_behaviour(world: &mut StoreWorld, behaviour: String) {
    let behaviour = match behaviour.as_str() {
        "down" => CreateBehaviour::Fail,
        "slow" => CreateBehaviour::Stall(Duration::from_millis(500)),
        _ => CreateBehaviour::Succeed,
    };
    world.system().gateway.set_behaviour(behaviour);
}

#[given(expr = "the gateway timeout is {int}ms")]
async fn gateway_timeout(world: &mut StoreWorld, ms: u64) {
    let system = world.system_mut();
    let registry = system.payments.gateways().clone();
    let payments = PaymentApi::new(system.api.db().clone(), registry, EventProducers::default());
    system.payments = payments.with_gateway_timeout(Duration::from_millis(ms));
}

#[when(expr = "{string} requests an invoice for {word} via {word}")]
async fn request_invoice(world: &mut StoreWorld, name: String, amount: String, gateway: String) {
    let account_id = world.customer(&name).id;
    let result = world.system().payments.create_invoice(account_id, &gateway, money(&amount)).await;
    let system = world.system_mut();
    match result {
        Ok(created) => system.last_invoice = Some(Ok(created.invoice)),
        Err(e) => system.last_invoice = Some(Err(e)),
    }
}

#[when(expr = "the gateway reports the invoice as paid {int} time(s)")]
async fn report_paid(world: &mut StoreWorld, times: usize) {
    let token = last_invoice_token(world);
    let invoice = world.db().fetch_invoice(&token).await.unwrap().expect("No invoice");
    let webhook = ScriptedWebhook::completed(&token, &ScriptedGateway::invoice_id_for(&token), invoice.amount);
    for _ in 0..times {
        deliver(world, TEST_GATEWAY, webhook.to_notification()).await;
    }
}

#[when("the gateway reports the invoice as paid concurrently 5 times")]
async fn report_paid_concurrently(world: &mut StoreWorld) {
    let token = last_invoice_token(world);
    let invoice = world.db().fetch_invoice(&token).await.unwrap().expect("No invoice");
    let webhook = ScriptedWebhook::completed(&token, &ScriptedGateway::invoice_id_for(&token), invoice.amount);
    let payments = &world.system().payments;
    let deliveries = (0..5).map(|_| {
        let notification = webhook.to_notification();
        async move { payments.handle_webhook(TEST_GATEWAY, &notification).await }
    });
    let results = futures_util::future::join_all(deliveries).await;
    let credited = results.iter().filter(|r| matches!(r, Ok(WebhookOutcome::Credited { .. }))).count();
    let repeats = results.iter().filter(|r| matches!(r, Ok(WebhookOutcome::AlreadySettled { .. }))).count();
    assert_eq!(credited, 1, "Results: {results:?}");
    assert_eq!(repeats, 4, "Results: {results:?}");
}

#[when(expr = "the gateway reports the invoice as {word}")]
async fn report_status(world: &mut StoreWorld, status: String) {
    let token = last_invoice_token(world);
    let mut webhook = ScriptedWebhook::completed(&token, &ScriptedGateway::invoice_id_for(&token), money("1.00"));
    webhook.status = match status.as_str() {
        "failed" => GatewayPaymentStatus::Failed,
        _ => GatewayPaymentStatus::Pending,
    };
    deliver(world, TEST_GATEWAY, webhook.to_notification()).await;
}

#[when(expr = "a webhook arrives for unknown order token {string}")]
async fn unknown_token(world: &mut StoreWorld, token: String) {
    let webhook = ScriptedWebhook::completed(&token, "ext-unknown", money("10.00"));
    deliver(world, TEST_GATEWAY, webhook.to_notification()).await;
}

#[when(expr = "a webhook arrives for gateway {string}")]
async fn unknown_gateway(world: &mut StoreWorld, gateway: String) {
    deliver(world, &gateway, WebhookNotification::new(b"{}".to_vec())).await;
}

#[when("a garbled webhook arrives")]
async fn garbled(world: &mut StoreWorld) {
    deliver(world, TEST_GATEWAY, WebhookNotification::new(b"<xml/>".to_vec())).await;
}

#[when("the invoice is marked as failed")]
async fn mark_failed(world: &mut StoreWorld) {
    let token = last_invoice_token(world);
    world.db().fail_invoice(&token).await.expect("Error failing invoice");
}

#[when(expr = "the gateway status for the invoice becomes {word}")]
async fn gateway_status(world: &mut StoreWorld, status: String) {
    let token = last_invoice_token(world);
    let status = match status.as_str() {
        "completed" => GatewayPaymentStatus::Completed,
        "failed" => GatewayPaymentStatus::Failed,
        _ => GatewayPaymentStatus::Pending,
    };
    world.system().gateway.set_status(&ScriptedGateway::invoice_id_for(&token), status);
}

#[when("pending invoices are polled")]
async fn poll(world: &mut StoreWorld) {
    let summary = world.system().payments.poll_pending_invoices().await.expect("Error polling invoices");
    world.system_mut().last_poll = Some(summary);
}

#[then("the invoice is created")]
async fn invoice_created(world: &mut StoreWorld) {
    let token = last_invoice_token(world);
    let invoice = world.db().fetch_invoice(&token).await.unwrap().expect("Invoice was not saved");
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.gateway, TEST_GATEWAY);
    assert_eq!(invoice.gateway_invoice_id, Some(ScriptedGateway::invoice_id_for(&token)));
}

#[then(expr = "the invoice request fails with {word}")]
async fn invoice_fails(world: &mut StoreWorld, expected: String) {
    match &world.system().last_invoice {
        Some(Err(e)) => assert_eq!(error_name(e), expected, "Unexpected error: {e}"),
        other => panic!("Expected the invoice request to fail with {expected}, but got {other:?}"),
    }
}

#[then(expr = "{string} has {int} failed invoice(s)")]
async fn failed_invoices(world: &mut StoreWorld, name: String, count: i64) {
    let account_id = world.customer(&name).id;
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_invoices WHERE account_id = $1 AND status = 'failed'")
        .bind(account_id)
        .fetch_one(world.db().pool())
        .await
        .expect("Error counting invoices");
    assert_eq!(n, count);
}

#[then(expr = "the invoice status is {word}")]
async fn invoice_status(world: &mut StoreWorld, status: String) {
    let token = last_invoice_token(world);
    let invoice = world.db().fetch_invoice(&token).await.unwrap().expect("No invoice");
    assert_eq!(invoice.status, status.parse::<InvoiceStatus>().expect("Unknown status"));
}

#[then(expr = "{string} has {int} gateway deposit(s)")]
async fn gateway_deposits(world: &mut StoreWorld, name: String, count: usize) {
    let account_id = world.customer(&name).id;
    let entries = world.db().fetch_balance_entries(account_id).await.expect("Error fetching entries");
    let deposits = entries
        .iter()
        .filter(|e| e.kind == BalanceEntryKind::Deposit && e.payment_gateway.as_deref() == Some(TEST_GATEWAY))
        .collect::<Vec<_>>();
    assert_eq!(deposits.len(), count);
    for deposit in deposits {
        assert!(deposit.description.starts_with("Balance top-up via Test Pay"), "{}", deposit.description);
    }
}

#[then(expr = "the webhook is {word}")]
async fn webhook_outcome(world: &mut StoreWorld, expected: String) {
    let system = world.system();
    let actual = match (&system.last_outcome, &system.last_error) {
        (Some(WebhookOutcome::Credited { .. }), _) => "credited".to_string(),
        (Some(WebhookOutcome::AlreadySettled { .. }), _) => "repeated".to_string(),
        (Some(WebhookOutcome::Ignored { .. }), _) => "ignored".to_string(),
        (None, Some(e)) => format!("{e:?}"),
        (None, None) => "missing".to_string(),
    };
    assert_eq!(actual, expected);
}

#[then(expr = "the webhook is rejected with {word}")]
async fn webhook_rejected(world: &mut StoreWorld, expected: String) {
    match &world.system().last_error {
        Some(e) => assert_eq!(error_name(e), expected, "Unexpected error: {e}"),
        None => panic!("Expected the webhook to be rejected with {expected}, but it was accepted"),
    }
}

#[then(expr = "polling settled {int}, failed {int} and left {int} pending")]
async fn poll_summary(world: &mut StoreWorld, settled: usize, failed: usize, pending: usize) {
    let summary = world.system().last_poll.expect("Invoices have not been polled");
    assert_eq!((summary.settled, summary.failed, summary.pending), (settled, failed, pending));
    assert_eq!(summary.errors, 0);
}
