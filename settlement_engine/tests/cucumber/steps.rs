use chrono::{Duration, Utc};
use cucumber::{then, when};
use settlement_engine::{
    db_types::{BalanceEntryKind, OrderStatusType, Stock, StockMovementKind},
    traits::PurchaseRequest,
    AccountManagement,
    CatalogManagement,
};

use crate::cucumber::{
    store_world::{error_name, money},
    StoreWorld,
};

#[when(expr = "{string} buys {int} {string}")]
async fn buys(world: &mut StoreWorld, name: String, quantity: i64, product: String) {
    let request = PurchaseRequest::new(world.customer(&name).external_id.clone(), world.product(&product).id, quantity);
    let result = world.api().purchase_from_balance(request).await;
    world.system_mut().last_purchase = Some(result);
}

#[when(expr = "{string} buys {int} {string} through the bot {string}")]
async fn buys_via_referral(world: &mut StoreWorld, name: String, quantity: i64, product: String, token: String) {
    let request = PurchaseRequest::new(world.customer(&name).external_id.clone(), world.product(&product).id, quantity)
        .via_referral(token);
    let result = world.api().purchase_from_balance(request).await;
    world.system_mut().last_purchase = Some(result);
}

#[when(expr = "{string} buys {int} of product #{int}")]
async fn buys_by_id(world: &mut StoreWorld, name: String, quantity: i64, product_id: i64) {
    let request = PurchaseRequest::new(world.customer(&name).external_id.clone(), product_id, quantity);
    let result = world.api().purchase_from_balance(request).await;
    world.system_mut().last_purchase = Some(result);
}

#[when(expr = "{string} is restocked with {int} units")]
async fn restocked(world: &mut StoreWorld, product: String, quantity: i64) {
    let id = world.product(&product).id;
    world.db().restock_product(id, quantity).await.expect("Error restocking product");
}

#[when("the last order is cancelled")]
async fn cancel_last(world: &mut StoreWorld) {
    let id = world.last_order_id();
    let result = world.api().cancel_order(id).await;
    world.system_mut().last_cancellation = Some(result);
}

#[when(expr = "order #{int} is cancelled")]
async fn cancel_by_id(world: &mut StoreWorld, id: i64) {
    let result = world.api().cancel_order(id).await;
    world.system_mut().last_cancellation = Some(result);
}

#[then("the purchase succeeds")]
async fn purchase_succeeds(world: &mut StoreWorld) {
    match &world.system().last_purchase {
        Some(Ok(_)) => {},
        other => panic!("Expected the purchase to succeed, but got {other:?}"),
    }
}

#[then(expr = "the purchase fails with {word}")]
async fn purchase_fails(world: &mut StoreWorld, expected: String) {
    match &world.system().last_purchase {
        Some(Err(e)) => assert_eq!(error_name(e), expected, "Unexpected error: {e}"),
        other => panic!("Expected the purchase to fail with {expected}, but got {other:?}"),
    }
}

#[then(expr = "the purchase fails with OutOfStock for {string}")]
async fn purchase_out_of_stock(world: &mut StoreWorld, product: String) {
    match &world.system().last_purchase {
        Some(Err(e)) => assert_eq!(e.to_string(), format!("{product} is out of stock")),
        other => panic!("Expected the purchase to fail, but got {other:?}"),
    }
}

#[then(expr = "the new balance is {word}")]
async fn new_balance(world: &mut StoreWorld, amount: String) {
    match &world.system().last_purchase {
        Some(Ok(receipt)) => assert_eq!(receipt.new_balance, money(&amount)),
        other => panic!("The last purchase did not succeed: {other:?}"),
    }
}

#[then(expr = "{string} has a balance of {word}")]
async fn has_balance(world: &mut StoreWorld, name: String, amount: String) {
    let account_id = world.customer(&name).id;
    let balance = world.system().accounts.balance(account_id).await.expect("Error fetching balance");
    assert_eq!(balance, money(&amount));
    let account = world.db().fetch_account(account_id).await.expect("Error fetching account").expect("No account");
    assert_eq!(account.cached_balance, balance, "The cached balance has drifted from the ledger");
}

#[then(expr = "{string} has {int} order(s)")]
async fn has_orders(world: &mut StoreWorld, name: String, count: usize) {
    let account_id = world.customer(&name).id;
    let orders = world.db().fetch_orders_for_account(account_id).await.expect("Error fetching orders");
    assert_eq!(orders.len(), count);
}

#[then(expr = "the last order has a purchase entry of {word}")]
async fn purchase_entry(world: &mut StoreWorld, amount: String) {
    let order = world.last_order_id();
    let account_id = world.db().fetch_order(order).await.unwrap().expect("No order").account_id;
    let entries = world.db().fetch_balance_entries(account_id).await.expect("Error fetching entries");
    let purchases = entries
        .iter()
        .filter(|e| e.order_id == Some(order) && e.kind == BalanceEntryKind::Purchase)
        .collect::<Vec<_>>();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].amount, money(&amount));
}

#[then(expr = "{string} has a stock level of {int}")]
async fn stock_level(world: &mut StoreWorld, product: String, level: i64) {
    let id = world.product(&product).id;
    let stock = world.db().fetch_stock(id).await.expect("Error fetching stock");
    assert_eq!(stock, Some(Stock::Finite(level)));
}

#[then(expr = "{string} has unbounded stock")]
async fn unbounded_stock(world: &mut StoreWorld, product: String) {
    let id = world.product(&product).id;
    let stock = world.system().accounts.stock_for_product(id).await.expect("Error fetching stock").expect("No product");
    assert_eq!(stock.stock, Stock::Unbounded);
}

#[then(expr = "the last order has a {word} movement of {int}")]
async fn order_movement(world: &mut StoreWorld, kind: String, quantity: i64) {
    let order = world.last_order_id();
    let product_id = world.db().fetch_order(order).await.unwrap().expect("No order").product_id;
    let movements = world.db().fetch_stock_movements(product_id).await.expect("Error fetching movements");
    let kind = kind.parse::<StockMovementKind>().expect("Unknown movement kind");
    let matching = movements.iter().filter(|m| m.order_id == Some(order) && m.kind == kind).collect::<Vec<_>>();
    assert_eq!(matching.len(), 1, "Expected exactly one {kind} movement");
    assert_eq!(matching[0].quantity, quantity);
}

#[then("the last order has no stock movements")]
async fn no_movements(world: &mut StoreWorld) {
    let order = world.last_order_id();
    let product_id = world.db().fetch_order(order).await.unwrap().expect("No order").product_id;
    let movements = world.db().fetch_stock_movements(product_id).await.expect("Error fetching movements");
    assert!(movements.iter().all(|m| m.order_id != Some(order)));
}

#[then(expr = "the last order has status {word}")]
async fn order_status(world: &mut StoreWorld, status: String) {
    let order = world.last_order_id();
    let order = world.db().fetch_order(order).await.unwrap().expect("No order");
    let expected = status.parse::<OrderStatusType>().expect("Unknown status");
    assert_eq!(order.status, expected);
}

#[then("the cancellation succeeds")]
async fn cancellation_succeeds(world: &mut StoreWorld) {
    match &world.system().last_cancellation {
        Some(Ok(_)) => {},
        other => panic!("Expected the cancellation to succeed, but got {other:?}"),
    }
}

#[then(expr = "the cancellation fails with {word}")]
async fn cancellation_fails(world: &mut StoreWorld, expected: String) {
    match &world.system().last_cancellation {
        Some(Err(e)) => assert_eq!(error_name(e), expected, "Unexpected error: {e}"),
        other => panic!("Expected the cancellation to fail with {expected}, but got {other:?}"),
    }
}

#[then(expr = "{string} has {int} balance entries")]
async fn entry_count(world: &mut StoreWorld, name: String, count: usize) {
    let account_id = world.customer(&name).id;
    let entries = world.db().fetch_balance_entries(account_id).await.expect("Error fetching entries");
    assert_eq!(entries.len(), count);
}

#[then(expr = "the last order earned {string} a commission of {word}")]
async fn commission_earned(world: &mut StoreWorld, owner: String, share: String) {
    let order = world.last_order_id();
    let credit = world
        .db()
        .fetch_referral_credit_for_order(order)
        .await
        .expect("Error fetching referral credit")
        .expect("No referral credit was recorded");
    assert_eq!(credit.referral_owner_id, world.customer(&owner).id);
    assert_eq!(credit.share, money(&share));
    assert_eq!(credit.amount, world.db().fetch_order(order).await.unwrap().expect("No order").amount);
}

#[then("the last order earned no commission")]
async fn no_commission(world: &mut StoreWorld) {
    let order = world.last_order_id();
    let credit = world.db().fetch_referral_credit_for_order(order).await.expect("Error fetching referral credit");
    assert!(credit.is_none(), "Unexpected referral credit: {credit:?}");
}

#[then(expr = "the purchase delivers {string}")]
async fn purchase_delivers(world: &mut StoreWorld, content: String) {
    match &world.system().last_purchase {
        Some(Ok(receipt)) => {
            assert_eq!(receipt.fulfilled_content.as_deref(), Some(content.as_str()));
            assert_eq!(receipt.order.fulfilled_content.as_deref(), Some(content.as_str()));
        },
        other => panic!("Expected a successful purchase, but got {other:?}"),
    }
}

#[then("the purchase delivers nothing")]
async fn purchase_delivers_nothing(world: &mut StoreWorld) {
    match &world.system().last_purchase {
        Some(Ok(receipt)) => assert!(receipt.fulfilled_content.is_none()),
        other => panic!("Expected a successful purchase, but got {other:?}"),
    }
}

#[then(expr = "{string} has a subscription to {string} expiring in {int} days")]
async fn has_subscription(world: &mut StoreWorld, name: String, product: String, days: i64) {
    let account_id = world.customer(&name).id;
    let product_id = world.product(&product).id;
    let subscriptions = world.system().accounts.subscriptions(account_id).await.expect("Error fetching subscriptions");
    let subscription = subscriptions
        .iter()
        .find(|s| s.product_id == product_id)
        .unwrap_or_else(|| panic!("{name} has no subscription to {product}"));
    assert!(subscription.is_active);
    let remaining = subscription.expires_at - Utc::now();
    assert!(
        remaining <= Duration::days(days) && remaining > Duration::days(days) - Duration::minutes(5),
        "Subscription expires at {}, which is not {days} days away",
        subscription.expires_at
    );
}

#[then(expr = "{string} has {int} subscription(s)")]
async fn subscription_count(world: &mut StoreWorld, name: String, count: usize) {
    let account_id = world.customer(&name).id;
    let subscriptions = world.system().accounts.subscriptions(account_id).await.expect("Error fetching subscriptions");
    assert_eq!(subscriptions.len(), count);
}
