use cucumber::given;
use settlement_engine::{
    db_types::{NewAccount, NewProduct, NewReferralBot, NewSeller, ReferralBotKind},
    CatalogManagement,
    SettlementDatabase,
};

use crate::cucumber::{
    store_world::{money, StoreSystem},
    StoreWorld,
};

#[given("a fresh install")]
async fn fresh_database(world: &mut StoreWorld) {
    let system = StoreSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a customer {string}")]
async fn a_customer(world: &mut StoreWorld, name: String) {
    let account = NewAccount::new(format!("ext-{name}")).with_username(name.clone());
    let account = world.db().upsert_account(account).await.expect("Error creating account");
    world.system_mut().customers.insert(name, account);
}

#[given(expr = "an item {string} priced at {word} with {int} units in stock")]
async fn an_item(world: &mut StoreWorld, name: String, price: String, stock: i64) {
    let product = NewProduct::item(name.clone(), money(&price), stock);
    let product = world.db().create_product(product).await.expect("Error creating product");
    world.system_mut().products.insert(name, product);
}

#[given(expr = "a subscription {string} priced at {word}")]
async fn a_subscription(world: &mut StoreWorld, name: String, price: String) {
    let product = NewProduct::subscription(name.clone(), money(&price));
    let product = world.db().create_product(product).await.expect("Error creating product");
    world.system_mut().products.insert(name, product);
}

#[given(expr = "a subscription {string} priced at {word} lasting {int} days")]
async fn a_subscription_with_period(world: &mut StoreWorld, name: String, price: String, days: i64) {
    let product = NewProduct::subscription(name.clone(), money(&price)).with_period_days(days);
    let product = world.db().create_product(product).await.expect("Error creating product");
    world.system_mut().products.insert(name, product);
}

#[given(expr = "an item {string} priced at {word} with {int} units in stock that delivers {string}")]
async fn an_item_with_content(world: &mut StoreWorld, name: String, price: String, stock: i64, content: String) {
    let product = NewProduct::item(name.clone(), money(&price), stock).with_fulfillment(content);
    let product = world.db().create_product(product).await.expect("Error creating product");
    world.system_mut().products.insert(name, product);
}

#[given(expr = "{string} has been credited {word}")]
async fn credited(world: &mut StoreWorld, name: String, amount: String) {
    let account_id = world.customer(&name).id;
    world.api().issue_deposit(account_id, money(&amount), "Test deposit").await.expect("Error crediting account");
}

#[given(expr = "{string} has been deleted")]
async fn deleted(world: &mut StoreWorld, name: String) {
    let external_id = world.customer(&name).external_id.clone();
    world.api().soft_delete_account(&external_id).await.expect("Error deleting account");
}

#[given(expr = "a seller {string} with referrals {word}")]
async fn a_seller(world: &mut StoreWorld, name: String, state: String) {
    let referral_enabled = state == "enabled";
    let seller = NewSeller { name: name.clone(), referral_enabled };
    let seller = world.db().create_seller(seller).await.expect("Error creating seller");
    world.system_mut().sellers.insert(name, seller.id);
}

#[given(expr = "{string} owns a {word} bot {string} for {string} at {float} percent")]
async fn a_bot(world: &mut StoreWorld, owner: String, kind: String, token: String, seller: String, percentage: f64) {
    let kind = match kind.as_str() {
        "main" => ReferralBotKind::Main,
        _ => ReferralBotKind::Referral,
    };
    let bot = NewReferralBot {
        owner_account_id: world.customer(&owner).id,
        seller_id: world.seller(&seller),
        token,
        kind,
        percentage,
    };
    world.db().create_referral_bot(bot).await.expect("Error creating referral bot");
}

#[given(expr = "the bot {string} is deactivated")]
async fn bot_deactivated(world: &mut StoreWorld, token: String) {
    let pool = world.db().pool().clone();
    let id: i64 = sqlx::query_scalar("SELECT id FROM referral_bots WHERE token = $1")
        .bind(token)
        .fetch_one(&pool)
        .await
        .expect("No such bot");
    world.db().set_referral_bot_active(id, false).await.expect("Error deactivating bot");
}
