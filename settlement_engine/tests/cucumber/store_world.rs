use std::{collections::HashMap, str::FromStr};

use cucumber::World;
use log::*;
use settlement_engine::{
    db_types::{Account, Money, PaymentInvoice, Product},
    events::EventProducers,
    gateways::GatewayRegistry,
    payment_objects::{PollSummary, WebhookOutcome},
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        scripted_gateway::ScriptedGateway,
    },
    traits::{CancellationReceipt, PurchaseReceipt},
    AccountApi,
    OrderFlowApi,
    PaymentApi,
    SettlementError,
    SqliteDatabase,
};

pub const TEST_GATEWAY: &str = "testpay";

#[derive(Default, Debug, World)]
pub struct StoreWorld {
    pub system: Option<StoreSystem>,
}

#[derive(Debug)]
pub struct StoreSystem {
    pub db_path: String,
    pub api: OrderFlowApi<SqliteDatabase>,
    pub accounts: AccountApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase>,
    pub gateway: ScriptedGateway,
    pub customers: HashMap<String, Account>,
    pub products: HashMap<String, Product>,
    pub sellers: HashMap<String, i64>,
    pub last_purchase: Option<Result<PurchaseReceipt, SettlementError>>,
    pub last_cancellation: Option<Result<CancellationReceipt, SettlementError>>,
    pub last_invoice: Option<Result<PaymentInvoice, SettlementError>>,
    pub last_outcome: Option<WebhookOutcome>,
    pub last_poll: Option<PollSummary>,
    pub last_error: Option<SettlementError>,
}

impl StoreWorld {
    pub fn system(&self) -> &StoreSystem {
        self.system.as_ref().expect("Store system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut StoreSystem {
        self.system.as_mut().expect("Store system not initialised")
    }

    pub fn api(&self) -> &OrderFlowApi<SqliteDatabase> {
        &self.system().api
    }

    pub fn db(&self) -> &SqliteDatabase {
        self.system().api.db()
    }

    pub fn customer(&self, name: &str) -> &Account {
        self.system().customers.get(name).unwrap_or_else(|| panic!("No customer called {name}"))
    }

    pub fn product(&self, name: &str) -> &Product {
        self.system().products.get(name).unwrap_or_else(|| panic!("No product called {name}"))
    }

    pub fn seller(&self, name: &str) -> i64 {
        *self.system().sellers.get(name).unwrap_or_else(|| panic!("No seller called {name}"))
    }

    pub fn last_order_id(&self) -> i64 {
        match &self.system().last_purchase {
            Some(Ok(receipt)) => receipt.order.id,
            other => panic!("The last purchase did not succeed: {other:?}"),
        }
    }
}

impl StoreSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 4).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");
        let gateway = ScriptedGateway::new(TEST_GATEWAY, "Test Pay").with_polling();
        let mut registry = GatewayRegistry::new();
        registry.register(gateway.clone());
        let producers = EventProducers::default();
        Self {
            db_path: url,
            api: OrderFlowApi::new(db.clone(), producers.clone()),
            accounts: AccountApi::new(db.clone()),
            payments: PaymentApi::new(db, registry, producers),
            gateway,
            customers: HashMap::new(),
            products: HashMap::new(),
            sellers: HashMap::new(),
            last_purchase: None,
            last_cancellation: None,
            last_invoice: None,
            last_outcome: None,
            last_poll: None,
            last_error: None,
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}

pub fn money(s: &str) -> Money {
    Money::from_str(s).unwrap_or_else(|e| panic!("{s} is not a valid amount. {e}"))
}

/// Matches an error against the name used in feature files.
pub fn error_name(e: &SettlementError) -> &'static str {
    match e {
        SettlementError::NotFound { .. } => "NotFound",
        SettlementError::Validation(_) => "Validation",
        SettlementError::OutOfStock(_) => "OutOfStock",
        SettlementError::InsufficientBalance => "InsufficientBalance",
        SettlementError::AlreadyExists(_) => "AlreadyExists",
        SettlementError::InvalidInvoiceTransition { .. } => "InvalidInvoiceTransition",
        SettlementError::Gateway(_) => "Gateway",
        SettlementError::DatabaseError(_) => "DatabaseError",
        SettlementError::Account(_) => "Account",
    }
}
