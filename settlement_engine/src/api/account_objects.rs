use serde::{Deserialize, Serialize};

use crate::db_types::{Account, Money, Product, ProductType, Stock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: i64,
    pub external_id: String,
    pub is_deleted: bool,
    /// Derived from the balance ledger
    pub balance: Money,
}

impl AccountBalance {
    pub fn new(account: &Account, balance: Money) -> Self {
        Self { account_id: account.id, external_id: account.external_id.clone(), is_deleted: account.is_deleted, balance }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductStock {
    pub product_id: i64,
    pub name: String,
    pub product_type: ProductType,
    pub stock: Stock,
}

impl ProductStock {
    pub fn new(product: &Product, stock: Stock) -> Self {
        Self { product_id: product.id, name: product.name.clone(), product_type: product.product_type, stock }
    }
}
