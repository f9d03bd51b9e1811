use crate::{
    db_types::{NewProduct, NewReferralBot, NewSeller, Product, ReferralBot, Seller, StockMovement},
    traits::SettlementError,
};

/// Administrative writes to the catalog and the referral program.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn create_seller(&self, seller: NewSeller) -> Result<Seller, SettlementError>;

    /// Enables or disables referral commissions for every bot belonging to the seller.
    async fn set_seller_referrals(&self, seller_id: i64, enabled: bool) -> Result<Seller, SettlementError>;

    /// Creates the product. For items with a positive `initial_stock`, an `initial` stock movement is written in the
    /// same transaction.
    async fn create_product(&self, product: NewProduct) -> Result<Product, SettlementError>;

    /// Adds `quantity` units to an item's stock. Subscriptions and non-positive quantities are rejected.
    async fn restock_product(&self, product_id: i64, quantity: i64) -> Result<StockMovement, SettlementError>;

    async fn create_referral_bot(&self, bot: NewReferralBot) -> Result<ReferralBot, SettlementError>;

    async fn set_referral_bot_active(&self, bot_id: i64, active: bool) -> Result<ReferralBot, SettlementError>;
}
