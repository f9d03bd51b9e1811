//! Referral commission rules.
//!
//! A referral bot earns its owner a share of every order placed through it, provided that
//! * the bot is active and is a `referral` bot (the seller's `main` bot never earns commission),
//! * the bot's seller has referrals enabled, and
//! * the bot's commission percentage is positive.
//!
//! Recording the credit is done by the storage backend, inside the purchase transaction.
use crate::db_types::{Money, ReferralBot, ReferralBotKind, Seller};

/// Whether `bot` may earn commission on sales made for `seller`.
pub fn is_eligible(bot: &ReferralBot, seller: &Seller) -> bool {
    bot.is_active &&
        bot.kind == ReferralBotKind::Referral &&
        bot.seller_id == seller.id &&
        seller.referral_enabled &&
        bot.percentage > 0.0
}

/// The commission owed on an order of `order_amount`, or `None` if the bot is not eligible.
pub fn commission(bot: &ReferralBot, seller: &Seller, order_amount: Money) -> Option<Money> {
    is_eligible(bot, seller).then(|| order_amount.percentage(bot.percentage))
}
