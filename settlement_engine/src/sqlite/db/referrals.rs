use log::*;
use sqlx::SqliteConnection;

use super::products;
use crate::{
    db_types::{NewReferralBot, NewReferralCredit, Order, ReferralBot, ReferralCredit},
    referrals::commission,
    traits::{AccountApiError, SettlementError},
};

pub(crate) async fn fetch_bot_by_token(token: &str, conn: &mut SqliteConnection) -> Result<Option<ReferralBot>, AccountApiError> {
    let bot = sqlx::query_as("SELECT * FROM referral_bots WHERE token = $1").bind(token).fetch_optional(conn).await?;
    Ok(bot)
}

pub(crate) async fn insert_bot(bot: NewReferralBot, conn: &mut SqliteConnection) -> Result<ReferralBot, SettlementError> {
    let bot = sqlx::query_as(
        r#"
        INSERT INTO referral_bots (owner_account_id, seller_id, token, kind, percentage)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *;
        "#,
    )
    .bind(bot.owner_account_id)
    .bind(bot.seller_id)
    .bind(bot.token)
    .bind(bot.kind)
    .bind(bot.percentage)
    .fetch_one(conn)
    .await?;
    Ok(bot)
}

pub(crate) async fn set_bot_active(
    bot_id: i64,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<ReferralBot>, SettlementError> {
    let bot = sqlx::query_as("UPDATE referral_bots SET is_active = $1 WHERE id = $2 RETURNING *")
        .bind(active)
        .bind(bot_id)
        .fetch_optional(conn)
        .await?;
    Ok(bot)
}

pub(crate) async fn insert_credit(
    credit: NewReferralCredit,
    conn: &mut SqliteConnection,
) -> Result<ReferralCredit, SettlementError> {
    let credit = sqlx::query_as(
        r#"
        INSERT INTO referral_credits (referral_owner_id, seller_id, bot_id, order_id, amount, share)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(credit.referral_owner_id)
    .bind(credit.seller_id)
    .bind(credit.bot_id)
    .bind(credit.order_id)
    .bind(credit.amount)
    .bind(credit.share)
    .fetch_one(conn)
    .await?;
    Ok(credit)
}

pub(crate) async fn fetch_credit_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReferralCredit>, AccountApiError> {
    let credit = sqlx::query_as("SELECT * FROM referral_credits WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(credit)
}

/// Records a referral commission for `order` if `token` names an eligible bot.
///
/// This must be called with the same connection (i.e. transaction) that wrote the order. An absent or ineligible
/// token is not an error: `Ok(None)` is returned and nothing is written. Database errors do propagate, and will
/// abort the caller's transaction.
pub(crate) async fn process_referral(
    token: Option<&str>,
    order: &Order,
    conn: &mut SqliteConnection,
) -> Result<Option<ReferralCredit>, SettlementError> {
    let Some(token) = token else {
        return Ok(None);
    };
    let Some(bot) = fetch_bot_by_token(token, &mut *conn).await? else {
        debug!("🤝️ Referral token {token} does not match any bot. No commission for order #{}", order.id);
        return Ok(None);
    };
    let Some(seller) = products::fetch_seller(bot.seller_id, &mut *conn).await? else {
        warn!("🤝️ Referral bot #{} belongs to seller #{}, which does not exist", bot.id, bot.seller_id);
        return Ok(None);
    };
    let Some(share) = commission(&bot, &seller, order.amount) else {
        debug!("🤝️ Referral bot #{} is not eligible for commission on order #{}", bot.id, order.id);
        return Ok(None);
    };
    let credit = NewReferralCredit {
        referral_owner_id: bot.owner_account_id,
        seller_id: seller.id,
        bot_id: bot.id,
        order_id: order.id,
        amount: order.amount,
        share,
    };
    let credit = insert_credit(credit, conn).await?;
    info!("🤝️ Referral credit of {share} recorded for account #{} on order #{}", credit.referral_owner_id, order.id);
    Ok(Some(credit))
}
