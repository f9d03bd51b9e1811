use sqlx::SqliteConnection;

use crate::{
    db_types::{InvoiceStatus, NewInvoice, PaymentInvoice},
    traits::{AccountApiError, SettlementError},
};

/// Inserts a new invoice. The unique constraint on `order_token` turns a duplicate into
/// [`SettlementError::AlreadyExists`].
pub(crate) async fn insert_invoice(invoice: NewInvoice, conn: &mut SqliteConnection) -> Result<PaymentInvoice, SettlementError> {
    let token = invoice.order_token.clone();
    sqlx::query_as(
        r#"
        INSERT INTO payment_invoices (account_id, amount, status, gateway, gateway_invoice_id, order_token, pay_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *;
        "#,
    )
    .bind(invoice.account_id)
    .bind(invoice.amount)
    .bind(invoice.status)
    .bind(invoice.gateway)
    .bind(invoice.gateway_invoice_id)
    .bind(invoice.order_token)
    .bind(invoice.pay_url)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            SettlementError::AlreadyExists(format!("invoice with order token {token}"))
        },
        e => SettlementError::from(e),
    })
}

pub(crate) async fn fetch_invoice(
    order_token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInvoice>, AccountApiError> {
    let invoice = sqlx::query_as("SELECT * FROM payment_invoices WHERE order_token = $1")
        .bind(order_token)
        .fetch_optional(conn)
        .await?;
    Ok(invoice)
}

/// Takes the write lock on the invoice row. See the [module docs](super) for details.
pub(crate) async fn lock_invoice(
    order_token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInvoice>, SettlementError> {
    let invoice = sqlx::query_as(
        "UPDATE payment_invoices SET updated_at = CURRENT_TIMESTAMP WHERE order_token = $1 RETURNING *",
    )
    .bind(order_token)
    .fetch_optional(conn)
    .await?;
    Ok(invoice)
}

/// Conditionally moves the invoice from `from` to `to`. Returns `None` if the invoice was not in `from` status, in
/// which case nothing was changed.
pub(crate) async fn transition_status(
    order_token: &str,
    from: InvoiceStatus,
    to: InvoiceStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInvoice>, SettlementError> {
    let invoice = sqlx::query_as(
        r#"
        UPDATE payment_invoices SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE order_token = $2 AND status = $3
        RETURNING *;
        "#,
    )
    .bind(to)
    .bind(order_token)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(invoice)
}

pub(crate) async fn set_message_id(
    order_token: &str,
    message_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentInvoice>, SettlementError> {
    let invoice = sqlx::query_as(
        r#"
        UPDATE payment_invoices SET message_id = $1, updated_at = CURRENT_TIMESTAMP
        WHERE order_token = $2
        RETURNING *;
        "#,
    )
    .bind(message_id)
    .bind(order_token)
    .fetch_optional(conn)
    .await?;
    Ok(invoice)
}

pub(crate) async fn fetch_pending(conn: &mut SqliteConnection) -> Result<Vec<PaymentInvoice>, AccountApiError> {
    let invoices = sqlx::query_as("SELECT * FROM payment_invoices WHERE status = $1 ORDER BY id ASC")
        .bind(InvoiceStatus::Pending)
        .fetch_all(conn)
        .await?;
    Ok(invoices)
}
