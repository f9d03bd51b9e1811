use std::time::Duration;

use log::*;
use settlement_engine::{PaymentApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the pending invoice polling worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Only gateways that support status polling are asked about their invoices. Webhooks remain the primary settlement
/// path; this worker catches payments whose notification never arrived.
pub fn start_payment_worker(api: PaymentApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Pending invoice worker started. Polling every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Polling pending invoices");
            match api.poll_pending_invoices().await {
                Ok(summary) if summary.checked == 0 => trace!("🕰️ No pending invoices to check"),
                Ok(summary) => {
                    info!(
                        "🕰️ Checked {} pending invoices. {} settled, {} failed, {} still pending",
                        summary.checked, summary.settled, summary.failed, summary.pending
                    );
                    if summary.errors > 0 {
                        warn!("🕰️ {} invoices could not be checked", summary.errors);
                    }
                },
                Err(e) => {
                    error!("🕰️ Error polling pending invoices: {e}");
                },
            }
        }
    })
}
