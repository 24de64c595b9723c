//! The notify-listener side of the outbox store contract: a dedicated,
//! persistently-held connection (outside the pool, per spec §9) that
//! blocks on Postgres `LISTEN outbox_insert` and yields one `event_id`
//! at a time.

use crate::error::{OutboxError, OutboxResult};
use sqlx::postgres::PgListener;
use uuid::Uuid;

pub struct PgOutboxListener {
    listener: PgListener,
}

impl PgOutboxListener {
    /// Opens a dedicated connection (not drawn from the shared pool —
    /// it must outlive the lifetime of the processor) and subscribes to
    /// the `outbox_insert` channel.
    pub async fn connect(database_url: &str) -> OutboxResult<Self> {
        let mut listener = PgListener::connect(database_url).await?;
        listener.listen("outbox_insert").await?;
        Ok(Self { listener })
    }

    /// Blocks until a notification arrives. Cancel-safe: the caller may
    /// wrap this in `tokio::select!` alongside a cancellation signal
    /// without losing a partially-received notification. Drops of
    /// notifications are acceptable per spec — the dispatcher's poll
    /// timer is the backstop.
    pub async fn recv(&mut self) -> OutboxResult<Uuid> {
        let notification = self.listener.recv().await?;
        notification
            .payload()
            .parse::<Uuid>()
            .map_err(|e| OutboxError::Listen(format!("malformed notification payload: {e}")))
    }
}
