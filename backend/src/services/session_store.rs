//! In-process session store with expiry sweeping.
//!
//! Records are dropped on load once past their expiry date, and
//! [`spawn_expiry_sweeper`] deletes the ones nobody comes back for (an
//! abandoned Spotify consent screen leaves a record holding only the nonce).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{broadcast, Mutex};
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion, SessionStore};

/// How often the sweeper looks for expired records.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct SessionRecordStore {
    records: Arc<Mutex<HashMap<Id, Record>>>,
}

impl SessionRecordStore {
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

fn is_expired(record: &Record, now: OffsetDateTime) -> bool {
    record.expiry_date <= now
}

#[async_trait]
impl SessionStore for SessionRecordStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut records = self.records.lock().await;
        while records.contains_key(&record.id) {
            record.id = Id::default();
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .records
            .lock()
            .await
            .get(session_id)
            .filter(|record| !is_expired(record, now))
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.lock().await.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SessionRecordStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !is_expired(record, now));

        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!("Removed {} expired sessions, {} left", removed, records.len());
        }
        Ok(())
    }
}

/// Periodically delete expired sessions until `shutdown` fires.
pub fn spawn_expiry_sweeper(
    store: SessionRecordStore,
    period: Duration,
    shutdown: broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = store.delete_expired().await {
                        tracing::warn!("Session sweep failed: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session sweeper exiting");
                    return;
                }
            }
        }
    })
}
