use std::{collections::BTreeMap, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, KvWrite};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

enum SaveRequest {
    Writes(Vec<KvWrite>),
    Flush(oneshot::Sender<()>),
}

/// Coalesces bursts of state writes into a single batched write once the
/// caller has been idle for `delay`. Later writes to a key replace earlier
/// pending ones. Pending writes are flushed on shutdown; nothing guarantees
/// a flush if the process dies first.
pub struct AutoSaver {
    tx: mpsc::UnboundedSender<SaveRequest>,
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSaver {
    pub fn spawn(db: Database, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(autosave_loop(db, delay, rx, cancel_token.clone()));

        Self {
            tx,
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn schedule(&self, writes: Vec<KvWrite>) {
        if self.tx.send(SaveRequest::Writes(writes)).is_err() {
            log_error!("auto-save loop is gone; dropping scheduled writes");
        }
    }

    /// Writes everything pending now instead of waiting out the delay.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SaveRequest::Flush(done_tx)).is_err() {
            log_error!("auto-save loop is gone; nothing to flush");
            return;
        }
        let _ = done_rx.await;
    }

    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(err) = handle.await {
                log_error!("auto-save loop failed to join: {err}");
            }
        }
    }
}

async fn autosave_loop(
    db: Database,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<SaveRequest>,
    cancel_token: CancellationToken,
) {
    let mut pending: BTreeMap<String, Option<String>> = BTreeMap::new();

    loop {
        let received = if pending.is_empty() {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                msg = rx.recv() => msg,
            }
        } else {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                msg = rx.recv() => msg,
                _ = tokio::time::sleep(delay) => {
                    flush(&db, &mut pending).await;
                    continue;
                }
            }
        };

        match received {
            Some(SaveRequest::Writes(writes)) => {
                for write in writes {
                    pending.insert(write.key, write.value);
                }
            }
            Some(SaveRequest::Flush(done)) => {
                flush(&db, &mut pending).await;
                let _ = done.send(());
            }
            None => break,
        }
    }

    while let Ok(request) = rx.try_recv() {
        match request {
            SaveRequest::Writes(writes) => {
                for write in writes {
                    pending.insert(write.key, write.value);
                }
            }
            SaveRequest::Flush(done) => {
                flush(&db, &mut pending).await;
                let _ = done.send(());
            }
        }
    }
    flush(&db, &mut pending).await;
    log_info!("auto-save loop shutting down");
}

async fn flush(db: &Database, pending: &mut BTreeMap<String, Option<String>>) {
    if pending.is_empty() {
        return;
    }

    let writes: Vec<KvWrite> = std::mem::take(pending)
        .into_iter()
        .map(|(key, value)| KvWrite { key, value })
        .collect();

    match db.apply_writes(writes).await {
        Ok(count) => log_info!("auto-saved {count} keys"),
        Err(err) => log_error!("auto-save failed: {err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rapid_writes_coalesce_to_latest_value() {
        let db = Database::in_memory().unwrap();
        let saver = AutoSaver::spawn(db.clone(), Duration::from_millis(50));

        saver.schedule(vec![KvWrite::set("xp", "10")]);
        saver.schedule(vec![KvWrite::set("xp", "20")]);
        saver.schedule(vec![KvWrite::set("level", "2")]);
        assert_eq!(db.get_raw("xp").await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(db.get_raw("xp").await.unwrap().as_deref(), Some("20"));
        assert_eq!(db.get_raw("level").await.unwrap().as_deref(), Some("2"));

        saver.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_writes() {
        let db = Database::in_memory().unwrap();
        let saver = AutoSaver::spawn(db.clone(), Duration::from_secs(60));

        saver.schedule(vec![KvWrite::set("streak", "3")]);
        saver.shutdown().await;

        assert_eq!(db.get_raw("streak").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn flush_writes_without_waiting() {
        let db = Database::in_memory().unwrap();
        let saver = AutoSaver::spawn(db.clone(), Duration::from_secs(60));

        saver.schedule(vec![KvWrite::set("dailyGoal", "4")]);
        saver.flush().await;
        assert_eq!(db.get_raw("dailyGoal").await.unwrap().as_deref(), Some("4"));

        saver.shutdown().await;
    }
}
