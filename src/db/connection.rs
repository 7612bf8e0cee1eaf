use std::{
    fmt,
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// How long a statement waits on a locked file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the key-value store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private to one `Database` handle; gone when the handle drops.
    Memory,
}

impl StoreLocation {
    fn connect(&self) -> Result<Connection> {
        let conn = match self {
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory {}", parent.display())
                    })?;
                }
                let conn = Connection::open(path)
                    .with_context(|| format!("failed to open store at {}", path.display()))?;
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("Store stays in rollback journal mode: {err}");
                }
                conn
            }
            StoreLocation::Memory => {
                Connection::open_in_memory().context("failed to open in-memory store")?
            }
        };
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to set store busy timeout")?;
        Ok(conn)
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::Memory => f.write_str(":memory:"),
        }
    }
}

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Stop,
}

/// Drains jobs in arrival order until asked to stop or every handle is gone.
fn serve_requests(mut conn: Connection, requests: mpsc::Receiver<Request>) {
    for request in requests {
        match request {
            Request::Run(job) => job(&mut conn),
            Request::Stop => break,
        }
    }
    info!("Store worker stopped");
}

struct Worker {
    requests: mpsc::Sender<Request>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.requests.send(Request::Stop).is_err() {
            error!("Store worker exited before shutdown was requested");
        }
        if let Err(err) = handle.join() {
            error!("Store worker panicked: {err:?}");
        }
    }
}

/// Handle to the store's worker thread. Clones share one connection, so
/// writes land in the order they are sent.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<StoreLocation>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::open(StoreLocation::File(db_path))
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(StoreLocation::Memory)
    }

    /// Opens the store on a dedicated thread and brings its schema up to
    /// date before returning.
    pub fn open(location: StoreLocation) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let target = location.clone();

        let thread = thread::Builder::new()
            .name("testarena-db".into())
            .spawn(move || {
                let conn = target.connect().and_then(|mut conn| {
                    run_migrations(&mut conn).context("failed to migrate store")?;
                    Ok(conn)
                });
                match conn {
                    Ok(conn) => {
                        if ready_tx.send(Ok(())).is_ok() {
                            serve_requests(conn, request_rx);
                        }
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                }
            })
            .context("failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before it was ready")??;

        if location != StoreLocation::Memory {
            info!("Store opened at {location}");
        }
        Ok(Self {
            worker: Arc::new(Worker {
                requests: request_tx,
                thread: Mutex::new(Some(thread)),
            }),
            location: Arc::new(location),
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Runs `task` on the worker thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have been cancelled; the work is done either way.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .requests
            .send(Request::Run(job))
            .map_err(|_| anyhow!("store worker is no longer running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store worker dropped a request"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_stores_are_private() {
        let first = Database::in_memory().unwrap();
        let second = Database::in_memory().unwrap();
        first.set_raw("xp", "10".into()).await.unwrap();

        assert_eq!(first.get_raw("xp").await.unwrap().as_deref(), Some("10"));
        assert_eq!(second.get_raw("xp").await.unwrap(), None);
        assert_eq!(first.location(), &StoreLocation::Memory);
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let db = Database::in_memory().unwrap();
        let err = db
            .execute(|conn| {
                conn.execute_batch("SELECT * FROM missing_table")?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing_table"));

        // The worker keeps serving after a failed job.
        db.set_raw("level", "2".into()).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("testarena-db-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("store.sqlite3");

        let db = Database::new(path.clone()).unwrap();
        db.set_raw("streak", "4".into()).await.unwrap();
        drop(db);

        let reopened = Database::new(path).unwrap();
        assert_eq!(reopened.get_raw("streak").await.unwrap().as_deref(), Some("4"));
        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
