//! SQLite persistence for sessions and their emotion analyses.
//!
//! All statements run on one dedicated thread that owns the [`Connection`]; async
//! callers hand it closures through a channel and await the reply on a oneshot.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Close,
}

/// Owns the worker thread; the last [`Database`] clone to drop closes it.
struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(Message::Close).is_err() {
            error!("DB thread already gone at shutdown");
        }
        if let Err(panic) = handle.join() {
            error!("DB thread panicked: {panic:?}");
        }
    }
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and brings its schema up to
    /// date before returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<Message>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_path = path.clone();

        let thread = thread::Builder::new()
            .name("moodquiz-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&worker_path) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for message in jobs_rx {
                    match message {
                        Message::Run(job) => job(&mut conn),
                        Message::Close => break,
                    }
                }
                info!("Database thread shutting down");
            })
            .context("failed to spawn database worker thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => return Err(anyhow!("database worker exited before signaling readiness")),
        }

        info!("Database ready at {}", path.display());
        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the database thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("DB caller went away before its result was ready");
            }
        });

        self.worker
            .jobs
            .send(Message::Run(job))
            .map_err(|_| anyhow!("database thread is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread dropped a job without replying"))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    migrations::run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}
