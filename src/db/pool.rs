//! Bounded pool of SQLite connections shared by concurrent requests.
//!
//! rusqlite connections are synchronous, so work runs on the blocking thread
//! pool. A semaphore with one permit per connection bounds concurrency: a
//! caller that finds every connection busy waits for a permit instead of
//! failing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type IdleList = Arc<Mutex<Vec<Connection>>>;

pub struct DbPool {
    idle: IdleList,
    permits: Arc<Semaphore>,
    size: usize,
    path: PathBuf,
    dimensions: usize,
}

impl DbPool {
    /// Open `size` connections to the database at `path`.
    pub fn open(path: impl AsRef<Path>, size: usize, dimensions: usize) -> Result<Self> {
        anyhow::ensure!(size > 0, "pool size must be at least 1");
        let path = path.as_ref().to_path_buf();

        let conns = (0..size)
            .map(|_| super::open_database(&path, dimensions))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(db = %path.display(), size, "connection pool ready");

        Ok(Self {
            idle: Arc::new(Mutex::new(conns)),
            permits: Arc::new(Semaphore::new(size)),
            size,
            path,
            dimensions,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections not currently checked out.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `f` with exclusive use of one connection, on a blocking thread.
    ///
    /// Waits when every connection is in use. The blocking task owns the
    /// checkout, so the connection returns to the pool when `f` finishes even
    /// if the caller stopped waiting. If `f` panics a fresh connection
    /// replaces it.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| anyhow!("connection pool closed: {e}"))?;

        let conn = lock_idle(&self.idle)
            .pop()
            .context("pool permit held but no idle connection")?;

        let checkout = Checkout {
            conn: Some(conn),
            idle: Arc::clone(&self.idle),
            path: self.path.clone(),
            dimensions: self.dimensions,
            permit: Some(permit),
        };

        tokio::task::spawn_blocking(move || {
            let mut checkout = checkout;
            let conn = checkout
                .conn
                .as_mut()
                .context("checked-out connection missing")?;
            f(conn)
        })
        .await
        .map_err(|e| anyhow!("database task failed: {e}"))?
    }
}

fn lock_idle(idle: &IdleList) -> std::sync::MutexGuard<'_, Vec<Connection>> {
    idle.lock().unwrap_or_else(|e| e.into_inner())
}

/// One connection on loan. Dropping it puts the connection back before the
/// permit is released; a connection abandoned by a panic is replaced.
struct Checkout {
    conn: Option<Connection>,
    idle: IdleList,
    path: PathBuf,
    dimensions: usize,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let conn = if std::thread::panicking() {
            tracing::error!("database task panicked, replacing connection");
            drop(self.conn.take());
            match super::open_database(&self.path, self.dimensions) {
                Ok(fresh) => Some(fresh),
                Err(e) => {
                    tracing::error!(error = %e, "failed to reopen pooled connection");
                    None
                }
            }
        } else {
            self.conn.take()
        };

        match conn {
            Some(conn) => lock_idle(&self.idle).push(conn),
            // keep permits and idle connections in step
            None => {
                if let Some(permit) = self.permit.take() {
                    permit.forget();
                }
            }
        }
    }
}
