// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size pool of SQLite connections with a background health monitor.
//!
//! Acquisition never waits: when every slot is checked out the caller gets
//! [`HarambeeError::PoolExhausted`] straight away. The slot table lives behind
//! a synchronous mutex that is only held while slots are scanned or flipped,
//! never across an `.await`.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use harambee_core::HarambeeError;
use tokio::task::JoinHandle;
use tokio_rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::database::map_tr_err;

struct Slot {
    conn: Connection,
    in_use: bool,
    owner: Option<tokio::task::Id>,
    usage_count: u64,
    last_used: Instant,
    created_at: Instant,
    /// Bumped whenever the slot's connection is replaced.
    generation: u64,
}

impl Slot {
    fn new(conn: Connection, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            conn,
            in_use: false,
            owner: None,
            usage_count: 0,
            last_used: now,
            created_at: now,
            generation,
        }
    }
}

struct Monitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct PoolInner {
    path: PathBuf,
    busy_timeout: Duration,
    slots: Mutex<Vec<Slot>>,
    closed: AtomicBool,
    monitor: Mutex<Option<Monitor>>,
}

impl PoolInner {
    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, index: usize) {
        if let Some(slot) = self.slots().get_mut(index) {
            slot.in_use = false;
            slot.owner = None;
        }
    }
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub in_use: usize,
    pub total_checkouts: u64,
    /// Seconds since the oldest connection was opened.
    pub oldest_connection_age_secs: u64,
}

/// A fixed set of pre-opened connections shared by concurrent callers.
///
/// Cloning is cheap and shares the same slots.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Opens `size` connections to the database at `path`.
    pub async fn open(
        path: impl AsRef<Path>,
        size: usize,
        busy_timeout: Duration,
    ) -> Result<Self, HarambeeError> {
        if size == 0 {
            return Err(HarambeeError::Config(
                "connection pool size must be at least 1".into(),
            ));
        }
        let path = path.as_ref().to_path_buf();
        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            slots.push(Slot::new(open_connection(&path, busy_timeout).await?, 0));
        }
        info!(path = %path.display(), size, "connection pool opened");
        Ok(Self {
            inner: Arc::new(PoolInner {
                path,
                busy_timeout,
                slots: Mutex::new(slots),
                closed: AtomicBool::new(false),
                monitor: Mutex::new(None),
            }),
        })
    }

    /// Checks out a free connection, failing fast if none is available.
    ///
    /// The slot is returned to the pool when the guard drops, whatever the
    /// outcome of the work done with it.
    pub fn acquire(&self) -> Result<PooledConnection, HarambeeError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(HarambeeError::Internal("connection pool is closed".into()));
        }
        let mut slots = self.inner.slots();
        let size = slots.len();
        let Some((index, slot)) = slots.iter_mut().enumerate().find(|(_, s)| !s.in_use) else {
            warn!(size, "connection pool exhausted");
            return Err(HarambeeError::PoolExhausted { size });
        };
        slot.in_use = true;
        slot.owner = tokio::task::try_id();
        slot.usage_count += 1;
        slot.last_used = Instant::now();
        Ok(PooledConnection {
            conn: slot.conn.clone(),
            index,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Pings every idle connection and replaces any that fail.
    ///
    /// Slots are not reserved while they are pinged, so callers keep
    /// acquiring throughout the check. A broken connection is swapped out
    /// only if its slot is still idle and still holds the connection that
    /// failed; otherwise the fresh connection is discarded and the next
    /// check retries. Returns the number of connections replaced.
    pub async fn check_health(&self) -> usize {
        let idle: Vec<(usize, u64, Connection)> = self
            .inner
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.in_use)
            .map(|(index, slot)| (index, slot.generation, slot.conn.clone()))
            .collect();

        let mut replaced = 0;
        for (index, generation, conn) in &idle {
            let Err(e) = ping(conn).await else {
                continue;
            };
            warn!(slot = index, error = %e, "recreating unhealthy connection");
            let fresh = match open_connection(&self.inner.path, self.inner.busy_timeout).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    error!(slot = index, error = %e, "failed to reopen connection");
                    continue;
                }
            };
            let discarded = {
                let mut slots = self.inner.slots();
                match slots.get_mut(*index) {
                    Some(slot) if !slot.in_use && slot.generation == *generation => {
                        let stale = std::mem::replace(slot, Slot::new(fresh, generation + 1));
                        replaced += 1;
                        stale.conn
                    }
                    _ => {
                        debug!(slot = index, "slot changed during health check, keeping it");
                        fresh
                    }
                }
            };
            // Either already broken or never handed out; a failed close changes nothing.
            let _ = discarded.close().await;
        }

        if replaced > 0 {
            info!(replaced, "connection health check replaced connections");
        } else {
            debug!(checked = idle.len(), "connection health check passed");
        }
        replaced
    }

    /// Starts the periodic health monitor. Calling it again is a no-op.
    pub fn start_health_monitor(&self, period: Duration) {
        let mut monitor = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if monitor.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let pool = self.clone();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        pool.check_health().await;
                    }
                }
            }
            debug!("connection health monitor stopped");
        });
        *monitor = Some(Monitor { token, handle });
    }

    /// Stops the monitor and closes every connection.
    ///
    /// Further `acquire` calls fail. Only meant for process shutdown.
    pub async fn close_all(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let monitor = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(Monitor { token, handle }) = monitor {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "health monitor ended abnormally");
            }
        }
        let conns: Vec<Connection> = self.inner.slots().drain(..).map(|s| s.conn).collect();
        let count = conns.len();
        for conn in conns {
            if let Err(e) = conn.close().await {
                error!(error = %e, "error closing connection");
            }
        }
        info!(closed = count, "connection pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.inner.slots();
        PoolStats {
            size: slots.len(),
            in_use: slots.iter().filter(|s| s.in_use).count(),
            total_checkouts: slots.iter().map(|s| s.usage_count).sum(),
            oldest_connection_age_secs: slots
                .iter()
                .map(|s| s.created_at.elapsed().as_secs())
                .max()
                .unwrap_or(0),
        }
    }

    /// Owner task recorded for each slot, `None` when idle.
    #[cfg(test)]
    fn owners(&self) -> Vec<Option<tokio::task::Id>> {
        self.inner.slots().iter().map(|s| s.owner).collect()
    }

    /// Closes the connection held by `index` without telling the pool.
    #[cfg(test)]
    async fn break_connection(&self, index: usize) {
        let conn = self.inner.slots().get(index).map(|s| s.conn.clone());
        if let Some(conn) = conn {
            let _ = conn.close().await;
        }
    }
}

/// A checked-out connection. Returns its slot to the pool on drop.
pub struct PooledConnection {
    conn: Connection,
    index: usize,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    pub fn slot(&self) -> usize {
        self.index
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

async fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection, HarambeeError> {
    let conn = Connection::open(path).await.map_err(HarambeeError::storage)?;
    conn.call(move |conn| -> Result<(), rusqlite::Error> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)?;
    Ok(conn)
}

async fn ping(conn: &Connection) -> Result<(), HarambeeError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn pool(size: usize) -> (TempDir, ConnectionPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("pool.db"), size, Duration::from_secs(5))
            .await
            .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn exhausted_pool_fails_fast() {
        let (_dir, pool) = pool(2).await;
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert!(matches!(
            pool.acquire(),
            Err(HarambeeError::PoolExhausted { size: 2 })
        ));

        drop(a);
        assert!(pool.acquire().is_ok());
    }

    #[tokio::test]
    async fn slot_is_released_when_work_fails() {
        let (_dir, pool) = pool(1).await;
        {
            let conn = pool.acquire().unwrap();
            let result = conn
                .call(|c| -> Result<(), rusqlite::Error> {
                    c.execute_batch("SELECT * FROM missing_table")?;
                    Ok(())
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(pool.stats().in_use, 0);
        assert!(pool.acquire().is_ok());
    }

    #[tokio::test]
    async fn checkout_records_owner_task() {
        let (_dir, pool) = pool(1).await;
        let p = pool.clone();
        let (id, owners) = tokio::spawn(async move {
            let _conn = p.acquire().unwrap();
            (tokio::task::id(), p.owners())
        })
        .await
        .unwrap();
        assert_eq!(owners, vec![Some(id)]);
        assert_eq!(pool.owners(), vec![None]);
        assert_eq!(pool.stats().total_checkouts, 1);
    }

    #[tokio::test]
    async fn health_check_replaces_broken_connection_in_place() {
        let (_dir, pool) = pool(3).await;
        pool.break_connection(1).await;

        assert_eq!(pool.check_health().await, 1);
        assert_eq!(pool.stats().size, 3);
        assert_eq!(pool.stats().in_use, 0);

        // Every slot answers again.
        let conns: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        for conn in &conns {
            ping(conn).await.unwrap();
        }
    }

    #[tokio::test]
    async fn health_check_skips_checked_out_connections() {
        let (_dir, pool) = pool(2).await;
        let held = pool.acquire().unwrap();
        pool.break_connection(held.slot()).await;

        assert_eq!(pool.check_health().await, 0);
        assert_eq!(pool.stats().in_use, 1);
    }

    #[tokio::test]
    async fn acquire_succeeds_while_health_check_runs() {
        let (_dir, pool) = pool(3).await;
        let checker = pool.clone();
        let check = tokio::spawn(async move { checker.check_health().await });
        tokio::task::yield_now().await;

        let conn = pool.acquire();
        assert!(conn.is_ok(), "acquire failed mid-check: {:?}", conn.err());
        drop(conn);
        assert_eq!(check.await.unwrap(), 0);
        assert_eq!(pool.stats().in_use, 0);
    }

    #[tokio::test]
    async fn health_check_leaves_slot_taken_mid_check_alone() {
        let (_dir, pool) = pool(3).await;
        pool.break_connection(0).await;
        let checker = pool.clone();
        let check = tokio::spawn(async move { checker.check_health().await });
        tokio::task::yield_now().await;

        // Slot 0 is the first idle slot, so this takes the broken connection.
        let held = pool.acquire().unwrap();
        assert_eq!(held.slot(), 0);
        check.await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.in_use, 1);
        drop(held);

        // The next check repairs it once it is idle again.
        assert_eq!(pool.check_health().await, 1);
        let conns: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        for conn in &conns {
            ping(conn).await.unwrap();
        }
    }

    #[tokio::test]
    async fn close_all_rejects_further_checkouts() {
        let (_dir, pool) = pool(2).await;
        pool.start_health_monitor(Duration::from_secs(60));
        pool.close_all().await;
        assert_eq!(pool.stats().size, 0);
        assert!(matches!(pool.acquire(), Err(HarambeeError::Internal(_))));
    }

    #[tokio::test]
    async fn zero_sized_pool_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConnectionPool::open(dir.path().join("x.db"), 0, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(HarambeeError::Config(_))));
    }
}
