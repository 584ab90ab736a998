use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use mysql::prelude::Queryable;
use mysql::{Conn, Opts};
use tracing::{debug, warn};

use pipeline::BackendError;

/// Pool discipline knobs, all taken from `[backend]` configuration.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub size: usize,
    /// Connections older than this are closed and replaced on acquire.
    pub recycle: Duration,
    /// Run a cheap liveness probe before handing a connection out.
    pub pre_ping: bool,
    /// How long an acquire may wait for a free slot.
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            size: 10,
            recycle: Duration::from_secs(3600),
            pre_ping: true,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// A pooled backend connection plus its birth time, used for TTL recycle.
pub struct PooledConn {
    pub conn: Conn,
    created_at: Instant,
}

impl PooledConn {
    fn is_stale(&self, recycle: Duration) -> bool {
        self.created_at.elapsed() > recycle
    }
}

struct Inner {
    idle: VecDeque<PooledConn>,
    /// Connections currently alive, idle or checked out.
    total: usize,
}

/// Bounded, shared connection pool over the native driver. Connections
/// are created lazily, recycled after the configured TTL, optionally
/// pre-pinged, and discarded (never reused) after a failure.
pub struct ConnectionPool {
    opts: Opts,
    options: PoolOptions,
    inner: Mutex<Inner>,
    available: Condvar,
}

impl ConnectionPool {
    pub fn new(opts: Opts, options: PoolOptions) -> Self {
        ConnectionPool {
            opts,
            options,
            inner: Mutex::new(Inner {
                idle: VecDeque::new(),
                total: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Wait up to the acquire bound for a healthy connection.
    pub fn acquire(&self) -> Result<PooledConn, BackendError> {
        let deadline = Instant::now() + self.options.acquire_timeout;
        let mut inner = self.lock();

        loop {
            if let Some(pooled) = inner.idle.pop_front() {
                drop(inner);
                return self.refresh(pooled);
            }

            if inner.total < self.options.size {
                inner.total += 1;
                drop(inner);
                return self.open().map_err(|e| {
                    self.forget_one();
                    e
                });
            }

            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => {
                    return Err(BackendError::pool_exhausted(format!(
                        "no backend connection became available within {:?}",
                        self.options.acquire_timeout
                    )))
                }
            };

            let (guard, result) = self
                .available
                .wait_timeout(inner, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inner = guard;
            if result.timed_out() && inner.idle.is_empty() && inner.total >= self.options.size {
                return Err(BackendError::pool_exhausted(format!(
                    "no backend connection became available within {:?}",
                    self.options.acquire_timeout
                )));
            }
        }
    }

    /// Return a connection to the pool, or drop it after a failure so the
    /// next acquire opens a fresh one.
    pub fn release(&self, pooled: PooledConn, healthy: bool) {
        let mut inner = self.lock();
        if healthy {
            inner.idle.push_back(pooled);
        } else {
            inner.total -= 1;
            debug!("discarding backend connection after failure");
        }
        drop(inner);
        self.available.notify_one();
    }

    /// TTL recycle plus optional pre-ping, replacing the connection
    /// transparently when either check fails.
    fn refresh(&self, mut pooled: PooledConn) -> Result<PooledConn, BackendError> {
        if pooled.is_stale(self.options.recycle) {
            debug!("recycling stale backend connection");
            return self.reopen();
        }

        if self.options.pre_ping && pooled.conn.query_drop("SHOW TABLES").is_err() {
            warn!("backend connection failed pre-ping, replacing");
            return self.reopen();
        }

        Ok(pooled)
    }

    fn reopen(&self) -> Result<PooledConn, BackendError> {
        self.open().map_err(|e| {
            self.forget_one();
            e
        })
    }

    fn open(&self) -> Result<PooledConn, BackendError> {
        match Conn::new(self.opts.clone()) {
            Ok(conn) => Ok(PooledConn {
                conn,
                created_at: Instant::now(),
            }),
            Err(e) => Err(super::executor::classify_error(e)),
        }
    }

    /// A slot reserved for a connection that could not be opened or was
    /// closed outside `release`.
    fn forget_one(&self) {
        let mut inner = self.lock();
        inner.total = inner.total.saturating_sub(1);
        drop(inner);
        self.available.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stale_detection() {
        // a connection cannot be fabricated without a server, but the TTL
        // bookkeeping is plain time arithmetic
        let options = PoolOptions {
            recycle: Duration::from_secs(0),
            ..PoolOptions::default()
        };
        assert_eq!(options.size, 10);
        assert!(options.pre_ping);

        let created_at = Instant::now() - Duration::from_secs(10);
        let age_based_stale = created_at.elapsed() > options.recycle;
        assert!(age_based_stale);
    }

    #[test]
    fn test_acquire_times_out_against_unreachable_backend() {
        // connection refused surfaces as a driver error, not a hang
        let opts = Opts::from_url("mysql://root@127.0.0.1:1/").unwrap();
        let pool = ConnectionPool::new(
            opts,
            PoolOptions {
                size: 1,
                acquire_timeout: Duration::from_millis(50),
                ..PoolOptions::default()
            },
        );

        let err = match pool.acquire() {
            Err(e) => e,
            Ok(_) => panic!("expected acquire to fail"),
        };
        assert!(!err.message.is_empty());
    }
}
