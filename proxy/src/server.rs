use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use msql_srv::MysqlIntermediary;
use tracing::{debug, error, info};

use common::err::PResult;
use pipeline::{BackendExecutor, CoreContext};

use crate::session::ProxySession;

/// Accepts client connections and runs one protocol loop per connection
/// on its own thread. Sessions share only the backend executor, the
/// read-only configuration and the query-log counters.
pub struct ProxyServer {
    ctx: CoreContext,
    executor: Arc<dyn BackendExecutor>,
    next_connection_id: AtomicU32,
}

impl ProxyServer {
    pub fn new(ctx: CoreContext, executor: Arc<dyn BackendExecutor>) -> Self {
        ProxyServer {
            ctx,
            executor,
            next_connection_id: AtomicU32::new(1),
        }
    }

    /// Bind and serve until the process is stopped. Accept errors are
    /// logged and survived; only the bind failure is fatal.
    pub fn run(&self) -> PResult<()> {
        let address = format!(
            "{}:{}",
            self.ctx.config.proxy.host, self.ctx.config.proxy.port
        );
        let listener = TcpListener::bind(&address)?;
        info!(%address, "proxy listening");

        loop {
            let (stream, peer) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept failed: {e}");
                    continue;
                }
            };

            let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
            let source_address = peer.ip().to_string();
            info!(connection_id, source = %source_address, "client connected");

            let session = ProxySession::new(
                self.ctx.clone(),
                self.executor.clone(),
                connection_id,
                source_address,
            );

            let spawned = thread::Builder::new()
                .name(format!("session-{connection_id}"))
                .spawn(move || {
                    // queries within the session are serialized by this loop;
                    // it returns when the client disconnects
                    if let Err(e) = MysqlIntermediary::run_on_tcp(session, stream) {
                        debug!(connection_id, "session ended with error: {e}");
                    }
                    info!(connection_id, "client disconnected");
                });
            if let Err(e) = spawned {
                error!("failed to spawn session thread: {e}");
            }
        }
    }
}
