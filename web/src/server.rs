//! The HTTP server as an orchestrated component.

use crate::router::router;
use crate::state::AppState;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError, RwLock};
use tally_core::component::{Component, ComponentBase, ComponentError, ErrorPhase};
use tally_core::event_bus::EventBus;
use tally_runtime::HealthMonitor;
use tally_tracker::components::names;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Registration name of [`HttpServerComponent`].
pub const NAME: &str = "http";

/// Component names the HTTP server must be registered with.
pub const DEPENDENCIES: [&str; 5] = [
    names::AUTH,
    names::ACTIVITY,
    names::GOAL,
    names::ACHIEVEMENT,
    names::NOTIFICATION,
];

struct Running {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Serves the API while initialized.
///
/// `on_init` binds the listener, so a port that is already taken fails
/// startup. `on_shutdown` stops accepting connections and waits for
/// in-flight requests.
pub struct HttpServerComponent {
    base: ComponentBase,
    addr: SocketAddr,
    health: HealthMonitor,
    local_addr: RwLock<Option<SocketAddr>>,
    running: Mutex<Option<Running>>,
}

impl HttpServerComponent {
    /// Creates a server that will listen on `addr`. Port 0 picks a free port.
    #[must_use]
    pub fn new(bus: EventBus, addr: SocketAddr, health: HealthMonitor) -> Self {
        Self {
            base: ComponentBase::new(NAME, bus),
            addr,
            health,
            local_addr: RwLock::new(None),
            running: Mutex::new(None),
        }
    }

    /// The bound address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Component for HttpServerComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    async fn on_init(&self) -> Result<(), ComponentError> {
        let state = AppState::from_dependencies(&self.base, self.health.clone())?;
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ComponentError::other(format!("Failed to bind {}: {e}", self.addr)))?;
        let bound = listener
            .local_addr()
            .map_err(|e| ComponentError::other(format!("Failed to read bound address: {e}")))?;

        let (stop, stopped) = oneshot::channel::<()>();
        let reporter = self.base.reporter();
        let app = router(state);
        let task = tokio::spawn(async move {
            let shutdown = async {
                stopped.await.ok();
            };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %err, "HTTP server failed");
                reporter.report(ErrorPhase::Runtime, &err);
            }
        });

        info!(addr = %bound, "HTTP server listening");
        *self
            .local_addr
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(bound);
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) = Some(Running { stop, task });
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        *self
            .local_addr
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;

        if let Some(Running { stop, task }) = running {
            stop.send(()).ok();
            task.await
                .map_err(|e| ComponentError::other(format!("HTTP server task failed: {e}")))?;
            info!("HTTP server stopped");
        }
        Ok(())
    }
}
