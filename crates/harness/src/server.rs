//! Fixture server: serves local fixture files and localizes `local://` URLs

use std::net::SocketAddr;

use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::FixtureConfig;
use crate::error::{HarnessError, HarnessResult};

/// Reserved scheme for fixtures served by the harness itself
pub const LOCAL_SCHEME: &str = "local://";

/// Handle to the static fixture server
pub struct FixtureServer {
    config: FixtureConfig,
    running: Option<Running>,
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl FixtureServer {
    pub fn new(config: FixtureConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bind the configured port and start serving. Fails if the port is taken.
    pub async fn start(&mut self) -> HarnessResult<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.addr);
        }

        let bind = SocketAddr::new(self.config.bind, self.config.port);
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|source| HarnessError::ServerBind {
                addr: bind.to_string(),
                source,
            })?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .fallback_service(ServeDir::new(&self.config.root))
            .layer(TraceLayer::new_for_http());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        info!(
            "Fixture server serving {} on http://{}",
            self.config.root.display(),
            addr
        );
        self.running = Some(Running {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stop serving and release the port
    pub async fn stop(&mut self) -> HarnessResult<()> {
        let running = self.running.take().ok_or(HarnessError::ServerNotRunning)?;
        debug!("Stopping fixture server on {}", running.addr);

        // The receiver only disappears if the server task already exited;
        // its result is collected below either way.
        let _ = running.shutdown.send(());

        match running.task.await {
            Ok(Ok(())) => {
                info!("Fixture server on {} stopped", running.addr);
                Ok(())
            }
            Ok(Err(e)) => Err(HarnessError::Server(e.to_string())),
            Err(e) => Err(HarnessError::Server(e.to_string())),
        }
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            warn!("Fixture server on {} dropped while running", running.addr);
            let _ = running.shutdown.send(());
        }
    }
}

/// Rewrite a single URL, leaving anything outside the local scheme untouched
pub fn local_url(url: &str, base_url: &str) -> String {
    match url.strip_prefix(LOCAL_SCHEME) {
        Some(rest) => format!("{}{}", base_url, rest),
        None => url.to_string(),
    }
}

/// Return a copy of `style` with every fixture URL localized.
///
/// Covers source `tiles`, `urls`, `url`, string `data`, and the top-level
/// `sprite` and `glyphs` fields.
pub fn localize_urls(style: &Value, base_url: &str) -> Value {
    let mut style = style.clone();
    let rewrite = |value: &mut Value| {
        if let Value::String(url) = value {
            *url = local_url(url, base_url);
        }
    };

    if let Some(sources) = style.get_mut("sources").and_then(Value::as_object_mut) {
        for source in sources.values_mut() {
            for key in ["tiles", "urls"] {
                if let Some(list) = source.get_mut(key).and_then(Value::as_array_mut) {
                    list.iter_mut().for_each(rewrite);
                }
            }
            for key in ["url", "data"] {
                if let Some(value) = source.get_mut(key) {
                    rewrite(value);
                }
            }
        }
    }

    for key in ["sprite", "glyphs"] {
        if let Some(value) = style.get_mut(key) {
            rewrite(value);
        }
    }

    style
}
