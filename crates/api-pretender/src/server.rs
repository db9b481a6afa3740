//! Mock server lifecycle and fluent configuration.
//!
//! Each running mock owns a loopback listener served by a dedicated thread
//! with its own tokio runtime, so `start` and `stop` are plain synchronous
//! calls usable from `#[test]` and `#[tokio::test]` alike.

use crate::config::MockConfig;
use crate::error::MockError;
use crate::handler::handle_request;
use crate::reporter::Reporter;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Configuration shared with the request handlers. Writers swap in a new
/// `Arc`; each request works on the snapshot it cloned.
type SharedConfig = Arc<RwLock<Arc<MockConfig>>>;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// A programmable HTTP mock.
///
/// Lifecycle: created, then `start` (idempotent while running), then `stop`
/// (idempotent, warns when already stopped). A stopped mock can be started
/// again on a fresh port. Dropping a running mock stops it.
pub struct MockServer {
    config: SharedConfig,
    handle: Option<ServerHandle>,
}

/// The live server behind a started mock.
pub struct ServerHandle {
    url: String,
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Base URL, `http://127.0.0.1:<port>` without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    fn spawn(config: SharedConfig) -> Result<Self, MockError> {
        let listener =
            std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(MockError::Bind)?;
        listener.set_nonblocking(true).map_err(MockError::Bind)?;
        let addr = listener.local_addr().map_err(MockError::Bind)?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread = std::thread::Builder::new()
            .name(format!("api-pretender-{}", addr.port()))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => {
                        let _ = ready_tx.send(Ok(()));
                        runtime
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                runtime.block_on(serve(listener, addr, config, shutdown_rx));
                runtime.shutdown_timeout(SHUTDOWN_GRACE);
            })
            .map_err(MockError::Runtime)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(MockError::Runtime(e));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MockError::Runtime(std::io::Error::other(
                    "mock server thread exited before starting",
                )));
            }
        }

        Ok(Self {
            url: format!("http://{addr}"),
            addr,
            shutdown_tx,
            thread: Some(thread),
        })
    }

    /// Signal the accept loop and wait for the server thread to finish.
    fn close(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Mock server thread on port {} panicked", self.addr.port());
            }
        }
    }
}

async fn serve(
    listener: std::net::TcpListener,
    addr: SocketAddr,
    config: SharedConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to register listener on {}: {}", addr, e);
            return;
        }
    };
    let port = addr.port();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _peer)) => {
                        let config = Arc::clone(&config);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let snapshot = Arc::clone(&*config.read());
                                handle_request(req, snapshot)
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection error on port {}: {}", port, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on port {}: {}", port, e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Mock server on port {} shutting down", port);
                break;
            }
        }
    }
}

impl MockServer {
    /// A mock with an empty contract and a plain 200 response.
    pub fn new() -> Self {
        Self::configured(MockConfig::default())
    }

    /// A mock built from a construction record.
    pub fn configured(config: MockConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(Arc::new(config))),
            handle: None,
        }
    }

    /// Bind the loopback server and return its base URL.
    ///
    /// While running, returns the existing URL without rebinding.
    pub fn start(&mut self) -> Result<String, MockError> {
        if let Some(handle) = &self.handle {
            return Ok(handle.url.clone());
        }

        let handle = ServerHandle::spawn(Arc::clone(&self.config))?;
        info!("Mock server listening on {}", handle.url);
        let url = handle.url.clone();
        self.handle = Some(handle);
        Ok(url)
    }

    /// The live server, if started. Never starts one.
    pub fn server_handle(&self) -> Option<&ServerHandle> {
        self.handle.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.handle.as_ref().map(ServerHandle::url)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Shut the server down. Stopping a mock that is not running only logs a
    /// warning.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            warn!("GoAPIpretender: warning - server already stopped");
            return;
        };
        handle.close();
        info!("GoAPIpretender: server stopped successfully");
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<MockConfig> {
        Arc::clone(&*self.config.read())
    }

    fn update(self, apply: impl FnOnce(&mut MockConfig)) -> Self {
        {
            let mut current = self.config.write();
            apply(Arc::make_mut(&mut *current));
        }
        self
    }

    pub fn method(self, method: impl Into<String>) -> Self {
        let method = method.into();
        self.update(|c| c.contract.method = method)
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.update(|c| c.contract.path = path)
    }

    /// Expected request body. An empty payload disables the check.
    pub fn payload(self, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        self.update(|c| c.contract.payload = Some(payload))
    }

    /// Required query parameters; replaces any previously set.
    pub fn parameters<K, V>(self, parameters: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let parameters = collect_pairs(parameters);
        self.update(|c| c.contract.parameters = parameters)
    }

    /// Required request headers; replaces any previously set.
    pub fn headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let headers = collect_pairs(headers);
        self.update(|c| c.contract.headers = headers)
    }

    /// Response status; `0` means 200 and values outside `[100, 511]` are not
    /// written.
    pub fn response_status(self, status: u16) -> Self {
        self.update(|c| c.response.status = status)
    }

    pub fn response_headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let headers = collect_pairs(headers);
        self.update(|c| c.response.headers = headers)
    }

    pub fn response_body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.update(|c| c.response.body = Some(body))
    }

    pub fn reporter(self, reporter: Arc<dyn Reporter>) -> Self {
        self.update(|c| c.reporter = Some(reporter))
    }

    /// Answer every request with `handler`, skipping validation and the
    /// configured response.
    pub fn custom_handler<F>(self, handler: F) -> Self
    where
        F: Fn(Request<Bytes>) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.update(|c| c.custom_handler = Some(handler))
    }
}

fn collect_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> HashMap<String, String>
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Stopping mock server on {} on drop", handle.url);
            handle.close();
        }
    }
}
