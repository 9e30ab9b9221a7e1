//! HTTP Transport Implementation using Reqwest
//!
//! The engine is a dedicated multi-thread Tokio runtime plus a
//! `reqwest::Client`. It is started on the first `build_request` and torn
//! down by `shutdown` (or when the transport is dropped).

use bridge_traits::{
    error::{BridgeError, Result},
    http::{HeaderList, HttpContent, HttpMethod, ResponseContent, ResponseEnvelope},
    transport::{
        DeferredResponse, HttpTransport, LowLevelRequest, PendingExchange, ResponseCallback,
    },
};
use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use std::io::{self, BufWriter, Write};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;

/// Chunks buffered between the body writer and the connection
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Size of the chunks handed to the connection
const BODY_CHUNK_SIZE: usize = 16 * 1024;

enum EngineState {
    Idle { client: Option<Client> },
    Running(Engine),
    ShutDown,
}

struct Engine {
    runtime: Runtime,
    client: Client,
}

/// Reqwest-based non-blocking transport
///
/// Provides:
/// - Lazy engine start on first request (idempotent)
/// - Streamed request bodies, fixed-length or chunked
/// - Streamed response bodies readable from the completion callback
/// - Cancellation through the exchange's token
///
/// Redirects and content decoding are left to the caller: the client never
/// follows a redirect or decompresses a body on its own.
pub struct ReqwestTransport {
    config: TransportConfig,
    state: Mutex<EngineState>,
}

impl ReqwestTransport {
    /// Create a transport with the default configuration
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
            state: Mutex::new(EngineState::Idle { client: None }),
        }
    }

    /// Create a transport with a validated custom configuration
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(EngineState::Idle { client: None }),
        })
    }

    /// Create a transport around a preconfigured client.
    ///
    /// The client should disable redirects and automatic decompression,
    /// otherwise the execution bridge never sees those responses.
    pub fn with_client(config: TransportConfig, client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(EngineState::Idle {
                client: Some(client),
            }),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Whether the engine has been started and not shut down yet
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .map(|state| matches!(*state, EngineState::Running(_)))
            .unwrap_or(false)
    }

    /// Start the engine if needed and return handles to it
    fn engine(&self) -> Result<(Handle, Client)> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BridgeError::OperationFailed("transport state lock poisoned".to_string()))?;

        if let EngineState::Idle { client } = &mut *state {
            let engine = self.start(client.take())?;
            *state = EngineState::Running(engine);
        }

        match &*state {
            EngineState::Running(engine) => Ok((engine.runtime.handle().clone(), engine.client.clone())),
            EngineState::ShutDown => Err(BridgeError::ShutDown),
            EngineState::Idle { .. } => Err(BridgeError::OperationFailed(
                "HTTP engine failed to start".to_string(),
            )),
        }
    }

    fn start(&self, client: Option<Client>) -> Result<Engine> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .thread_name("nio-bridge-engine")
            .enable_all()
            .build()?;

        let client = match client {
            Some(client) => client,
            None => {
                let _guard = runtime.enter();
                Self::build_client(&self.config)?
            }
        };

        info!(
            worker_threads = self.config.worker_threads,
            "Started HTTP engine"
        );

        Ok(Engine { runtime, client })
    }

    fn build_client(config: &TransportConfig) -> Result<Client> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none());

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: &HttpMethod) -> Result<reqwest::Method> {
        Ok(match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Trace => reqwest::Method::TRACE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Extension(name) => reqwest::Method::from_bytes(name.as_bytes())
                .map_err(|_| BridgeError::InvalidRequest(format!("Invalid method name: {:?}", name)))?,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn build_request(&self, method: &HttpMethod, url: &str) -> Result<Box<dyn LowLevelRequest>> {
        let (handle, client) = self.engine()?;
        let reqwest_method = Self::convert_method(method)?;
        let url = reqwest::Url::parse(url)
            .map_err(|e| BridgeError::InvalidRequest(format!("Invalid URL {:?}: {}", url, e)))?;

        Ok(Box::new(ReqwestLowLevelRequest {
            handle,
            client,
            method: method.clone(),
            reqwest_method,
            url,
            headers: HeaderList::new(),
            content: None,
            timeout: None,
        }))
    }

    fn shutdown(&self) -> Result<()> {
        let previous = {
            let mut state = self.state.lock().map_err(|_| {
                BridgeError::OperationFailed("transport state lock poisoned".to_string())
            })?;
            std::mem::replace(&mut *state, EngineState::ShutDown)
        };

        if let EngineState::Running(Engine { runtime, client }) = previous {
            drop(client);
            // Blocking on the runtime from inside an async context would panic.
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(self.config.shutdown_grace);
            }
            info!("HTTP engine shut down");
        }

        Ok(())
    }
}

impl Drop for ReqwestTransport {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Failed to shut down HTTP engine");
        }
    }
}

struct ReqwestLowLevelRequest {
    handle: Handle,
    client: Client,
    method: HttpMethod,
    reqwest_method: reqwest::Method,
    url: reqwest::Url,
    headers: HeaderList,
    content: Option<HttpContent>,
    timeout: Option<Duration>,
}

impl LowLevelRequest for ReqwestLowLevelRequest {
    fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| BridgeError::InvalidRequest(format!("Invalid header name: {:?}", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            BridgeError::InvalidRequest(format!("Invalid value for header {}", name))
        })?;
        self.headers.append(name, value);
        Ok(())
    }

    fn set_content(&mut self, content: HttpContent) {
        self.content = Some(content);
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    fn execute(self: Box<Self>) -> Result<DeferredResponse> {
        let this = *self;

        if this.content.is_some() && !this.method.permits_content() {
            return Err(BridgeError::InvalidRequest(format!(
                "{} requests cannot carry content",
                this.method
            )));
        }

        let mut builder = this
            .client
            .request(this.reqwest_method, this.url.clone());

        for (name, value) in this.headers.iter() {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = this.timeout {
            builder = builder.timeout(timeout);
        }

        let mut body = None;
        if let Some(content) = this.content {
            let (sender, receiver) = mpsc::channel::<io::Result<Bytes>>(BODY_CHANNEL_CAPACITY);
            let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
                receiver.recv().await.map(|chunk| (chunk, receiver))
            });
            builder = builder.body(reqwest::Body::wrap_stream(stream));

            if let Some(length) = content.length {
                builder = builder.header(CONTENT_LENGTH, length);
            }
            if let Some(content_type) = &content.content_type {
                if !this.headers.contains("Content-Type") {
                    builder = builder.header(CONTENT_TYPE, content_type.as_str());
                }
            }

            body = Some(BodyProducer { content, sender });
        }

        let request = builder
            .build()
            .map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;

        Ok(DeferredResponse::new(
            this.method,
            this.url.as_str(),
            Box::new(ReqwestExchange {
                handle: this.handle,
                client: this.client,
                request,
                body,
            }),
        ))
    }
}

/// Writes the request content into the body channel from a blocking thread
struct BodyProducer {
    content: HttpContent,
    sender: mpsc::Sender<io::Result<Bytes>>,
}

impl BodyProducer {
    fn produce(self) {
        let mut writer = BufWriter::with_capacity(
            BODY_CHUNK_SIZE,
            ChannelWriter {
                sender: self.sender.clone(),
            },
        );

        let result = self
            .content
            .content
            .write_to(&mut writer)
            .and_then(|()| writer.flush());

        if let Err(e) = result {
            warn!(error = %e, "Failed to write request content");
            let _ = self.sender.blocking_send(Err(e));
        }
    }
}

struct ChannelWriter {
    sender: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body receiver dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ReqwestExchange {
    handle: Handle,
    client: Client,
    request: reqwest::Request,
    body: Option<BodyProducer>,
}

impl PendingExchange for ReqwestExchange {
    fn dispatch(self: Box<Self>, callback: ResponseCallback, cancel: CancellationToken) {
        let ReqwestExchange {
            handle,
            client,
            request,
            body,
        } = *self;

        let method = request.method().clone();
        let url = request.url().clone();

        if let Some(body) = body {
            handle.spawn_blocking(move || body.produce());
        }

        let blocking = handle.clone();
        handle.spawn(async move {
            debug!(%method, %url, "Dispatching HTTP request");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = client.execute(request) => Some(result),
            };

            match result {
                None => {
                    debug!(%method, %url, "HTTP request cancelled");
                    callback.cancelled();
                }
                Some(Err(e)) => {
                    warn!(error = %e, %method, %url, "HTTP request failed");
                    callback.failed(map_reqwest_error(e));
                }
                Some(Ok(response)) => {
                    debug!(status = response.status().as_u16(), %url, "HTTP response received");
                    let envelope = into_envelope(response, blocking.clone());
                    // Completion handlers read the body synchronously.
                    if let Err(e) = blocking
                        .spawn_blocking(move || callback.completed(envelope))
                        .await
                    {
                        warn!(error = %e, %url, "Response callback panicked");
                    }
                }
            }
        });
    }
}

/// Wrap a reqwest response as an envelope whose body is read synchronously.
///
/// Header order follows `HeaderMap` iteration: values of one name keep the
/// order they arrived in, but all of them are grouped at the position of the
/// name's first occurrence, so `A, B, A` becomes `A, A, B`. The reason
/// phrase is the canonical one for the status code; a custom phrase on the
/// status line is not preserved, and unregistered codes have none.
fn into_envelope(response: reqwest::Response, handle: Handle) -> ResponseEnvelope {
    let status = response.status();
    let headers: HeaderList = response
        .headers()
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), header_text(name, value)))
        .collect();

    let stream = response.bytes_stream().map_err(io::Error::other);
    let reader = SyncIoBridge::new_with_handle(StreamReader::new(stream), handle);

    let envelope = ResponseEnvelope::new(status.as_u16(), headers, ResponseContent::new(reader));
    match status.canonical_reason() {
        Some(reason) => envelope.with_reason(reason),
        None => envelope,
    }
}

/// Header value as text. Bytes that are not UTF-8 become U+FFFD.
fn header_text(name: &HeaderName, value: &HeaderValue) -> String {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!(header = %name, "Header value is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Timeout
    } else if e.is_connect() {
        BridgeError::Connect(e.to_string())
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}
