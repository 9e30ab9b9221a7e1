//! Request object model
//!
//! [`ApiRequest`] is what the executor drives: it submits one attempt through
//! the transport and exposes the collaborators used on completion (parser,
//! unsuccessful-response handler, redirect policy, interceptor).
//! [`ClientRequest`] is the stock implementation over an [`HttpTransport`].

use bridge_traits::{
    error::{BridgeError, Result},
    DeferredResponse, HeaderList, HttpContent, HttpMethod, HttpRequest, HttpTransport,
    ResponseEnvelope,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::parser::{JsonObjectParser, ObjectParser};

/// Mutates a request before it is sent. Also invoked once more when the
/// response arrives, so credentials can be refreshed between attempts.
pub trait ExecuteInterceptor: Send + Sync {
    fn intercept(&self, request: &mut HttpRequest) -> Result<()>;
}

/// Gets a chance to recover from a non-2xx response.
///
/// Returns `true` when the failure was handled and another attempt may
/// succeed (for instance after refreshing an expired token). It is called on
/// every unsuccessful response, including the last one.
pub trait UnsuccessfulResponseHandler: Send + Sync {
    fn handle_response(
        &self,
        request: &HttpRequest,
        response: &ResponseEnvelope,
        supports_retry: bool,
    ) -> Result<bool>;
}

/// One submitted attempt: the request as sent and its unresolved response.
#[derive(Debug)]
pub struct Submission {
    pub request: HttpRequest,
    pub response: DeferredResponse,
}

/// A logical API call that the executor can submit, possibly twice.
pub trait ApiRequest: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Build and submit one attempt. Never waits for the network.
    ///
    /// `redirect` is the target accepted on this call's previous attempt, if
    /// any. The request itself is never changed by a submission.
    fn execute_unparsed(&self, redirect: Option<&Redirect>) -> Result<Submission>;

    fn parser(&self) -> &dyn ObjectParser<Self::Output>;

    fn unsuccessful_response_handler(&self) -> Option<&dyn UnsuccessfulResponseHandler> {
        None
    }

    /// Where to send the next attempt if `status` is a redirect this request
    /// follows. `sent` is the attempt that received the response.
    fn handle_redirect(
        &self,
        _sent: &HttpRequest,
        _status: u16,
        _headers: &HeaderList,
    ) -> Option<Redirect> {
        None
    }

    fn interceptor(&self) -> Option<&dyn ExecuteInterceptor> {
        None
    }
}

/// Whether `status` is a redirect that carries a `Location`.
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Redirect accepted for one logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
    /// 303: the next attempt is a GET without content
    pub see_other: bool,
}

/// Request built on an [`HttpTransport`].
pub struct ClientRequest<T> {
    transport: Arc<dyn HttpTransport>,
    method: HttpMethod,
    url: String,
    headers: HeaderList,
    content: Option<HttpContent>,
    timeout: Option<Duration>,
    follow_redirects: bool,
    parser: Arc<dyn ObjectParser<T>>,
    interceptor: Option<Arc<dyn ExecuteInterceptor>>,
    unsuccessful_response_handler: Option<Arc<dyn UnsuccessfulResponseHandler>>,
}

impl<T: DeserializeOwned + 'static> ClientRequest<T> {
    /// Builder for a request whose response is parsed as JSON.
    pub fn builder(
        transport: Arc<dyn HttpTransport>,
        method: HttpMethod,
        url: impl Into<String>,
    ) -> ClientRequestBuilder<T> {
        ClientRequestBuilder::with_parser(transport, method, url, Arc::new(JsonObjectParser))
    }
}

impl<T> ClientRequest<T> {
    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request of an attempt, before interception.
    fn next_request(&self, redirect: Option<&Redirect>) -> HttpRequest {
        let mut request = HttpRequest::new(self.method.clone(), self.url.clone());
        request.headers = self.headers.clone();
        request.content = self.content.clone();
        request.timeout = self.timeout;

        if let Some(target) = redirect {
            request.url = target.url.clone();
            // credentials are not carried to another location unless re-applied
            request.headers.remove("Authorization");
            if target.see_other {
                request.method = HttpMethod::Get;
                request.content = None;
                request.headers.remove("Content-Type");
            }
        }

        request
    }
}

impl<T: Send + 'static> ApiRequest for ClientRequest<T> {
    type Output = T;

    fn execute_unparsed(&self, redirect: Option<&Redirect>) -> Result<Submission> {
        let mut request = self.next_request(redirect);

        if let Some(interceptor) = &self.interceptor {
            interceptor.intercept(&mut request)?;
        }

        let mut low_level = self.transport.build_request(&request.method, &request.url)?;
        for (name, value) in request.headers.iter() {
            low_level.add_header(name, value)?;
        }
        if let Some(content) = &request.content {
            low_level.set_content(content.clone());
        }
        if let Some(timeout) = request.timeout {
            low_level.set_timeout(timeout);
        }

        let response = low_level.execute()?;
        Ok(Submission { request, response })
    }

    fn parser(&self) -> &dyn ObjectParser<T> {
        self.parser.as_ref()
    }

    fn unsuccessful_response_handler(&self) -> Option<&dyn UnsuccessfulResponseHandler> {
        self.unsuccessful_response_handler.as_deref()
    }

    fn handle_redirect(
        &self,
        sent: &HttpRequest,
        status: u16,
        headers: &HeaderList,
    ) -> Option<Redirect> {
        if !self.follow_redirects || !is_redirect(status) {
            return None;
        }
        let location = headers.get("Location")?;

        let target = match Url::parse(&sent.url).and_then(|base| base.join(location.trim())) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, location, "Ignoring redirect with invalid location");
                return None;
            }
        };

        debug!(status, from = %sent.url, to = %target, "Following redirect");
        Some(Redirect {
            url: target.into(),
            see_other: status == 303,
        })
    }

    fn interceptor(&self) -> Option<&dyn ExecuteInterceptor> {
        self.interceptor.as_deref()
    }
}

impl<T> fmt::Debug for ClientRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("follow_redirects", &self.follow_redirects)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientRequest`].
pub struct ClientRequestBuilder<T> {
    transport: Arc<dyn HttpTransport>,
    method: HttpMethod,
    url: String,
    headers: HeaderList,
    content: Option<HttpContent>,
    timeout: Option<Duration>,
    follow_redirects: bool,
    accept_gzip: bool,
    user_agent: Option<String>,
    parser: Arc<dyn ObjectParser<T>>,
    interceptor: Option<Arc<dyn ExecuteInterceptor>>,
    unsuccessful_response_handler: Option<Arc<dyn UnsuccessfulResponseHandler>>,
}

impl<T> ClientRequestBuilder<T> {
    pub fn with_parser(
        transport: Arc<dyn HttpTransport>,
        method: HttpMethod,
        url: impl Into<String>,
        parser: Arc<dyn ObjectParser<T>>,
    ) -> Self {
        Self {
            transport,
            method,
            url: url.into(),
            headers: HeaderList::new(),
            content: None,
            timeout: None,
            follow_redirects: true,
            accept_gzip: true,
            user_agent: None,
            parser,
            interceptor: None,
            unsuccessful_response_handler: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn content(mut self, content: HttpContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Advertise `Accept-Encoding: gzip` (on by default).
    pub fn accept_gzip(mut self, accept: bool) -> Self {
        self.accept_gzip = accept;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ObjectParser<T>>) -> Self {
        self.parser = parser;
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn ExecuteInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn unsuccessful_response_handler(
        mut self,
        handler: Arc<dyn UnsuccessfulResponseHandler>,
    ) -> Self {
        self.unsuccessful_response_handler = Some(handler);
        self
    }

    /// Validate and build the request.
    pub fn build(self) -> Result<ClientRequest<T>> {
        Url::parse(&self.url)
            .map_err(|e| BridgeError::InvalidRequest(format!("Invalid URL {:?}: {}", self.url, e)))?;

        if self.content.is_some() && !self.method.permits_content() {
            return Err(BridgeError::InvalidRequest(format!(
                "{} requests cannot carry content",
                self.method
            )));
        }

        let mut headers = self.headers;
        if self.accept_gzip && !headers.contains("Accept-Encoding") {
            headers.append("Accept-Encoding", "gzip");
        }
        if let Some(user_agent) = self.user_agent {
            headers.set("User-Agent", user_agent);
        }

        Ok(ClientRequest {
            transport: self.transport,
            method: self.method,
            url: self.url,
            headers,
            content: self.content,
            timeout: self.timeout,
            follow_redirects: self.follow_redirects,
            parser: self.parser,
            interceptor: self.interceptor,
            unsuccessful_response_handler: self.unsuccessful_response_handler,
        })
    }
}
