//! Requests seen by the fetch handler and the responses it produces.

use hashbrown::HashMap;
use http::Method;
use url::Url;

/// What the requested resource will be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// `fetch()` / XHR: the empty destination.
    #[default]
    Empty,
    Document,
    Image,
    Style,
    Script,
    Font,
    Manifest,
    Worker,
    Other,
}

impl Destination {
    /// Parse a destination string as reported by the host.
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "fetch" => Self::Empty,
            "document" => Self::Document,
            "image" => Self::Image,
            "style" => Self::Style,
            "script" => Self::Script,
            "font" => Self::Font,
            "manifest" => Self::Manifest,
            "worker" => Self::Worker,
            _ => Self::Other,
        }
    }

    /// Sub-resources served cache-first.
    pub fn is_static_subresource(&self) -> bool {
        matches!(self, Self::Image | Self::Style | Self::Script | Self::Font)
    }
}

/// Request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// HTTP cache mode of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub destination: Destination,
    pub mode: RequestMode,
    pub cache: CacheMode,
}

impl Request {
    /// Create a GET request with the empty destination.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            destination: Destination::Empty,
            mode: RequestMode::Cors,
            cache: CacheMode::Default,
        }
    }

    /// Create a top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self {
            destination: Destination::Document,
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_cache_mode(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Whether this loads an HTML document.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.destination == Destination::Document
    }

    /// Key under which the response is stored: the URL without fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// Whether the request targets `origin`.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}

/// Response tainting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Same-origin.
    #[default]
    Basic,
    Cors,
    /// Cross-origin no-cors; status and body are hidden.
    Opaque,
    Error,
}

/// A response handed back to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub response_type: ResponseType,
    /// Served from a cache store rather than the network.
    pub from_cache: bool,
}

impl Response {
    /// Create a same-origin response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text(status).to_string(),
            headers: HashMap::new(),
            body: body.into(),
            response_type: ResponseType::Basic,
            from_cache: false,
        }
    }

    /// Create a `200 OK` response.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    /// Create a `text/plain` response.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status, body.as_bytes()).with_header("Content-Type", "text/plain")
    }

    /// Synthesized reply when neither cache nor network can answer.
    pub fn offline() -> Self {
        Self::text(503, "Offline")
    }

    /// Synthesized reply for a navigation with no fallback page.
    pub fn app_unavailable() -> Self {
        Self::text(503, "App unavailable. Please reload when online.")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Exactly 200 and readable, i.e. not opaque.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type != ResponseType::Opaque
    }

    /// Exactly 200 and same-origin.
    pub fn is_same_origin_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    /// Body as UTF-8 text, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn status_text(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}
