use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use hcp_models::{CorrelationData, SystemData};
use std::sync::{Arc, Mutex};

/// Headers written after a transaction commits and copied onto the
/// response by the handler.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders(Arc<Mutex<HeaderMap>>);

impl ResponseHeaders {
    pub fn insert(&self, name: HeaderName, value: HeaderValue) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, value);
    }

    pub fn snapshot(&self) -> HeaderMap {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Caller identity and request metadata threaded through one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub api_version: String,
    /// Full URL the resource manager forwarded; base for polling URLs.
    pub referer: Option<String>,
    pub tenant_id: String,
    pub client_id: String,
    pub notification_uri: String,
    pub system_data: Option<SystemData>,
    pub correlation: CorrelationData,
    pub headers: ResponseHeaders,
}

impl RequestContext {
    pub fn new(method: Method, api_version: &str) -> Self {
        Self {
            method,
            api_version: api_version.to_string(),
            referer: None,
            tenant_id: String::new(),
            client_id: String::new(),
            notification_uri: String::new(),
            system_data: None,
            correlation: CorrelationData::new("", ""),
            headers: ResponseHeaders::default(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = tenant_id.to_string();
        self
    }

    pub fn with_client(mut self, client_id: &str) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn with_notification_uri(mut self, uri: &str) -> Self {
        self.notification_uri = uri.to_string();
        self
    }

    /// Request id assigned to this request; echoed as `x-ms-request-id`.
    pub fn request_id(&self) -> &str {
        &self.correlation.request_id
    }
}
