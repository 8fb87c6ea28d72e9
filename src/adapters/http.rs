//! HTTP control surface.
//!
//! Request handling is split in two layers:
//!
//! - [`HttpApi`] routes a `(method, path, body)` triple to the domain and
//!   returns an [`HttpResponse`]. Pure logic, tested on the host.
//! - [`start_server`] (ESP-IDF only) registers one `EspHttpServer` handler
//!   per route, enforces the body cap from the declared length before
//!   reading, and writes the response back.
//!
//! ```text
//!   GET  /status ──▶ StatusDocument (JSON)
//!   POST /relay  ──▶ RelayService::apply_command
//!   POST /wifi   ──▶ ProvisionQueue ──▶ Bootstrap::reenter (worker)
//!   GET  /ota    ──▶ placeholder page
//!   POST /ota    ──▶ 501
//! ```

use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;

use crate::app::connectivity::ConnectivityMonitor;
use crate::app::credentials::NetworkCredentials;
use crate::app::ports::{Clock, SystemInfo};
use crate::app::service::RelayService;
use crate::app::status::StatusDocument;
use crate::error::CapacityError;
use crate::events::ProvisionQueue;

pub const CONTENT_TEXT: &str = "text/plain";
pub const CONTENT_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Every registered route.
pub const ROUTES: [(HttpMethod, &str); 5] = [
    (HttpMethod::Get, "/status"),
    (HttpMethod::Post, "/relay"),
    (HttpMethod::Post, "/wifi"),
    (HttpMethod::Get, "/ota"),
    (HttpMethod::Post, "/ota"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: CONTENT_TEXT,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn json(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_JSON,
            body,
        }
    }

    pub fn ok() -> Self {
        Self::text(200, "OK")
    }

    pub fn too_large(err: &CapacityError) -> Self {
        warn!("HTTP: rejecting body ({})", err);
        Self::text(413, "Payload too large")
    }

    /// Body as UTF-8, for logs and tests.
    pub fn body_str(&self) -> &str {
        core::str::from_utf8(&self.body).unwrap_or("")
    }
}

// ───────────────────────────────────────────────────────────────
// Credential submission form
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiFormError {
    InvalidJson,
    MissingField,
    Invalid(String),
}

/// Decode `{"ssid": "...", "password": "..."}`; `passphrase` is an alias.
pub fn parse_wifi_form(body: &[u8]) -> Result<NetworkCredentials, WifiFormError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| WifiFormError::InvalidJson)?;
    let ssid = value.get("ssid").and_then(Value::as_str);
    let password = value
        .get("password")
        .or_else(|| value.get("passphrase"))
        .and_then(Value::as_str);
    let (Some(ssid), Some(password)) = (ssid, password) else {
        return Err(WifiFormError::MissingField);
    };
    NetworkCredentials::new(ssid, password).map_err(|e| WifiFormError::Invalid(e.to_string()))
}

// ───────────────────────────────────────────────────────────────
// Router
// ───────────────────────────────────────────────────────────────

pub struct HttpApi {
    service: Arc<RelayService>,
    monitor: Arc<ConnectivityMonitor>,
    system: Arc<dyn SystemInfo>,
    clock: Arc<dyn Clock>,
    provisioning: Arc<ProvisionQueue>,
    max_body_bytes: usize,
}

impl HttpApi {
    pub fn new(
        service: Arc<RelayService>,
        monitor: Arc<ConnectivityMonitor>,
        system: Arc<dyn SystemInfo>,
        clock: Arc<dyn Clock>,
        provisioning: Arc<ProvisionQueue>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            service,
            monitor,
            system,
            clock,
            provisioning,
            max_body_bytes,
        }
    }

    /// Reject a declared body length before any of it is read.
    pub fn check_body_len(&self, declared: usize) -> Result<(), CapacityError> {
        if declared > self.max_body_bytes {
            return Err(CapacityError {
                limit: self.max_body_bytes,
                actual: declared,
            });
        }
        Ok(())
    }

    pub fn handle(&self, method: HttpMethod, uri: &str, body: &[u8]) -> HttpResponse {
        let path = uri.split_once('?').map_or(uri, |(p, _)| p);
        if method == HttpMethod::Post {
            if let Err(e) = self.check_body_len(body.len()) {
                return HttpResponse::too_large(&e);
            }
        }
        match (method, path) {
            (HttpMethod::Get, "/status") => self.status(),
            (HttpMethod::Post, "/relay") => self.relay(body),
            (HttpMethod::Post, "/wifi") => self.wifi(body),
            (HttpMethod::Get, "/ota") => HttpResponse::text(200, "OTA update page"),
            (HttpMethod::Post, "/ota") => HttpResponse::text(501, "OTA update not implemented yet"),
            _ => HttpResponse::text(404, "Not found"),
        }
    }

    fn status(&self) -> HttpResponse {
        let doc = StatusDocument::new(
            self.service.snapshot(),
            &self.monitor.snapshot(),
            self.system.free_heap(),
            self.clock.uptime_secs(),
        );
        HttpResponse::json(doc.to_json())
    }

    fn relay(&self, body: &[u8]) -> HttpResponse {
        match self.service.apply_command(body) {
            Ok(()) => HttpResponse::ok(),
            Err(e) => HttpResponse::text(400, &e.to_string()),
        }
    }

    fn wifi(&self, body: &[u8]) -> HttpResponse {
        let creds = match parse_wifi_form(body) {
            Ok(creds) => creds,
            Err(WifiFormError::InvalidJson) => return HttpResponse::text(400, "Invalid JSON"),
            Err(WifiFormError::MissingField) => {
                return HttpResponse::text(400, "Missing SSID or password")
            }
            Err(WifiFormError::Invalid(reason)) => return HttpResponse::text(400, &reason),
        };
        let ssid = creds.ssid.clone();
        if self.provisioning.try_send(creds).is_err() {
            warn!("HTTP: provisioning queue full, dropping submission for '{}'", ssid);
            return HttpResponse::text(503, "Provisioning busy, try again");
        }
        info!("HTTP: credentials for '{}' queued", ssid);
        HttpResponse::ok()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF server wiring
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn start_server(
    api: Arc<HttpApi>,
    cfg: &crate::config::HttpConfig,
) -> anyhow::Result<esp_idf_svc::http::server::EspHttpServer<'static>> {
    use esp_idf_svc::http::server::{Configuration, EspHttpServer};
    use esp_idf_svc::http::Method;
    use esp_idf_svc::io::{Read, Write};

    let conf = Configuration {
        http_port: cfg.port,
        stack_size: cfg.stack_size,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&conf)?;

    for (method, path) in ROUTES {
        let api = api.clone();
        let esp_method = match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
        };
        server.fn_handler::<anyhow::Error, _>(path, esp_method, move |mut req| {
            let response = if method == HttpMethod::Post {
                let declared = req.content_len().unwrap_or(0) as usize;
                match api.check_body_len(declared) {
                    Err(e) => HttpResponse::too_large(&e),
                    Ok(()) => {
                        let mut body = vec![0u8; declared];
                        if declared > 0 {
                            req.read_exact(&mut body)
                                .map_err(|e| anyhow::anyhow!("body read failed: {e:?}"))?;
                        }
                        api.handle(method, path, &body)
                    }
                }
            } else {
                api.handle(method, path, &[])
            };
            req.into_response(
                response.status,
                None,
                &[("Content-Type", response.content_type)],
            )?
            .write_all(&response.body)?;
            Ok(())
        })?;
    }

    info!("HTTP: server listening on port {}", cfg.port);
    Ok(server)
}
