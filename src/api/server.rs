//! HTTP/1.1 server for the discovery API.

use super::discovery::{ProxyDirectory, ProxyInfo, ProxyQuery};
use super::error::ApiError;
use crate::config::ApiSettings;
use crate::store::ConfigStore;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rand::prelude::IndexedRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

type ApiResponse = Response<BoxBody<Bytes, hyper::Error>>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

const USAGE: &str = "\
proxy-fleet discovery API

GET /api/proxies    list local HTTP proxies
    limit=N         consider at most N config files (0 = all)
    filter=PATTERN  regex on the file name, or exact names joined by |
    check=1         probe each proxy with a TCP connect
    format=json     JSON instead of one host:port per line

GET /api/proxy      a single proxy, the first one by default
    random=1        pick one at random
    format=json     JSON instead of host:port
";

/// Response body encoding requested by `format=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// One `host:port` per line.
    #[default]
    Text,
    /// JSON objects.
    Json,
}

impl ResponseFormat {
    /// Parse a `format` parameter. Anything but `json` means text.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Serves the discovery API until shutdown is signalled.
pub struct ApiServer {
    directory: Arc<ProxyDirectory>,
    host: String,
    port: u16,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiServer {
    /// Create a server over a config store.
    pub fn new(store: ConfigStore, settings: &ApiSettings, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            directory: Arc::new(ProxyDirectory::new(store, settings.check_timeout())),
            host: settings.host.clone(),
            port: settings.port,
            shutdown_rx,
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ApiError> {
        TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| ApiError::Bind {
                addr: format!("{}:{}", self.host, self.port),
                source: e,
            })
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> Result<(), ApiError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve(mut self, listener: TcpListener) -> Result<(), ApiError> {
        let local = listener.local_addr()?;
        info!("Discovery API listening on http://{}", local);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!("API connection from {}", peer);
                            let directory = Arc::clone(&self.directory);
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, directory).await {
                                    debug!("API connection ended: {}", e);
                                }
                            });
                        }
                        Err(e) => warn!("Accept failed: {}", e),
                    }
                }
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Discovery API stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    directory: Arc<ProxyDirectory>,
) -> Result<(), ApiError> {
    let service = service_fn(move |req: Request<Incoming>| {
        let directory = Arc::clone(&directory);
        async move { Ok::<_, Infallible>(handle(req, &directory).await) }
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
        .map_err(ApiError::from)
}

async fn handle(req: Request<Incoming>, directory: &ProxyDirectory) -> ApiResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let params = parse_query(req.uri().query().unwrap_or(""));
    debug!("{} {}", method, req.uri());
    route(&method, &path, &params, directory).await
}

/// Dispatch one request.
async fn route(
    method: &Method,
    path: &str,
    params: &HashMap<String, String>,
    directory: &ProxyDirectory,
) -> ApiResponse {
    if !matches!(path, "/" | "/api/proxies" | "/api/proxy") {
        return text_response(StatusCode::NOT_FOUND, "Not found".to_string());
    }
    if method != Method::GET {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string());
    }

    let format = ResponseFormat::from_param(params.get("format").map(String::as_str));
    match path {
        "/api/proxies" => list_proxies(params, format, directory).await,
        "/api/proxy" => one_proxy(params, format, directory).await,
        _ => text_response(StatusCode::OK, USAGE.to_string()),
    }
}

async fn list_proxies(
    params: &HashMap<String, String>,
    format: ResponseFormat,
    directory: &ProxyDirectory,
) -> ApiResponse {
    let limit = match params.get("limit").map(|v| v.trim()) {
        None | Some("") => 0,
        Some(v) => match v.parse::<usize>() {
            Ok(limit) => limit,
            Err(_) => {
                let message = format!("Invalid limit: {}", v);
                return error_response(StatusCode::BAD_REQUEST, &message, format);
            }
        },
    };
    let query = ProxyQuery {
        limit,
        filter: params.get("filter").filter(|f| !f.is_empty()).cloned(),
        check: params.get("check").is_some_and(|v| v == "1"),
    };

    let proxies = directory.list(&query).await;
    if proxies.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "No matching proxies", format);
    }

    match format {
        ResponseFormat::Json => json_response(&proxies),
        ResponseFormat::Text => {
            let lines: Vec<String> = proxies.iter().map(ProxyInfo::address).collect();
            text_response(StatusCode::OK, lines.join("\n"))
        }
    }
}

async fn one_proxy(
    params: &HashMap<String, String>,
    format: ResponseFormat,
    directory: &ProxyDirectory,
) -> ApiResponse {
    let proxies = directory.list(&ProxyQuery::default()).await;
    let random = params.get("random").is_some_and(|v| v == "1");

    let chosen = if random {
        proxies.choose(&mut rand::rng())
    } else {
        proxies.first()
    };
    let Some(proxy) = chosen else {
        return error_response(StatusCode::NOT_FOUND, "No proxies available", format);
    };

    match format {
        ResponseFormat::Json => json_response(proxy),
        ResponseFormat::Text => text_response(StatusCode::OK, proxy.address()),
    }
}

/// Decode a query string into its last value per key.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Create a response body with content.
fn full_body(content: String) -> BoxBody<Bytes, hyper::Error> {
    Full::new(Bytes::from(content))
        .map_err(|never| match never {})
        .boxed()
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> ApiResponse {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text_response(status: StatusCode, body: String) -> ApiResponse {
    response(status, TEXT_PLAIN, body)
}

fn json_response<T: Serialize + ?Sized>(value: &T) -> ApiResponse {
    match serde_json::to_string(value) {
        Ok(body) => response(StatusCode::OK, APPLICATION_JSON, body),
        Err(e) => {
            warn!("Failed to encode response: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str, format: ResponseFormat) -> ApiResponse {
    match format {
        ResponseFormat::Json => {
            let body = serde_json::json!({ "error": message }).to_string();
            response(status, APPLICATION_JSON, body)
        }
        ResponseFormat::Text => text_response(status, message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn directory_with(configs: &[(&str, &str)]) -> (TempDir, ProxyDirectory) {
        let dir = tempdir().unwrap();
        for (name, body) in configs {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let directory = ProxyDirectory::new(ConfigStore::new(dir.path()), Duration::from_millis(200));
        (dir, directory)
    }

    fn two_proxies() -> (TempDir, ProxyDirectory) {
        directory_with(&[
            ("a.json", r#"{"name": "A", "http": {"listen": "127.0.0.1:9001"}}"#),
            ("b.json", r#"{"name": "B", "http": {"listen": "127.0.0.1:9002"}}"#),
        ])
    }

    fn params(query: &str) -> HashMap<String, String> {
        parse_query(query)
    }

    async fn body_of(response: ApiResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_parse_query_decodes() {
        let p = params("filter=hk%7Cjp&limit=2&name=a+b&flag");
        assert_eq!(p["filter"], "hk|jp");
        assert_eq!(p["limit"], "2");
        assert_eq!(p["name"], "a b");
        assert_eq!(p["flag"], "");
        assert!(params("").is_empty());
    }

    #[test]
    fn test_response_format() {
        assert_eq!(ResponseFormat::from_param(None), ResponseFormat::Text);
        assert_eq!(ResponseFormat::from_param(Some("JSON")), ResponseFormat::Json);
        assert_eq!(ResponseFormat::from_param(Some("xml")), ResponseFormat::Text);
    }

    #[tokio::test]
    async fn test_index() {
        let (_dir, directory) = two_proxies();
        let response = route(&Method::GET, "/", &params(""), &directory).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_of(response).await.contains("/api/proxies"));
    }

    #[tokio::test]
    async fn test_proxies_text() {
        let (_dir, directory) = two_proxies();
        let response = route(&Method::GET, "/api/proxies", &params(""), &directory).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(body_of(response).await, "127.0.0.1:9001\n127.0.0.1:9002");
    }

    #[tokio::test]
    async fn test_proxies_json_with_limit() {
        let (_dir, directory) = two_proxies();
        let response = route(
            &Method::GET,
            "/api/proxies",
            &params("format=json&limit=1"),
            &directory,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body_of(response).await).unwrap();
        let list = value.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["url"], "http://127.0.0.1:9001");
        assert!(list[0].get("available").is_none());
    }

    #[tokio::test]
    async fn test_proxies_invalid_limit() {
        let (_dir, directory) = two_proxies();
        let response = route(&Method::GET, "/api/proxies", &params("limit=many"), &directory).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_proxies_empty_is_not_found() {
        let (_dir, directory) = directory_with(&[]);
        let response = route(&Method::GET, "/api/proxies", &params("format=json"), &directory).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let value: serde_json::Value = serde_json::from_str(&body_of(response).await).unwrap();
        assert!(value["error"].is_string());

        let response = route(&Method::GET, "/api/proxies", &params(""), &directory).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN);
    }

    #[tokio::test]
    async fn test_single_proxy() {
        let (_dir, directory) = two_proxies();
        let response = route(&Method::GET, "/api/proxy", &params(""), &directory).await;
        assert_eq!(body_of(response).await, "127.0.0.1:9001");

        let response = route(&Method::GET, "/api/proxy", &params("random=1&format=json"), &directory).await;
        let value: serde_json::Value = serde_json::from_str(&body_of(response).await).unwrap();
        assert!(["A", "B"].contains(&value["name"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_single_proxy_none() {
        let (_dir, directory) = directory_with(&[]);
        let response = route(&Method::GET, "/api/proxy", &params(""), &directory).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let (_dir, directory) = two_proxies();
        let response = route(&Method::GET, "/nope", &params(""), &directory).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = route(&Method::POST, "/api/proxies", &params(""), &directory).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (dir, _) = two_proxies();
        let settings = ApiSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            check_timeout_ms: 200,
        };
        let (tx, rx) = watch::channel(false);
        let server = ApiServer::new(ConfigStore::new(dir.path()), &settings, rx);
        let listener = server.bind().await.unwrap();
        let task = tokio::spawn(server.serve(listener));

        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
