//! HTTP transport binding.
//!
//! Accepts connections, decodes requests into [`SynthRequest`] values,
//! applies the rate-limit admission check, and encodes orchestrator results
//! back onto the wire. One task per connection.

use crate::handler::{RequestOrchestrator, SynthRequest, SynthResponse};
use crate::rate_limit::{admission_key, RateLimiter};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub struct Server {
    orchestrator: Arc<RequestOrchestrator>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl Server {
    pub fn new(
        orchestrator: Arc<RequestOrchestrator>,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            orchestrator,
            rate_limiter,
        }
    }

    /// Accept loop; returns on ctrl-c.
    pub async fn run(self, addr: SocketAddr) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {addr}");

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    return Ok(());
                }
            };
            let (stream, client_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };

            let orchestrator = self.orchestrator.clone();
            let rate_limiter = self.rate_limiter.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    handle(req, orchestrator.clone(), rate_limiter.clone(), client_addr)
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("connection error from {client_addr}: {e}");
                }
            });
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    orchestrator: Arc<RequestOrchestrator>,
    rate_limiter: Option<Arc<RateLimiter>>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    if method == "GET" && path == "/health" {
        return Ok(json_response(200, r#"{"status":"ok"}"#.to_string()));
    }

    if let Some(limiter) = &rate_limiter {
        if !limiter.check(&admission_key(&client_addr.ip().to_string(), &path)) {
            warn!("rate limit exceeded for {client_addr} on {path}");
            return Ok(json_response(
                429,
                r#"{"error":"rate limit exceeded"}"#.to_string(),
            ));
        }
    }

    let query = parse_query(req.uri().query());
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_lowercase(), value.to_string()))
        })
        .collect();

    let body = match req.into_body().collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).to_string(),
        Err(e) => {
            warn!("failed to read request body from {client_addr}: {e}");
            String::new()
        }
    };

    let request = SynthRequest {
        method,
        path,
        query,
        headers,
        body,
    };
    let response = orchestrator.process(request).await;
    Ok(encode(response))
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let key = urlencoding::decode(key).unwrap_or_default().to_string();
                let value = urlencoding::decode(value).unwrap_or_default().to_string();
                params.insert(key, value);
            } else if !pair.is_empty() {
                let key = urlencoding::decode(pair).unwrap_or_default().to_string();
                params.insert(key, String::new());
            }
        }
    }
    params
}

fn encode(response: SynthResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );

    if let Some(location) = &response.location {
        builder = builder.header(hyper::header::LOCATION, location);
    }

    let bytes = match &response.body {
        Some(value) => {
            builder = builder.header(
                hyper::header::CONTENT_TYPE,
                if response.content_type.is_empty() {
                    "application/json"
                } else {
                    response.content_type.as_str()
                },
            );
            Bytes::from(value.to_string())
        }
        None => Bytes::new(),
    };

    builder
        .body(Full::new(bytes))
        .unwrap_or_else(|_| fallback_response())
}

fn json_response(status: u16, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| fallback_response())
}

fn fallback_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from("response build error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::SynthResponse;
    use serde_json::json;

    #[test]
    fn test_parse_query_decodes_values() {
        let params = parse_query(Some("name=New%20York&flag&n=3"));
        assert_eq!(params["name"], "New York");
        assert_eq!(params["flag"], "");
        assert_eq!(params["n"], "3");
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_parse_query_decodes_keys() {
        let params = parse_query(Some("user%20name=ann&tag%2Bid=7&lone%20flag"));
        assert_eq!(params["user name"], "ann");
        assert_eq!(params["tag+id"], "7");
        assert_eq!(params["lone flag"], "");
    }

    #[test]
    fn test_encode_json_body() {
        let encoded = encode(SynthResponse::json(200, "application/json", json!({"a": 1})));
        assert_eq!(encoded.status(), StatusCode::OK);
        assert_eq!(
            encoded.headers()[hyper::header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[test]
    fn test_encode_redirect_sets_location() {
        let encoded = encode(SynthResponse::redirect("https://x/cb?a=1".to_string()));
        assert_eq!(encoded.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(encoded.headers()[hyper::header::LOCATION], "https://x/cb?a=1");
    }

    #[test]
    fn test_encode_no_content_has_no_body_headers() {
        let encoded = encode(SynthResponse::no_content());
        assert_eq!(encoded.status(), StatusCode::NO_CONTENT);
        assert!(encoded.headers().get(hyper::header::CONTENT_TYPE).is_none());
    }
}
