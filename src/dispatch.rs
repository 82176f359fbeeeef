//! The thin HTTP method dispatcher: the one place that turns a request into
//! calls against the registry, waiter registry, translator and CORS policy.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use http_body_util::BodyExt;

use crate::app::Server;
use crate::body::CacheBody;
use crate::error::CacheError;
use crate::object::Object;
use crate::responder::Responder;
use crate::types::{Request, Response};

const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";

/// Entry point wired into the connection service in `server.rs`.
pub async fn dispatch(
    mut req: Request,
    server: Arc<Server>,
    _remote: SocketAddr,
) -> Result<Response, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match validate_name(&path) {
        Err(err) => {
            let mut res = err.into_response();
            server.cors.apply(&mut res);
            res
        }
        Ok(()) => route(&mut req, &method, &path, &server).await,
    };

    tracing::info!(%method, path = %path, status = %response.status(), "request completed");
    Ok(response)
}

async fn route(req: &mut Request, method: &Method, path: &str, server: &Arc<Server>) -> Response {
    match *method {
        Method::GET => handle_get(req, path, server).await,
        Method::HEAD => handle_head(path, server),
        Method::POST | Method::PUT => handle_post(req, path, server).await,
        Method::DELETE => handle_delete(path, server).await,
        Method::OPTIONS => handle_options(server),
        _ => method_not_allowed(),
    }
}

/// Rejects `..` path segments before they reach the registry or filesystem.
/// New hardening relative to the original implementation, which trusts the
/// URL path verbatim.
fn validate_name(path: &str) -> Result<(), CacheError> {
    if path.split('/').any(|segment| segment == "..") {
        return Err(CacheError::InvalidName(path.to_string()));
    }
    Ok(())
}

fn resolve_name(path: &str, server: &Server) -> String {
    if server.url_translator_enabled {
        server.translator.get_translated(path).0
    } else {
        path.to_string()
    }
}

async fn handle_get(req: &Request, path: &str, server: &Arc<Server>) -> Response {
    let resolved = resolve_name(path, server);

    let mut object = server.registry.lookup(&resolved);
    let mut waited_ms = None;

    if object.is_none() {
        if let Some(waiters) = &server.waiters {
            let (found, waited) = waiters.await_data(&resolved, req.headers()).await;
            waited_ms = Some(waited.as_millis());
            if found {
                object = server.registry.lookup(&resolved);
            }
        }
    }

    let Some(object) = object else {
        let mut res = CacheError::NotFound.into_response();
        if let Some(ms) = waited_ms {
            insert_waited_header(&mut res, ms);
        }
        server.cors.apply(&mut res);
        return res;
    };

    let body = match object.open_reader(&server.content_path).await {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(%error, path = %resolved, "failed to open object for read");
            let mut res = CacheError::Io(error).into_response();
            server.cors.apply(&mut res);
            return res;
        }
    };

    let mut res = Response::new(body);
    apply_object_headers(&mut res, &object);
    if let Some(ms) = waited_ms {
        insert_waited_header(&mut res, ms);
    }
    server.cors.apply(&mut res);
    res
}

fn handle_head(path: &str, server: &Arc<Server>) -> Response {
    let resolved = resolve_name(path, server);

    let Some(object) = server.registry.lookup(&resolved) else {
        let mut res = CacheError::NotFound.into_response();
        *res.body_mut() = CacheBody::empty();
        server.cors.apply(&mut res);
        return res;
    };

    let mut res = Response::new(CacheBody::empty());
    apply_object_headers(&mut res, &object);
    server.cors.apply(&mut res);
    res
}

async fn handle_post(req: &mut Request, path: &str, server: &Arc<Server>) -> Response {
    let max_age = parse_max_age(req.headers());
    let mut headers = req.headers().clone();
    headers.remove(header::USER_AGENT);

    let object = Object::new(path.to_string(), headers, max_age);
    server.registry.insert(path.to_string(), object.clone());
    tracing::debug!(path, max_age, "{}", crate::signals::ids::OBJECT_CREATED);

    let body = req.body_mut();
    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    object.write(&data);
                }
            }
            Some(Err(error)) => {
                tracing::debug!(%error, path, "client disconnected mid-upload");
                break;
            }
            None => break,
        }
    }
    object.close();
    tracing::debug!(path, "{}", crate::signals::ids::OBJECT_CLOSED);

    if !server.ram_only {
        if let Err(error) = object.write_to_disk(&server.content_path).await {
            tracing::error!(%error, path, "disk spill failed, serving from memory");
        }
    }

    if server.url_translator_enabled {
        let received_at_ms = parse_first_frame_clk(req.headers());
        server.translator.add_new_entry(path, received_at_ms);
    }

    if let Some(waiters) = &server.waiters {
        waiters.notify(path);
    }

    let mut res = Response::new(CacheBody::empty());
    *res.status_mut() = StatusCode::NO_CONTENT;
    server.cors.apply(&mut res);
    res
}

async fn handle_delete(path: &str, server: &Arc<Server>) -> Response {
    let resolved = resolve_name(path, server);
    if server.url_translator_enabled {
        server.translator.remove_entry(&resolved);
    }

    match server.registry.remove(&resolved) {
        Some(object) => {
            if object.is_on_disk() {
                if let Err(error) = object.remove_from_disk(&server.content_path).await {
                    tracing::error!(%error, path = %resolved, "failed to unlink object on delete");
                }
            }
            let mut res = Response::new(CacheBody::empty());
            *res.status_mut() = StatusCode::NO_CONTENT;
            server.cors.apply(&mut res);
            res
        }
        None => {
            let mut res = CacheError::NotFound.into_response();
            server.cors.apply(&mut res);
            res
        }
    }
}

fn handle_options(server: &Arc<Server>) -> Response {
    let mut res = Response::new(CacheBody::empty());
    *res.status_mut() = StatusCode::NO_CONTENT;
    res.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    server.cors.apply(&mut res);
    res
}

fn method_not_allowed() -> Response {
    let mut res = CacheError::MethodNotAllowed.into_response();
    res.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    res
}

fn apply_object_headers(res: &mut Response, object: &Object) {
    for (name, value) in object.headers().iter() {
        res.headers_mut().append(name, value.clone());
    }
    if !object.is_closed() {
        res.headers_mut().insert(
            header::TRANSFER_ENCODING,
            HeaderValue::from_static("chunked"),
        );
    }
}

fn insert_waited_header(res: &mut Response, ms: u128) {
    if let Ok(value) = HeaderValue::from_str(&ms.to_string()) {
        res.headers_mut()
            .insert(HeaderName::from_static("waited-for-data-ms"), value);
    }
}

/// Parses `Cache-Control: max-age=<int>`, defaulting to `-1` (no expiry) if
/// absent or malformed.
fn parse_max_age(headers: &HeaderMap) -> i64 {
    let Some(raw) = headers
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
    else {
        return -1;
    };

    let parsed = raw
        .split(';')
        .find_map(|part| part.trim().strip_prefix("max-age="))
        .and_then(|secs| secs.trim().parse::<i64>().ok());

    match parsed {
        Some(value) => value,
        None => {
            tracing::warn!(header = raw, "malformed Cache-Control, defaulting to no expiry");
            -1
        }
    }
}

/// Parses `Joc-First-Frame-Clk` (ms since Unix epoch), used by the
/// translator as the recorded `receivedAt` for this sequence id.
fn parse_first_frame_clk(headers: &HeaderMap) -> Option<i64> {
    let raw = headers.get("Joc-First-Frame-Clk")?.to_str().ok()?;
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(header = raw, "malformed Joc-First-Frame-Clk, defaulting to now");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_name_rejects_dot_dot_segments() {
        assert!(validate_name("/live/../etc/passwd").is_err());
        assert!(validate_name("/live/stream/1").is_ok());
    }

    #[test]
    fn parse_max_age_defaults_to_no_expiry() {
        let headers = HeaderMap::new();
        assert_eq!(parse_max_age(&headers), -1);
    }

    #[test]
    fn parse_max_age_reads_cache_control() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, "max-age=30".parse().unwrap());
        assert_eq!(parse_max_age(&headers), 30);
    }

    #[test]
    fn parse_first_frame_clk_falls_back_on_malformed_value() {
        let mut headers = HeaderMap::new();
        headers.insert("Joc-First-Frame-Clk", "not-a-number".parse().unwrap());
        assert_eq!(parse_first_frame_clk(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("Joc-First-Frame-Clk", "1700000000000".parse().unwrap());
        assert_eq!(parse_first_frame_clk(&headers), Some(1_700_000_000_000));
    }
}
