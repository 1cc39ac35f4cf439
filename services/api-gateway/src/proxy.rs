//! Forwarding to downstream services and envelope mapping of their replies.

use std::time::Duration;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use awc::Client;
use serde_json::{json, Value};
use shared::config::Settings;
use shared::envelope::{normalize, ResponseEnvelope};
use shared::rpc_error::RpcError;
use tracing::{debug, error, info, warn};

const MAX_UPSTREAM_BODY: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Upstreams {
    pub exams: String,
    pub users: String,
    pub timeout: Duration,
}

impl Upstreams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            exams: settings.exams_service_url.trim_end_matches('/').to_string(),
            users: settings.users_service_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(settings.upstream_timeout_ms),
        }
    }

    /// Base URL of the service owning `path`, chosen by its first segment.
    pub fn route(&self, path: &str) -> Option<&str> {
        let first = path.trim_start_matches('/').split('/').next().unwrap_or_default();
        match first {
            "exams" | "submissions" => Some(&self.exams),
            "users" | "auth" => Some(&self.users),
            _ => None,
        }
    }

    fn client(&self) -> Client {
        Client::builder().timeout(self.timeout).finish()
    }
}

/// Maps a downstream reply onto the outward status and envelope.
pub fn reply_from_upstream(status: u16, body: &[u8]) -> (u16, ResponseEnvelope<Value>) {
    if (200..300).contains(&status) {
        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
        };
        return (status, normalize(payload));
    }

    let err = RpcError::from_upstream(status, body);
    error!(
        status = err.status_code(),
        message = %err.message(),
        "downstream service reported an error"
    );
    (err.status(), err.into_envelope())
}

pub fn respond(status: u16, envelope: &ResponseEnvelope<Value>) -> HttpResponse {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(code).json(envelope)
}

fn respond_error(err: RpcError) -> HttpResponse {
    let status = err.status();
    respond(status, &err.into_envelope())
}

pub async fn health(upstreams: web::Data<Upstreams>) -> HttpResponse {
    debug!("health check request");
    let client = upstreams.client();
    for base in [&upstreams.exams, &upstreams.users] {
        let url = format!("{base}/health");
        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => {}
            Ok(res) => {
                warn!(%url, status = res.status().as_u16(), "downstream unhealthy");
                return respond_error(RpcError::service_unavailable());
            }
            Err(e) => {
                warn!(%url, %e, "downstream unreachable");
                return respond_error(RpcError::service_unavailable());
            }
        }
    }
    respond(200, &ResponseEnvelope::success_with(json!({"status": "ok"}), "Gateway healthy"))
}

pub async fn forward(
    req: HttpRequest,
    body: web::Bytes,
    upstreams: web::Data<Upstreams>,
) -> HttpResponse {
    let path = req.uri().path();
    let Some(base) = upstreams.route(path) else {
        return respond_error(RpcError::new(
            404,
            format!("Cannot {} {}", req.method(), path),
            "NotFound",
        ));
    };
    let url = match req.uri().query() {
        Some(q) => format!("{base}{path}?{q}"),
        None => format!("{base}{path}"),
    };
    info!(method = %req.method(), %url, "forwarding request");

    let mut outgoing = upstreams.client().request(req.method().clone(), &url);
    for name in [header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT_LANGUAGE] {
        if let Some(value) = req.headers().get(&name) {
            outgoing = outgoing.insert_header((name.clone(), value.clone()));
        }
    }

    let mut res = match outgoing.send_body(body).await {
        Ok(res) => res,
        Err(e) => {
            warn!(%url, %e, "downstream request failed");
            return respond_error(RpcError::service_unavailable());
        }
    };
    let status = res.status().as_u16();
    let bytes = match res.body().limit(MAX_UPSTREAM_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%url, %e, "could not read downstream body");
            return respond_error(RpcError::service_unavailable());
        }
    };
    let (status, envelope) = reply_from_upstream(status, &bytes);
    respond(status, &envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstreams() -> Upstreams {
        Upstreams {
            exams: "http://exams".into(),
            users: "http://users".into(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn routes_by_first_segment() {
        let ups = upstreams();
        assert_eq!(ups.route("/exams/3"), Some("http://exams"));
        assert_eq!(ups.route("/submissions/1/grade"), Some("http://exams"));
        assert_eq!(ups.route("/auth/forgot-password"), Some("http://users"));
        assert_eq!(ups.route("/users"), Some("http://users"));
        assert_eq!(ups.route("/classes/1"), None);
    }

    #[test]
    fn success_bodies_are_normalized() {
        let (status, env) = reply_from_upstream(201, br#"{"message":"Created","id":4}"#);
        assert_eq!(status, 201);
        assert!(env.success);
        assert_eq!(env.message.joined(), "Created");
        assert_eq!(env.data, json!({"id": 4}));

        let (_, env) = reply_from_upstream(200, b"");
        assert_eq!(env.data, Value::Null);

        let (_, env) = reply_from_upstream(200, b"plain text");
        assert_eq!(env.message.joined(), "plain text");
    }

    #[test]
    fn rpc_errors_keep_status_and_message_list() {
        let body = json!({
            "statusCode": 422,
            "message": ["class_id must be an integer"],
            "error": {"field": "class_id"}
        });
        let (status, env) = reply_from_upstream(422, body.to_string().as_bytes());
        assert_eq!(status, 422);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "success": false,
                "message": ["class_id must be an integer"],
                "data": null,
                "error": {"statusCode": 422, "error": {"field": "class_id"}}
            })
        );
    }

    #[test]
    fn garbage_error_bodies_still_fail() {
        let (status, env) = reply_from_upstream(500, b"<html>oops</html>");
        assert_eq!(status, 500);
        assert!(!env.success);
    }
}
