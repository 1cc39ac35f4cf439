use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use shared::config::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod proxy;

use proxy::Upstreams;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(proxy::health))
        .default_service(web::to(proxy::forward));
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::new()?;
    let upstreams = web::Data::new(Upstreams::from_settings(&settings));
    let addr = settings.bind_addr_or("0.0.0.0:8080");
    info!(%addr, exams = %upstreams.exams, users = %upstreams.users, "starting api-gateway");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(upstreams.clone())
            .configure(configure)
    })
    .bind(addr)?
    .run()
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn upstreams(exams: String, users: String) -> web::Data<Upstreams> {
        web::Data::new(Upstreams {
            exams,
            users,
            timeout: Duration::from_secs(2),
        })
    }

    #[actix_rt::test]
    async fn forwards_success_and_normalizes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/exams/5").query_param("include", "questions");
                then.status(200).json_body(json!({"id": 5, "title": "Algebra"}));
            })
            .await;

        let app = test::init_service(
            App::new()
                .app_data(upstreams(server.base_url(), server.base_url()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/exams/5?include=questions")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({
                "success": true,
                "message": "Operation successful",
                "data": {"id": 5, "title": "Algebra"}
            })
        );
        mock.assert_async().await;
    }

    #[actix_rt::test]
    async fn downstream_rpc_error_keeps_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/users");
                then.status(422).json_body(json!({
                    "statusCode": 422,
                    "message": ["class_id must be an integer"],
                    "error": {"field": "class_id"},
                    "timestamp": "2024-01-01T00:00:00.000Z"
                }));
            })
            .await;

        let app = test::init_service(
            App::new()
                .app_data(upstreams("http://127.0.0.1:1".into(), server.base_url()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(json!({"class_id": "x"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!(["class_id must be an integer"]));
        assert_eq!(body["data"], Value::Null);
        assert_eq!(body["error"]["statusCode"], json!(422));
        assert_eq!(body["error"]["error"], json!({"field": "class_id"}));
        assert_eq!(body["error"]["timestamp"], json!("2024-01-01T00:00:00.000Z"));
    }

    #[actix_rt::test]
    async fn unreachable_downstream_is_service_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(upstreams("http://127.0.0.1:1".into(), "http://127.0.0.1:1".into()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/auth/forgot-password")
            .set_json(json!({"email": "a@b.io"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("Service temporarily unavailable"));
        assert_eq!(body["error"]["statusCode"], json!(503));
    }

    #[actix_rt::test]
    async fn unknown_prefix_is_enveloped_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(upstreams("http://127.0.0.1:1".into(), "http://127.0.0.1:1".into()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/classes/2").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Cannot GET /classes/2"));
    }

    #[actix_rt::test]
    async fn health_reports_downstream_state() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200).body("ok");
            })
            .await;
        let app = test::init_service(
            App::new()
                .app_data(upstreams(server.base_url(), server.base_url()))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let down = test::init_service(
            App::new()
                .app_data(upstreams(server.base_url(), "http://127.0.0.1:1".into()))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&down, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
