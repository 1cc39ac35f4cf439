//! REST API for accounts and password recovery.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use shared::config::Settings;
use shared::db::{self, SeaOrmStore};
use shared::email::{email_sender_from, EmailSender};
use shared::transaction::TransactionRunner;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod auth;
mod dto;
mod model;
mod password;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub runner: TransactionRunner<SeaOrmStore>,
    pub mailer: Arc<dyn EmailSender>,
    pub mail_from: String,
}

impl AppState {
    pub fn new(db: DatabaseConnection, settings: &Settings, mailer: Arc<dyn EmailSender>) -> Self {
        let store = Arc::new(SeaOrmStore::new(db, settings.max_transactions));
        Self {
            runner: TransactionRunner::with_defaults(store, settings.transaction),
            mailer,
            mail_from: settings.mail_from.clone(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.runner.store().conn()
    }
}

async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/profile", patch(users::update_profile))
        .route("/users/:id/password", put(users::change_password))
        .route("/users/:id/block", post(users::block_user))
        .route("/users/:id/unblock", post(users::unblock_user))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/verify-code", post(auth::verify_code))
        .route("/auth/reset-password", post(auth::reset_password))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/* ---------------- Bootstrap: schema ---------------- */

async fn ensure_schema(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    let be = db.get_database_backend();

    db.execute(Statement::from_string(be, r#"
        CREATE TABLE IF NOT EXISTS users (
          user_id     SERIAL PRIMARY KEY,
          full_name   TEXT NOT NULL,
          email       TEXT NOT NULL UNIQUE,
          password    TEXT NOT NULL,
          role        TEXT NOT NULL CHECK (role IN ('admin','user','teacher')),
          status      TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active','blocked')),
          created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
          updated_at  TIMESTAMPTZ
        )
    "#.to_string())).await?;

    db.execute(Statement::from_string(be, r#"
        CREATE TABLE IF NOT EXISTS password_resets (
          reset_id    SERIAL PRIMARY KEY,
          email       TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
          code        TEXT NOT NULL,
          expires_at  TIMESTAMPTZ NOT NULL,
          used        BOOLEAN NOT NULL DEFAULT FALSE,
          created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#.to_string())).await?;

    db.execute(Statement::from_string(be, r#"
        CREATE INDEX IF NOT EXISTS password_resets_email_idx
          ON password_resets (email, used)
    "#.to_string())).await?;

    Ok(())
}

/* ---------------- main ---------------- */

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::new()?;
    let db = db::connect(&settings).await?;
    ensure_schema(&db).await?;

    let mailer = email_sender_from(&settings);
    let app = router(AppState::new(db, &settings, mailer));

    let addr = settings.bind_addr_or("0.0.0.0:8092");
    info!(%addr, "starting users-service");
    axum::Server::bind(&addr.parse::<std::net::SocketAddr>()?)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
