use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use dotenv::dotenv;
use sea_orm::DatabaseConnection;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

mod argon_hasher;
mod audit;
mod auth_guard;
mod config;
mod email_client;
mod entities;
mod errors;
mod password_reset;
mod refresh_token_store;
mod routes;
mod session;
mod session_test;
mod token_issuer;

use crate::{
    argon_hasher::ArgonHasher,
    audit::{AuditSink, DbAuditSink},
    config::Config,
    email_client::{Notifier, SmtpNotifier},
    password_reset::PasswordResetFlow,
    refresh_token_store::RefreshTokenStore,
    session::SessionManager,
    token_issuer::TokenIssuer,
};

#[cfg(all(target_env = "musl", not(target_os = "macos")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub token_issuer: TokenIssuer,
    pub sessions: SessionManager,
    pub password_reset: PasswordResetFlow,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(OpenApi)]
#[openapi(paths(
    routes::auth::register,
    routes::auth::login,
    routes::auth::me,
    routes::auth::refresh,
    routes::auth::logout,
    routes::auth::logout_all,
    routes::auth::forget_password,
    routes::auth::verify_otp,
    routes::task::create_task,
    routes::task::list_tasks,
    routes::task::get_task,
    routes::task::update_task,
    routes::task::delete_task,
    routes::task::assign_task,
    routes::task::update_task_status,
    routes::user::list_users,
    routes::user::me_profile,
    routes::user::edit_profile,
    routes::user::delete_all_users,
    routes::audit_log::create_audit_log,
    routes::audit_log::list_audit_logs,
    routes::audit_log::get_audit_log,
))]
struct ApiDoc;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let db = sea_orm::Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let token_issuer = TokenIssuer::new(&config);
    let hasher = ArgonHasher::new(&config);
    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::new(config.smtp.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(DbAuditSink::new(db.clone()));

    let refresh_tokens = RefreshTokenStore::new(db.clone());
    let sessions = SessionManager::new(
        db.clone(),
        token_issuer.clone(),
        refresh_tokens,
        hasher.clone(),
    );
    let password_reset = PasswordResetFlow::new(db.clone(), hasher, notifier.clone());

    let state = AppState {
        db,
        token_issuer,
        sessions,
        password_reset,
        audit,
        notifier,
    };

    let app = Router::new()
        .nest("/auth", routes::auth::auth_router(&state))
        .nest("/task", routes::task::task_router(&state))
        .nest("/user", routes::user::user_router(&state))
        .nest("/audit-log", routes::audit_log::audit_log_router(&state))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::debug!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
