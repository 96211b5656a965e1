//! HTTP trigger surface: a status probe and a manual check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::app::{CourierError, Result};
use crate::checker::Checker;

pub fn router(checker: Arc<Checker>) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello from courier!" }))
        .route("/status", get(status))
        .route("/check", get(check).post(check))
        .with_state(checker)
}

async fn status() -> &'static str {
    "courier is running"
}

async fn check(State(checker): State<Arc<Checker>>) -> (StatusCode, String) {
    tracing::info!("Manual check triggered");

    match checker.run_check().await {
        Ok(report) => (StatusCode::OK, report.summary()),
        Err(CourierError::RunInProgress) => {
            (StatusCode::CONFLICT, "A check is already running".to_string())
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Check failed, see the log for details".to_string(),
        ),
    }
}

/// Serve until `shutdown` flips to true.
pub async fn serve(bind: &str, checker: Arc<Checker>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(checker))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
