//! Test helpers: a stub backend on a random local port.

use std::sync::Arc;

use qdash_client::{ApiClient, NoAuth};

/// Serve `app` on `127.0.0.1:0` and return a client pointed at it.
pub async fn serve(app: axum::Router) -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ApiClient::new(format!("http://{addr}"), Arc::new(NoAuth))
}
