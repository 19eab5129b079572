//! Shared test utilities for ipam integration tests.

use ipam::rest::{AppState, create_router};
use ipam::{Engine, Store};
use reqwest::{Client, Response as ReqwestResponse};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server wrapper running the REST API against a throwaway database.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    _dir: TempDir,
}

impl TestServer {
    /// Spawn a server on an OS-assigned port.
    pub async fn spawn() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::new(dir.path(), 5)
            .await
            .expect("Failed to open store");
        let engine = Arc::new(Engine::new(Arc::new(store), 65534));
        let router = create_router(Arc::new(AppState { engine }));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            client: Client::new(),
            shutdown_tx,
            _dir: dir,
        }
    }

    /// Base URL for the DHCP endpoints.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/dhcp", self.addr)
    }

    pub async fn get(&self, path: &str) -> ReqwestResponse {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn get_url(&self, url: &str) -> ReqwestResponse {
        self.client
            .get(format!("http://{}{}", self.addr, url))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
