//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gateway_control_plane::config::{ControlPlaneConfig, OperatorCredential};
use gateway_control_plane::http::AppState;
use gateway_control_plane::{ConfigStore, HttpServer, Shutdown};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const OPERATOR_A: &str = "operator-a-token";
pub const OPERATOR_B: &str = "operator-b-token";

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A control plane running on an ephemeral port over an in-memory store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

pub fn test_config() -> ControlPlaneConfig {
    let mut config = ControlPlaneConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.gateway.send_timeout_ms = 500;
    config.auth.operators = vec![
        OperatorCredential {
            token: OPERATOR_A.into(),
            owner_id: 1,
        },
        OperatorCredential {
            token: OPERATOR_B.into(),
            owner_id: 2,
        },
    ];
    config
}

pub async fn start_server() -> TestServer {
    start_server_with(test_config()).await
}

pub async fn start_server_with(config: ControlPlaneConfig) -> TestServer {
    let store = ConfigStore::in_memory().await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, store);
    let state = server.state().clone();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer {
        addr,
        state,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
        shutdown,
        task,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn create(&self, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/routes"))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn update(&self, token: &str, id: i64, body: &Value) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/api/routes/{id}")))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, token: &str, id: i64) -> reqwest::Response {
        self.client
            .delete(self.url(&format!("/api/routes/{id}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, token: &str, id: i64) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/routes/{id}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// Create a route as operator A and return its id.
    pub async fn create_ok(&self, body: &Value) -> i64 {
        let res = self.create(OPERATOR_A, body).await;
        assert_eq!(res.status(), 201);
        let json: Value = res.json().await.unwrap();
        json["api"]["id"].as_i64().unwrap()
    }

    /// The `apis` array of the current snapshot.
    pub async fn snapshot(&self) -> Vec<Value> {
        let res = self.client.get(self.url("/gateway/config")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let json: Value = res.json().await.unwrap();
        json["apis"].as_array().cloned().unwrap_or_default()
    }

    pub async fn gateway(&self) -> GatewayClient {
        GatewayClient::connect(self.addr).await
    }

    /// Wait until the channel manager reports `count` connected gateways.
    pub async fn wait_for_gateways(&self, count: usize) {
        let channels = self.state.channels.clone();
        tokio::time::timeout(RECV_TIMEOUT, async move {
            while channels.connected_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("gateway count never settled");
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(RECV_TIMEOUT, self.task).await;
    }
}

/// A gateway connected to `/gateway/ws`, already past `connection_success`.
pub struct GatewayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl GatewayClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}/gateway/ws")).await.unwrap();
        let mut client = Self { ws };
        let first = client.next_message().await.expect("no acknowledgment");
        assert_eq!(first["type"], "connection_success");
        client
    }

    /// Next JSON frame, or `None` once the server closed the channel.
    pub async fn next_message(&mut self) -> Option<Value> {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while let Some(frame) = self.ws.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
                    Ok(WsMessage::Close(_)) | Err(_) => return None,
                    Ok(_) => continue,
                }
            }
            None
        })
        .await
        .expect("timed out waiting for a gateway frame")
    }

    /// Assert nothing arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(Some(Ok(frame))) = tokio::time::timeout(wait, self.ws.next()).await {
            panic!("unexpected frame: {frame:?}");
        }
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws.send(WsMessage::Text(text.into())).await.unwrap();
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
