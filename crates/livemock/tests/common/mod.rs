//! Shared harness for integration tests: runs all three listeners in-process on
//! ephemeral ports against a temporary catalog file.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use livemock::admin_api::{AdminApiServer, AdminState};
use livemock::live::{InterceptionCoordinator, LiveHub, LiveServer, NotificationChannel};
use livemock::registry::{EndpointRegistry, JsonFileStore};
use livemock::request::NormalizeOptions;
use livemock::server::{MockContext, MockServer};
use reqwest::Client;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{Framed, LinesCodec};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub mock_url: String,
    pub admin_url: String,
    pub live_addr: SocketAddr,
    pub hub: Arc<LiveHub>,
    pub coordinator: Arc<InterceptionCoordinator>,
    pub registry: Arc<EndpointRegistry>,
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    _dir: TempDir,
    tasks: Vec<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(deadline: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let data_file = dir.path().join("mocks.json");
        let backup_dir = dir.path().join("backups");
        let store = Arc::new(JsonFileStore::new(&data_file, &backup_dir));
        let registry = Arc::new(EndpointRegistry::open(store).unwrap());
        let hub = Arc::new(LiveHub::new());
        let coordinator = InterceptionCoordinator::new(hub.clone(), deadline);

        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mock = MockServer::bind(
            any,
            Arc::new(MockContext::new(
                Arc::clone(&registry),
                Arc::clone(&coordinator),
                NormalizeOptions::default(),
            )),
        )
        .await
        .unwrap();
        let admin = AdminApiServer::bind(
            any,
            Arc::new(AdminState::new(Arc::clone(&registry), Arc::clone(&coordinator))),
        )
        .await
        .unwrap();
        let live = LiveServer::bind(any, Arc::clone(&hub)).await.unwrap();

        let mock_url = format!("http://{}", mock.local_addr().unwrap());
        let admin_url = format!("http://{}", admin.local_addr().unwrap());
        let live_addr = live.local_addr().unwrap();

        let tasks = vec![
            tokio::spawn(async move {
                let _ = mock.run().await;
            }),
            tokio::spawn(async move {
                let _ = admin.run().await;
            }),
            tokio::spawn(async move {
                let _ = live.run().await;
            }),
        ];

        Self {
            mock_url,
            admin_url,
            live_addr,
            hub,
            coordinator,
            registry,
            data_file,
            backup_dir,
            _dir: dir,
            tasks,
        }
    }

    /// Wait until `count` sessions watch `client_id`.
    pub async fn wait_for_watchers(&self, client_id: &str, count: usize) {
        timeout(TEST_TIMEOUT, async {
            while self.hub.watcher_count(client_id) != count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("watchers did not appear in time");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

/// A live operator session speaking newline-delimited JSON.
pub struct LiveClient {
    framed: Framed<TcpStream, LinesCodec>,
}

impl LiveClient {
    /// Connect, register as `ui`, and wait for the acknowledgement.
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Self {
            framed: Framed::new(stream, LinesCodec::new()),
        };
        client.send(serde_json::json!({"role": "ui"})).await;
        assert_eq!(client.recv().await, serde_json::json!({"role": "ui"}));
        client
    }

    pub async fn send(&mut self, message: Value) {
        self.framed.send(message.to_string()).await.unwrap();
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.framed.send(line.to_string()).await.unwrap();
    }

    pub async fn watch(&mut self, client_id: &str) {
        self.send(serde_json::json!({"clientId": client_id})).await;
    }

    pub async fn recv(&mut self) -> Value {
        let line = timeout(TEST_TIMEOUT, self.framed.next())
            .await
            .expect("no live message in time")
            .expect("live session closed")
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }
}
