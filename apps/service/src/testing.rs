//! Test doubles for the stores, gateway and checker, plus throwaway TCP servers.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::database::{DataStore, StoreError};
use crate::logs::{LogKind, LogStore};
use crate::monitoring::checker::Checker;
use crate::monitoring::types::{Check, Outcome};
use crate::notifications::{GatewayError, NotificationGateway};

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "299 Other",
    }
}

/// Read one HTTP/1.1 request (head plus `Content-Length` body) off `socket`.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Server answering every request with `status` and an empty body.
pub async fn spawn_http_server(status: u16) -> SocketAddr {
    spawn_recording_server(status).await.0
}

/// Like [`spawn_http_server`], also handing every raw request to the receiver.
pub async fn spawn_recording_server(status: u16) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let _ = tx.send(request);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line(status)
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Server that accepts connections and never answers.
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// In-memory record store
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(String, String), Value>>,
    /// Ids listed but missing on read, as if deleted mid-sweep
    pub vanished: Mutex<Vec<String>>,
    pub fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn with_checks(checks: impl IntoIterator<Item = (String, Value)>) -> Self {
        let store = Self::default();
        {
            let mut records = store.records.lock().unwrap();
            for (id, record) in checks {
                records.insert((crate::database::CHECKS.to_string(), id), record);
            }
        }
        store
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.records.lock().unwrap().get(&(collection.to_string(), id.to_string())).cloned()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, id)| id.clone())
            .collect();
        ids.extend(self.vanished.lock().unwrap().iter().cloned());
        Ok(ids)
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.get(collection, id))
    }

    async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists { collection: key.0, id: key.1 }.into());
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        let mut records = self.records.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        match records.get_mut(&key) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { collection: key.0, id: key.1 }.into()),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .remove(&(collection.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| anyhow!("not found"))
    }
}

/// In-memory log store that records the order of destructive calls
#[derive(Default)]
pub struct MemoryLogs {
    pub live: Mutex<BTreeMap<String, Vec<String>>>,
    pub archives: Mutex<BTreeMap<String, Vec<String>>>,
    pub fail_append: AtomicBool,
    /// Live logs whose compression fails
    pub fail_compress: Mutex<Vec<String>>,
    pub truncated: Mutex<Vec<String>>,
}

impl MemoryLogs {
    pub fn lines(&self, name: &str) -> Vec<String> {
        self.live.lock().unwrap().get(name).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LogStore for MemoryLogs {
    async fn append(&self, name: &str, line: &str) -> Result<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.live.lock().unwrap().entry(name.to_string()).or_default().push(line.to_string());
        Ok(())
    }

    async fn list(&self, kind: LogKind) -> Result<Vec<String>> {
        let names = match kind {
            LogKind::Live => self.live.lock().unwrap().keys().cloned().collect(),
            LogKind::Archived => self.archives.lock().unwrap().keys().cloned().collect(),
        };
        Ok(names)
    }

    async fn compress(&self, name: &str, archive: &str) -> Result<bool> {
        if self.fail_compress.lock().unwrap().iter().any(|n| n == name) {
            bail!("compression failed for {name}");
        }
        let lines = self.live.lock().unwrap().get(name).cloned().ok_or_else(|| anyhow!("no log {name}"))?;
        if lines.is_empty() {
            return Ok(false);
        }
        self.archives.lock().unwrap().insert(archive.to_string(), lines);
        Ok(true)
    }

    async fn decompress(&self, archive: &str) -> Result<String> {
        let archives = self.archives.lock().unwrap();
        let lines = archives.get(archive).ok_or_else(|| anyhow!("no archive {archive}"))?;
        Ok(lines.iter().map(|l| format!("{l}\n")).collect())
    }

    async fn truncate(&self, name: &str) -> Result<()> {
        let mut live = self.live.lock().unwrap();
        let lines = live.get_mut(name).ok_or_else(|| anyhow!("no log {name}"))?;
        lines.clear();
        self.truncated.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Gateway remembering every message it was asked to send
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingGateway {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push((phone.to_string(), message.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected { status: 500, body: "gateway down".to_string() });
        }
        Ok(())
    }
}

/// Checker returning canned outcomes per check id without touching the network
#[derive(Default)]
pub struct ScriptedChecker {
    outcomes: Mutex<HashMap<String, Outcome>>,
    pub probes: AtomicUsize,
}

impl ScriptedChecker {
    pub fn with(outcomes: impl IntoIterator<Item = (String, Outcome)>) -> Arc<Self> {
        Arc::new(Self { outcomes: Mutex::new(outcomes.into_iter().collect()), probes: AtomicUsize::new(0) })
    }

    pub fn set(&self, id: &str, outcome: Outcome) {
        self.outcomes.lock().unwrap().insert(id.to_string(), outcome);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn probe(&self, check: &Check) -> Outcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .get(&check.id)
            .cloned()
            .unwrap_or_else(|| Outcome::transport_error("no scripted outcome"))
    }
}
