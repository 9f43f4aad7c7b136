//! Shared test utilities and fixtures
//!
//! A scripted WebSocket proxy on localhost and helpers for the GraphQL
//! candidate source.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use proxyprobe_engine::{ProbeSettings, ProxyAddress};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use wiremock::matchers::{body_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// How the local proxy answers.
#[derive(Debug, Clone)]
pub struct ProxyScript {
    pub params: Value,
    pub tip: Value,
    pub answer_raw: bool,
}

impl Default for ProxyScript {
    fn default() -> Self {
        Self {
            params: network_params("0x80000"),
            tip: json!("0x186a0"),
            answer_raw: true,
        }
    }
}

/// Params a real secret generator can mine against.
pub fn network_params(threshold: &str) -> Value {
    json!({
        "chainIdString": "100",
        "contractZeroHex": "0x0a4d5EFEa910Ea5E39be428A3d57B80BFAA52409",
        "receiverZeroHex": "0x39dfd20386F5d17eBa42763606B8c704FcDd1c1D",
        "minimumZeroHex": threshold,
    })
}

/// What the proxy saw, across every connection it accepted.
#[derive(Debug, Default)]
pub struct ProxyLog {
    pub uris: Vec<String>,
    pub requests: Vec<Value>,
    pub binaries: Vec<Vec<u8>>,
    pub closes: usize,
}

pub struct MockProxy {
    pub addr: SocketAddr,
    pub log: Arc<Mutex<ProxyLog>>,
}

impl MockProxy {
    pub fn address(&self) -> ProxyAddress {
        ProxyAddress::new(self.addr.to_string()).unwrap()
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, ProxyLog> {
        self.log.lock().unwrap()
    }

    pub fn methods(&self) -> Vec<String> {
        self.log()
            .requests
            .iter()
            .filter_map(|r| r["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Wait until the server has seen `n` close frames.
    pub async fn wait_for_closes(&self, n: usize) {
        for _ in 0..200 {
            if self.log().closes >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub async fn start_proxy(script: ProxyScript) -> MockProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(ProxyLog::default()));

    let accept_log = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let log = Arc::clone(&accept_log);
            let script = script.clone();
            tokio::spawn(async move { serve(tcp, script, log).await });
        }
    });

    MockProxy { addr, log }
}

async fn serve(tcp: tokio::net::TcpStream, script: ProxyScript, log: Arc<Mutex<ProxyLog>>) {
    let uri_log = Arc::clone(&log);
    let callback = move |request: &Request, response: Response| {
        uri_log.lock().unwrap().uris.push(request.uri().to_string());
        Ok::<_, ErrorResponse>(response)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tcp, callback).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let reply = match message {
            Message::Text(text) => {
                let request: Value = serde_json::from_str(text.as_str()).unwrap();
                log.lock().unwrap().requests.push(request.clone());
                let result = match request["method"].as_str() {
                    Some("net_get") => script.params.clone(),
                    Some("net_tip") => script.tip.clone(),
                    _ => continue,
                };
                let response = json!({"jsonrpc": "2.0", "id": request["id"], "result": result});
                Message::text(response.to_string())
            }
            Message::Binary(bytes) => {
                log.lock().unwrap().binaries.push(bytes.to_vec());
                if !script.answer_raw {
                    continue;
                }
                Message::binary(vec![0x16, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28])
            }
            Message::Close(_) => {
                log.lock().unwrap().closes += 1;
                break;
            }
            _ => continue,
        };
        if ws.send(reply).await.is_err() {
            break;
        }
    }
}

/// Settings for talking to a local plain-WebSocket proxy.
pub fn local_settings() -> ProbeSettings {
    ProbeSettings {
        scheme: "ws".to_string(),
        raw_timeout: Duration::from_millis(300),
        ..ProbeSettings::default()
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> ProxyAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    ProxyAddress::new(addr.to_string()).unwrap()
}

pub async fn start_graph_mock() -> MockServer {
    MockServer::start().await
}

/// Serve one page of `{ datas(first, skip) { data } }`, oldest first.
pub async fn mount_graph_page(server: &MockServer, skip: usize, first: usize, records: &[String]) {
    let datas: Vec<Value> = records.iter().map(|r| json!({"data": r})).collect();
    Mock::given(method("POST"))
        .and(body_json(json!({
            "query": format!("{{ datas(first: {first}, skip: {skip}) {{ data }} }}")
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"datas": datas}})))
        .expect(1)
        .mount(server)
        .await;
}
