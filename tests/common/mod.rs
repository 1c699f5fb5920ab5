//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use rpc_httpd::{HttpServer, ServerConfig};

/// Loopback-only config on an ephemeral port.
pub fn test_config(threads: usize, work_queue: usize) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.rpc.bind = vec!["127.0.0.1:0".to_string()];
    config.rpc.allow_ip = vec!["127.0.0.1".to_string()];
    config.rpc.threads = threads;
    config.rpc.work_queue = work_queue;
    config.rpc.server_timeout_secs = 5;
    config
}

/// Init and start a server after `register` has added its handlers.
pub fn start_server(config: ServerConfig, register: impl FnOnce(&HttpServer)) -> (HttpServer, String) {
    let mut server = HttpServer::new(config);
    register(&server);
    server.init().unwrap();
    server.start().unwrap();
    let base = format!("http://{}", server.local_addrs()[0]);
    (server, base)
}

/// Stop the server off the async runtime; Stop blocks on thread joins.
pub async fn stop_server(mut server: HttpServer) {
    tokio::task::spawn_blocking(move || server.stop()).await.unwrap();
}

/// One connection per request, so queued requests never share a socket.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Poll `check` until it holds, or panic after five seconds.
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Holds handlers inside a worker until the test opens it.
#[derive(Default)]
pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    entered: usize,
    open: bool,
}

impl Gate {
    /// Called from a handler: record entry, then block until opened.
    pub fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        state.entered += 1;
        while !state.open {
            state = self.cond.wait(state).unwrap();
        }
    }

    pub fn open(&self) {
        self.state.lock().unwrap().open = true;
        self.cond.notify_all();
    }

    pub fn entered(&self) -> usize {
        self.state.lock().unwrap().entered
    }
}
