//! Minimal HTTP/1.1 server imitating the store's app-list and app-details endpoints.
//!
//! `GET /list` returns the configured catalog. `GET /details?appids=N` pops the
//! next scripted reply for N; the last reply repeats. Unscripted ids get
//! `{"N": {"success": false}}`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with `{"N": {"success": true, "data": {...}}}`.
    Found(&'static str),
    /// 200 with `{"N": {"success": false}}`.
    Missing,
    /// Bare status with an empty body (429, 503, ...).
    Status(u32),
}

#[derive(Default)]
struct State {
    catalog: Vec<(u64, String)>,
    scripts: HashMap<u64, Vec<Reply>>,
    hits: HashMap<u64, usize>,
}

#[derive(Clone)]
pub struct StoreServer {
    pub base_url: String,
    state: Arc<Mutex<State>>,
}

impl StoreServer {
    pub fn list_url(&self) -> String {
        format!("{}list", self.base_url)
    }

    pub fn details_url(&self) -> String {
        format!("{}details", self.base_url)
    }

    pub fn script(&self, id: u64, replies: Vec<Reply>) {
        self.state.lock().unwrap().scripts.insert(id, replies);
    }

    pub fn set_catalog(&self, apps: &[(u64, &str)]) {
        self.state.lock().unwrap().catalog =
            apps.iter().map(|(id, n)| (*id, n.to_string())).collect();
    }

    /// Number of details requests seen for `id`.
    pub fn hits(&self, id: u64) -> usize {
        self.state.lock().unwrap().hits.get(&id).copied().unwrap_or(0)
    }
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start() -> StoreServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State::default()));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    StoreServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        state,
    }
}

fn handle(mut stream: std::net::TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let (status, body) = if target == "/list" {
        (200, list_body(&state.lock().unwrap().catalog))
    } else if let Some(id) = details_id(target) {
        details_reply(id, state)
    } else {
        (404, String::new())
    };
    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn details_id(target: &str) -> Option<u64> {
    let query = target.strip_prefix("/details?")?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("appids="))
        .and_then(|v| v.parse().ok())
}

fn details_reply(id: u64, state: &Mutex<State>) -> (u32, String) {
    let mut state = state.lock().unwrap();
    *state.hits.entry(id).or_insert(0) += 1;
    let reply = match state.scripts.get_mut(&id) {
        Some(replies) if replies.len() > 1 => replies.remove(0),
        Some(replies) if !replies.is_empty() => replies[0].clone(),
        _ => Reply::Missing,
    };
    match reply {
        Reply::Found(data) => (200, format!(r#"{{"{id}":{{"success":true,"data":{data}}}}}"#)),
        Reply::Missing => (200, format!(r#"{{"{id}":{{"success":false}}}}"#)),
        Reply::Status(code) => (code, String::new()),
    }
}

fn list_body(catalog: &[(u64, String)]) -> String {
    let apps: Vec<String> = catalog
        .iter()
        .map(|(id, name)| format!(r#"{{"appid":{id},"name":"{name}"}}"#))
        .collect();
    format!(r#"{{"applist":{{"apps":[{}]}}}}"#, apps.join(","))
}
