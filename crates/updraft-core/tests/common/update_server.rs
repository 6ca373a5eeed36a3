//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a route table on 127.0.0.1 with `Connection: close`. Each route picks
//! its status, whether `Content-Length` is sent (without it the body ends at
//! connection close), and an optional `Content-Disposition`. Unknown paths get
//! 404. The `User-Agent` of every request is recorded.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    pub send_length: bool,
    pub disposition: Option<String>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            send_length: true,
            disposition: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: format!("status {}", status).into_bytes(),
            send_length: true,
            disposition: None,
        }
    }

    pub fn without_length(mut self) -> Self {
        self.send_length = false;
        self
    }

    pub fn with_disposition(mut self, value: &str) -> Self {
        self.disposition = Some(value.to_string());
        self
    }
}

pub struct TestServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    /// Absolute URL for `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Add or replace the route for `path`.
    pub fn route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }

    /// Request paths in arrival order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

/// Start a server with no routes; add them with [`TestServer::route`].
/// Runs in a background thread until the process exits.
pub fn start() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(HashMap::new()));
    let user_agents = Arc::new(Mutex::new(Vec::new()));
    let hits = Arc::new(Mutex::new(Vec::new()));
    {
        let routes = Arc::clone(&routes);
        let user_agents = Arc::clone(&user_agents);
        let hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let user_agents = Arc::clone(&user_agents);
                let hits = Arc::clone(&hits);
                thread::spawn(move || handle(stream, &routes, &user_agents, &hits));
            }
        });
    }
    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        routes,
        user_agents,
        hits,
    }
}

/// Start a server serving `routes` (path, route).
pub fn start_with(routes: Vec<(&str, Route)>) -> TestServer {
    let server = start();
    for (path, route) in routes {
        server.route(path, route);
    }
    server
}

fn handle(
    mut stream: TcpStream,
    routes: &Mutex<HashMap<String, Route>>,
    user_agents: &Mutex<Vec<String>>,
    hits: &Mutex<Vec<String>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request).into_owned();
    let mut lines = request.lines();
    let path = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("user-agent") {
                user_agents.lock().unwrap().push(value.trim().to_string());
            }
        }
    }
    hits.lock().unwrap().push(path.clone());

    let route = routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Route::status(404));
    let mut head = format!("HTTP/1.1 {} {}\r\nConnection: close\r\n", route.status, reason(route.status));
    if route.send_length {
        head.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    if let Some(d) = &route.disposition {
        head.push_str(&format!("Content-Disposition: {}\r\n", d));
    }
    head.push_str("\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for part in route.body.chunks(64 * 1024) {
        if stream.write_all(part).is_err() {
            // Client went away (cancelled, or only wanted headers).
            return;
        }
    }
    let _ = stream.flush();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
