//! Mock generation endpoint on a local TCP listener.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const TOKEN: &str = "test-token";

/// How the server answers one route.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A complete body with Content-Length.
    Body {
        status: u16,
        content_type: Option<&'static str>,
        body: Vec<u8>,
    },
    /// A chunked body, flushed piece by piece with a pause in between.
    Chunked {
        content_type: Option<&'static str>,
        chunks: Vec<Vec<u8>>,
        delay: Duration,
    },
    /// Reads the request and never answers.
    Stall,
}

impl Reply {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self::Body {
            status: 200,
            content_type: Some(content_type),
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Body {
            status,
            content_type: Some("application/json"),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn event_stream(events: &[String], delay: Duration) -> Self {
        Self::Chunked {
            content_type: Some("text/event-stream"),
            chunks: events.iter().map(|e| e.as_bytes().to_vec()).collect(),
            delay,
        }
    }
}

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub struct MockServer {
    base: String,
    requests: Arc<Mutex<Vec<Captured>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Serves `reply` on the chat-completions path.
    pub async fn start(reply: Reply) -> Self {
        Self::start_with(|_| vec![(CHAT_PATH.to_string(), reply)]).await
    }

    /// Serves routes built from the server's base URL.
    pub async fn start_with<F>(routes: F) -> Self
    where
        F: FnOnce(&str) -> Vec<(String, Reply)>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let base = format!("http://127.0.0.1:{port}");
        let routes = Arc::new(routes(&base));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    handle_connection(stream, &routes, &seen).await;
                });
            }
        });

        Self {
            base,
            requests,
            handle,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn endpoint(&self) -> String {
        format!("{}{CHAT_PATH}", self.base)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    routes: &[(String, Reply)],
    seen: &Mutex<Vec<Captured>>,
) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    let reply = routes
        .iter()
        .find(|(path, _)| *path == request.path)
        .map(|(_, reply)| reply.clone())
        .unwrap_or_else(|| Reply::status(404, "{\"error\":\"no such route\"}"));
    seen.lock().unwrap().push(request);

    match reply {
        Reply::Body {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n",
                reason(status),
                content_type_line(content_type),
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(&body).await;
        }
        Reply::Chunked {
            content_type,
            chunks,
            delay,
        } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\n{}Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                content_type_line(content_type)
            );
            if stream.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(&chunk);
                frame.extend_from_slice(b"\r\n");
                if stream.write_all(&frame).await.is_err() {
                    return;
                }
                let _ = stream.flush().await;
                tokio::time::sleep(delay).await;
            }
            let _ = stream.write_all(b"0\r\n\r\n").await;
        }
        Reply::Stall => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut tmp = vec![0u8; 64 * 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    Some(Captured {
        method,
        path,
        headers,
        body: buf[header_end..header_end + content_length].to_vec(),
    })
}

fn content_type_line(content_type: Option<&str>) -> String {
    content_type
        .map(|ct| format!("Content-Type: {ct}\r\n"))
        .unwrap_or_default()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// Bytes that sniff as JPEG, `size` long.
pub fn jpeg_bytes(size: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend((0..size.saturating_sub(4)).map(|i| (i % 251) as u8));
    data
}

/// Deterministic pseudo-video bytes.
pub fn video_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i.wrapping_mul(31) % 256) as u8).collect()
}

/// Regular files in `dir`, or none if it does not exist.
pub fn files_in(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}
