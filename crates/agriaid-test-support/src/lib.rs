//! A one-shot HTTP/1.1 server for client tests.
//!
//! `serve` answers one connection per canned response, in order, and then
//! stops. Each request it reads (request line and body) is handed back through
//! [`Stub::next_request`] so tests can check what the client actually sent.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// One response, written verbatim with `Connection: close`.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Canned {
    pub fn ok(content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::ok("application/json", body)
    }

    /// Newline-delimited JSON, one line per entry.
    pub fn ndjson(lines: &[&str]) -> Self {
        Self::ok(
            "application/x-ndjson",
            lines.iter().map(|l| format!("{l}\n")).collect::<String>(),
        )
    }

    pub fn status(code: u16) -> Self {
        Self {
            status: code,
            content_type: "text/plain",
            body: "upstream unavailable".to_string(),
        }
    }

    pub fn with_status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }
}

/// What the stub read off one connection.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// `GET /path?query HTTP/1.1`
    pub line: String,
    pub body: String,
}

impl Recorded {
    pub fn method(&self) -> &str {
        self.line.split(' ').next().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        let target = self.line.split(' ').nth(1).unwrap_or_default();
        target.split_once('?').map_or(target, |(p, _)| p)
    }

    /// Query parameters, percent-decoded, in the order sent.
    pub fn query(&self) -> Vec<(String, String)> {
        let target = self.line.split(' ').nth(1).unwrap_or_default();
        let Some((_, query)) = target.split_once('?') else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect()
    }

    /// First value of `name`, if the query carried it.
    pub fn param(&self, name: &str) -> Option<String> {
        self.query()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Every value of a repeated parameter.
    pub fn params(&self, name: &str) -> Vec<String> {
        self.query()
            .into_iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    /// Body as JSON; `Null` when it is empty or not JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Form-style percent decoding (`+` is a space).
fn decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => match (bytes.get(i + 1).and_then(hex), bytes.get(i + 2).and_then(hex)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'%'),
            },
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: &u8) -> Option<u8> {
    (*b as char).to_digit(16).map(|d| d as u8)
}

pub struct Stub {
    addr: String,
    requests: mpsc::Receiver<Recorded>,
}

impl Stub {
    /// `host:port`, without a scheme.
    pub fn host(&self) -> &str {
        &self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// The next request served; panics after five seconds without one.
    pub fn next_request(&self) -> Recorded {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("stub saw a request")
    }
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn read_request(stream: &mut TcpStream) -> Recorded {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return Recorded::default(),
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + length {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    Recorded {
        line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&data[header_end..]).into_owned(),
    }
}

/// Serve `responses` in order, one per connection, then stop.
pub fn serve(responses: Vec<Canned>) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for canned in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let _ = tx.send(read_request(&mut stream));

            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                canned.status,
                reason(canned.status),
                canned.content_type,
                canned.body.len(),
                canned.body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    Stub {
        addr: addr.to_string(),
        requests: rx,
    }
}
