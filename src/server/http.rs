//! Minimal HTTP/1.1 request layer
//!
//! The server surface is three fixed routes, so requests are parsed by
//! hand: read the head, take the request line apart, split the query
//! string. Headers beyond the request line are skipped.

use tokio::io::{AsyncRead, AsyncReadExt};

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method (e.g. "GET")
    pub method: String,
    /// Path component of the target, without the query string
    pub path: String,
    /// Decoded query parameters in order of appearance
    pub query: Vec<(String, String)>,
}

impl Request {
    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Read and parse one request head
///
/// Returns `None` if the peer closed the connection before sending
/// anything. Heads larger than `max_len` are an error.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> std::io::Result<Option<Request>> {
    let mut head = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if head.is_empty() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-request",
            ));
        }
        head.extend_from_slice(&chunk[..n]);

        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if head.len() > max_len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let request_line = head.lines().next().unwrap_or_default();
    parse_request_line(request_line)
        .map(Some)
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed request line")
        })
}

fn parse_request_line(line: &str) -> Option<Request> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    parts.next()?; // HTTP version

    let (path, query_string) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let query = query_string
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();

    Some(Request {
        method,
        path: path.to_string(),
        query,
    })
}

/// Build a plain-text response with `Connection: close`
pub fn plain_response(status: u16, reason: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Connection: close\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        reason,
        body.len(),
        body
    )
}
