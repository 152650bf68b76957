//! Multipart stream framing
//!
//! The stream endpoint speaks `multipart/x-mixed-replace`: one persistent
//! response carrying a boundary-delimited sequence of independently
//! decodable images. Each part is self-delimiting via `Content-Length`, so
//! viewers never need to scan payload bytes for the boundary.

/// Part boundary marker (without the leading dashes)
pub const BOUNDARY: &str = "camcastframe";

/// Bytes terminating each part's payload
pub const PART_TRAILER: &[u8] = b"\r\n";

/// Response head for the stream endpoint
///
/// Explicitly uncacheable; the connection stays open until either side
/// closes it.
pub fn response_head() -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Connection: close\r\n\
         Cache-Control: no-cache, no-store, must-revalidate\r\n\
         Pragma: no-cache\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={}\r\n\
         \r\n",
        BOUNDARY
    )
}

/// Header block for one part
pub fn part_head(content_type: &str, len: usize) -> String {
    format!(
        "--{}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         \r\n",
        BOUNDARY, content_type, len
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_head_declares_boundary() {
        let head = response_head();

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("multipart/x-mixed-replace; boundary=camcastframe"));
        assert!(head.contains("Cache-Control: no-cache"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_part_head_is_length_delimited() {
        let head = part_head("image/jpeg", 1234);

        assert!(head.starts_with("--camcastframe\r\n"));
        assert!(head.contains("Content-Type: image/jpeg\r\n"));
        assert!(head.contains("Content-Length: 1234\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }
}
