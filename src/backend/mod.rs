//! Dummy HTTP backend.
//!
//! The supervised child: answers `GET /health` with `OK` and every other
//! path with its configured message. One response per connection, then
//! close; just enough HTTP for a health check or a curl.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::config::BackendSpec;

const MAX_REQUEST_BYTES: usize = 8192;

/// Bind the spec's port on localhost and serve until killed.
pub async fn serve(spec: BackendSpec) -> io::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", spec.port)).await?;
    info!("Backend {} running on port {}...", spec.name, spec.port);
    serve_on(listener, spec).await
}

/// Accept loop over an already-bound listener (tests bind port 0).
pub async fn serve_on(listener: TcpListener, spec: BackendSpec) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let spec = spec.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &spec).await {
                debug!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, spec: &BackendSpec) -> io::Result<()> {
    let head = read_request_head(&mut stream).await?;
    let path = request_path(&head);

    let body = match path {
        Some("/health") => "OK",
        _ => spec.message.as_str(),
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Read until the end of the request headers (or EOF, or the size cap).
async fn read_request_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Path component of the request line, e.g. `GET /health HTTP/1.1`.
fn request_path(head: &str) -> Option<&str> {
    head.lines().next()?.split_whitespace().nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_backend(message: &str) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let spec = BackendSpec::new(addr.port(), "T1", message);
        tokio::spawn(serve_on(listener, spec));
        addr
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_returns_200_ok() {
        let addr = spawn_backend("hi").await;
        let response = get(addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("\r\n\r\nOK"));
    }

    #[tokio::test]
    async fn test_other_paths_return_message_with_length() {
        let addr = spawn_backend("Hello from B1").await;
        let response = get(addr, "/anything").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Content-Length: 13\r\n"));
        assert!(response.ends_with("Hello from B1"));
    }

    #[test]
    fn test_request_path_parsing() {
        assert_eq!(request_path("GET /health HTTP/1.1\r\n"), Some("/health"));
        assert_eq!(request_path("GET / HTTP/1.1\r\n"), Some("/"));
        assert_eq!(request_path(""), None);
    }
}
