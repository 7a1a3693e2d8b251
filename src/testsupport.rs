//! Shared fixtures for unit and integration tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Spawn a local HTTP server that answers one connection per scripted
/// `(status, body)` response, in order, then exits.
///
/// Returns the base URL and a handle resolving to the raw request text
/// captured per connection, so tests can assert on method, path, headers
/// and body.
pub async fn spawn_http_server(
    responses: Vec<(u16, String)>,
) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        let mut captured = Vec::with_capacity(responses.len());
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 65536];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            captured.push(String::from_utf8_lossy(&buf[..n]).to_string());

            let reason = match status {
                200 => "OK",
                201 => "Created",
                204 => "No Content",
                401 => "Unauthorized",
                404 => "Not Found",
                500 => "Internal Server Error",
                _ => "OK",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len(),
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.flush().await;
        }
        captured
    });

    (format!("http://{addr}"), handle)
}
