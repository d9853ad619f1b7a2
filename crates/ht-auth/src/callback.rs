use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::CALLBACK_PATH;
use crate::errors::{AuthError, Result};

/// Loopback HTTP server that captures a single browser redirect.
///
/// Bound on an ephemeral port before the authorization URL is built, since
/// the port number must be embedded in the state parameter. Exactly one
/// request is meaningfully processed; whichever of the two one-shot
/// channels fires first resolves the waiting orchestrator, and everything
/// after that is ignored.
pub struct CallbackServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

/// Receiving ends of the callback race. `code` carries the authorization
/// code; `error` carries a provider denial or a protocol violation.
pub struct CallbackChannels {
    pub code: oneshot::Receiver<String>,
    pub error: oneshot::Receiver<AuthError>,
}

impl CallbackServer {
    /// Bind `127.0.0.1:0` and start serving the redirect path.
    pub async fn bind() -> Result<(Self, CallbackChannels)> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(AuthError::CallbackBind)?;
        let port = listener
            .local_addr()
            .map_err(AuthError::CallbackBind)?
            .port();

        let (code_tx, code_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(port, "OAuth callback server listening");
        tokio::spawn(run_server(listener, code_tx, error_tx, shutdown_rx));

        Ok((
            Self {
                port,
                shutdown_tx: Some(shutdown_tx),
            },
            CallbackChannels {
                code: code_rx,
                error: error_rx,
            },
        ))
    }

    /// Port the OS assigned; embedded in the state parameter.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop the accept loop and release the listener.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CallbackServer {
    // Backstop so the port is released on every exit path, including
    // panics and early returns in the orchestrator.
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_server(
    listener: TcpListener,
    code_tx: oneshot::Sender<String>,
    error_tx: oneshot::Sender<AuthError>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut code_tx = Some(code_tx);
    let mut error_tx = Some(error_tx);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("OAuth callback server shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (socket, _) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("Failed to accept callback connection: {e}");
                        continue;
                    }
                };
                if handle_connection(socket, &mut code_tx, &mut error_tx).await {
                    // A result is out, but the undelivered sender must stay
                    // alive until the orchestrator settles the race: dropping
                    // it here closes the losing channel while the other side
                    // is still polling both, and channel closure would be
                    // indistinguishable from a protocol violation.
                    let _ = (&mut shutdown_rx).await;
                    debug!("OAuth callback server shutting down");
                    break;
                }
            }
        }
    }
}

/// Upper bound on how much of a redirect request we buffer before parsing.
const MAX_REQUEST_BYTES: usize = 16 * 1024;

/// Read until the end of the request headers. The redirect is small, but a
/// single `read` can still return a partial request line.
async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() > MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Serve one connection. Returns true once a result has been delivered and
/// the server should stop accepting.
async fn handle_connection(
    mut socket: TcpStream,
    code_tx: &mut Option<oneshot::Sender<String>>,
    error_tx: &mut Option<oneshot::Sender<AuthError>>,
) -> bool {
    let request = match read_request_head(&mut socket).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to read callback request: {e}");
            return false;
        }
    };

    let Some(path) = request_path(&request) else {
        let _ = socket
            .write_all(http_response(400, &failure_page("Malformed request.")).as_bytes())
            .await;
        return false;
    };

    if !path.starts_with(CALLBACK_PATH) {
        debug!(path, "Ignoring request outside the callback path");
        let _ = socket
            .write_all(http_response(404, &failure_page("Not found.")).as_bytes())
            .await;
        return false;
    }

    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
    let (mut code, mut error) = (None, None);
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    // Excess deliveries after the first are dropped: the senders are
    // consumed exactly once and the loop stops.
    if let Some(error) = error {
        let _ = socket
            .write_all(
                http_response(400, &failure_page(&format!("Error: {error}"))).as_bytes(),
            )
            .await;
        if let Some(tx) = error_tx.take() {
            let _ = tx.send(AuthError::provider(error, None));
        }
        return true;
    }

    if let Some(code) = code {
        let _ = socket
            .write_all(http_response(200, &success_page()).as_bytes())
            .await;
        if let Some(tx) = code_tx.take() {
            let _ = tx.send(code);
        }
        return true;
    }

    // Redirect hit the right path but carried neither outcome
    let _ = socket
        .write_all(http_response(400, &failure_page("No authorization code received.")).as_bytes())
        .await;
    if let Some(tx) = error_tx.take() {
        let _ = tx.send(AuthError::MissingCallbackCode);
    }
    true
}

fn request_path(request: &str) -> Option<&str> {
    request.lines().next()?.split_whitespace().nth(1)
}

fn http_response(status: u16, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Bad Request",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn success_page() -> String {
    "<html><body><h1>Authentication successful!</h1>\
     <p>You can close this window and return to Hytide.</p></body></html>"
        .to_string()
}

fn failure_page(detail: &str) -> String {
    format!(
        "<html><body><h1>Authentication failed</h1><p>{detail}</p>\
         <p>You can close this window.</p></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn send_request(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn delivers_authorization_code() {
        let (server, channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();

        let response =
            send_request(port, "/authorization-callback?code=abc123&state=xyz").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Authentication successful"));

        let code = channels.code.await.unwrap();
        assert_eq!(code, "abc123");
        server.shutdown();
    }

    #[tokio::test]
    async fn delivers_provider_error() {
        let (server, channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();

        let response = send_request(port, "/authorization-callback?error=access_denied").await;
        assert!(response.starts_with("HTTP/1.1 400"));

        let err = channels.error.await.unwrap();
        match err {
            AuthError::Provider { error, .. } => assert_eq!(error, "access_denied"),
            other => panic!("unexpected error: {other}"),
        }
        server.shutdown();
    }

    #[tokio::test]
    async fn empty_callback_is_a_protocol_violation() {
        let (server, channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();

        send_request(port, "/authorization-callback").await;
        let err = channels.error.await.unwrap();
        assert!(matches!(err, AuthError::MissingCallbackCode));
        server.shutdown();
    }

    #[tokio::test]
    async fn losing_channel_stays_open_after_a_result() {
        let (server, channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();

        send_request(port, "/authorization-callback?code=abc123").await;
        assert_eq!(channels.code.await.unwrap(), "abc123");

        // The error side must still be pending, not closed: a waiter racing
        // both channels would otherwise see closure before the code.
        let mut error_rx = channels.error;
        match error_rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => {}
            other => panic!("error channel settled early: {other:?}"),
        }
        server.shutdown();
    }

    #[tokio::test]
    async fn request_split_across_segments_still_parses() {
        let (server, channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(b"GET /authorization-call").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream
            .write_all(b"back?code=split123 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert_eq!(channels.code.await.unwrap(), "split123");
        server.shutdown();
    }

    #[tokio::test]
    async fn unrelated_paths_do_not_consume_the_attempt() {
        let (server, channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();

        let response = send_request(port, "/favicon.ico").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        // The real redirect still resolves afterwards
        send_request(port, "/authorization-callback?code=later").await;
        assert_eq!(channels.code.await.unwrap(), "later");
        server.shutdown();
    }

    #[tokio::test]
    async fn shutdown_releases_the_port() {
        let (server, _channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();
        server.shutdown();

        // The accept loop exits asynchronously; the port must become
        // bindable again shortly after.
        for _ in 0..50 {
            if TcpListener::bind(("127.0.0.1", port)).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("port {port} was not released after shutdown");
    }

    #[tokio::test]
    async fn drop_also_releases_the_port() {
        let (server, _channels) = CallbackServer::bind().await.unwrap();
        let port = server.port();
        drop(server);

        for _ in 0..50 {
            if TcpListener::bind(("127.0.0.1", port)).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("port {port} was not released after drop");
    }
}
