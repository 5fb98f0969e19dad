//! Mock servers for sandboxes that may forbid binding sockets.

use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a wiremock server, or returns `None` when loopback sockets are unavailable.
pub async fn local_mock_server() -> Option<MockServer> {
    if let Err(err) = TcpListener::bind("127.0.0.1:0") {
        eprintln!("skipping: cannot bind a loopback socket ({err})");
        return None;
    }
    Some(MockServer::start().await)
}
