#![allow(dead_code)]

pub mod fixtures;
pub mod socket_guard;

/// Binds a mock server or returns early from the calling test.
macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = $crate::support::socket_guard::local_mock_server().await else {
            return;
        };
        mock_server
    }};
}
