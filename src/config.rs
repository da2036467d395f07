//! Configuration options for the MarchéHub client

use std::time::Duration;

/// Configuration options for the MarchéHub client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout applied to the shared HTTP client
    pub request_timeout: Option<Duration>,

    /// Interval between realtime heartbeat messages
    pub heartbeat_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the realtime heartbeat interval
    pub fn with_heartbeat_interval(mut self, value: Duration) -> Self {
        self.heartbeat_interval = value;
        self
    }
}
