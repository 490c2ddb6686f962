use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Health of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// The task that owns the open transport
pub(crate) struct StreamConnection {
    pub generation: u64,
    pub task: JoinHandle<()>,
}

impl StreamConnection {
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the reader task; the transport is dropped with it
    pub fn close(self) {
        self.task.abort();
    }
}
