//! Connection notice sink.
//!
//! The pool reports connection-lifecycle events (lost connections, failover,
//! server notices) over a channel. The sink formats them on standard error.
//! Notices are report-only: they never feed back into processing.

use tokio::sync::mpsc;

use crate::result_code::ResultCode;

/// A notice emitted by the connection pool.
#[derive(Debug, Clone)]
pub enum ServerNotice {
    /// A connection was classified defunct and discarded.
    ConnectionDefunct {
        /// The server, as `host:port`.
        server: String,
        /// The result code that condemned the connection.
        code: ResultCode,
    },
    /// Processing moved to a replacement connection.
    Failover {
        /// The server the replacement was established to.
        server: String,
    },
    /// The server sent a notice (e.g. notice of disconnection).
    ServerMessage {
        /// The notification OID, if known.
        oid: Option<String>,
        /// The notification text.
        detail: String,
    },
}

impl ServerNotice {
    /// Renders the notice for the error channel.
    #[must_use]
    pub fn format_lines(&self) -> Vec<String> {
        match self {
            ServerNotice::ConnectionDefunct { server, code } => vec![format!(
                "connection to {server} is no longer usable (result code {code})"
            )],
            ServerNotice::Failover { server } => {
                vec![format!("continuing on a new connection to {server}")]
            }
            ServerNotice::ServerMessage { oid, detail } => {
                let mut lines = vec!["unsolicited notification from the server:".to_string()];
                if let Some(oid) = oid {
                    lines.push(format!("  OID: {oid}"));
                }
                lines.push(format!("  {detail}"));
                lines
            }
        }
    }
}

/// Receives pool notices and writes them to standard error.
pub struct NotificationSink {
    rx: mpsc::UnboundedReceiver<ServerNotice>,
}

impl NotificationSink {
    /// Creates the channel pair: the sender goes to the pool, the sink is
    /// run as a background task.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<ServerNotice>, NotificationSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, NotificationSink { rx })
    }

    /// Drains notices until every sender is gone.
    pub async fn run(mut self) {
        while let Some(notice) = self.rx.recv().await {
            for line in notice.format_lines() {
                eprintln!("# {line}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_defunct_notice() {
        let notice = ServerNotice::ConnectionDefunct {
            server: "ds1.example.com:389".to_string(),
            code: ResultCode::SERVER_DOWN,
        };
        let lines = notice.format_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("ds1.example.com:389"));
        assert!(lines[0].contains("81 (server down)"));
    }

    #[test]
    fn test_format_server_message() {
        let notice = ServerNotice::ServerMessage {
            oid: Some("1.3.6.1.4.1.1466.20036".to_string()),
            detail: "the server is shutting down".to_string(),
        };
        let lines = notice.format_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("1.3.6.1.4.1.1466.20036"));
    }

    #[tokio::test]
    async fn test_channel_closes_when_senders_drop() {
        let (tx, sink) = NotificationSink::channel();
        drop(tx);
        // run() must terminate once all senders are gone.
        sink.run().await;
    }
}
