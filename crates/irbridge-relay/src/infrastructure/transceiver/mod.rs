//! Transceiver adapters.
//!
//! [`connect`] opens the device described by a [`DeviceEndpoint`] and wraps
//! it in a [`LineLinkTransceiver`].  Two kinds of link are supported:
//!
//! - **Serial** – the device node of the USB serial adapter, e.g.
//!   `/dev/ttyACM0`.  The node is opened twice, once for reading and once for
//!   writing, so that a pending read never holds up a command.  Line settings
//!   (baud rate and so on) are expected to be configured on the node already,
//!   e.g. with `stty -F /dev/ttyACM0 9600 raw -echo`.
//! - **TCP** – a serial-to-network bridge such as `ser2net`.

pub mod line_link;
pub mod mock;

use std::fmt;
use std::path::PathBuf;

use tokio::io::AsyncWrite;
use tracing::info;

use crate::application::convert_signals::TransceiverError;

pub use line_link::LineLinkTransceiver;
pub use mock::MockTransceiver;

/// Type-erased write half used by [`connect`].
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A line-link transceiver over whichever link [`connect`] opened.
pub type DeviceLink = LineLinkTransceiver<BoxedWriter>;

/// Where the transceiver is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEndpoint {
    /// Serial device node.
    Serial(PathBuf),
    /// `host:port` of a TCP serial bridge.
    Tcp(String),
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(path) => write!(f, "serial:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// Opens `endpoint` and starts its line reader.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`TransceiverError::Io`] if the device node cannot be opened or
/// the TCP connection fails.
pub async fn connect(endpoint: &DeviceEndpoint) -> Result<DeviceLink, TransceiverError> {
    let link = match endpoint {
        DeviceEndpoint::Serial(path) => {
            let reader = tokio::fs::OpenOptions::new().read(true).open(path).await?;
            let writer = tokio::fs::OpenOptions::new().write(true).open(path).await?;
            LineLinkTransceiver::new(reader, Box::new(writer) as BoxedWriter)
        }
        DeviceEndpoint::Tcp(addr) => {
            let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
            stream.set_nodelay(true)?;
            let (reader, writer) = stream.into_split();
            LineLinkTransceiver::new(reader, Box::new(writer) as BoxedWriter)
        }
    };
    info!("connected to transceiver at {endpoint}");
    Ok(link)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use crate::application::convert_signals::Transceiver;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(
            DeviceEndpoint::Serial(PathBuf::from("/dev/ttyACM0")).to_string(),
            "serial:/dev/ttyACM0"
        );
        assert_eq!(
            DeviceEndpoint::Tcp("127.0.0.1:4000".to_string()).to_string(),
            "tcp:127.0.0.1:4000"
        );
    }

    #[tokio::test]
    async fn test_connect_missing_serial_node_fails_with_io_error() {
        let endpoint = DeviceEndpoint::Serial(PathBuf::from("/nonexistent/ttyIR0"));
        let result = connect(&endpoint).await;
        assert!(matches!(result, Err(TransceiverError::Io(_))));
    }

    #[tokio::test]
    async fn test_connect_tcp_bridge_and_enable_receiver() {
        // Arrange: a fake bridge that acknowledges one command.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bridge = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (r, mut w) = socket.into_split();
            let mut lines = BufReader::new(r).lines();
            let command = lines.next_line().await.unwrap().unwrap();
            w.write_all(b"250 OK\r\n").await.unwrap();
            command
        });

        // Act
        let link = connect(&DeviceEndpoint::Tcp(addr.to_string())).await.unwrap();
        link.enable_receiver(true).await.unwrap();

        // Assert
        assert_eq!(bridge.await.unwrap(), "1,1,1");
        assert!(link.is_receiver_enabled());
    }
}
