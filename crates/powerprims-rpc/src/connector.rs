use std::sync::Arc;

use powerprims_frame::FrameConfig;

use crate::channel::Channel;
use crate::error::Result;

/// Connect to a powerprims server given as `host:port`.
///
/// The returned channel is ready to be handed to any number of remote
/// façades.
pub fn connect(addr: &str) -> Result<Arc<Channel>> {
    connect_with_config(addr, FrameConfig::default())
}

/// Connect with explicit envelope configuration.
pub fn connect_with_config(addr: &str, config: FrameConfig) -> Result<Arc<Channel>> {
    let channel = Channel::connect_with_config(addr, config)?;
    tracing::debug!(addr, "channel open");
    Ok(Arc::new(channel))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::thread;

    use powerprims_transport::TcpServer;

    use super::*;
    use crate::error::RpcError;

    #[test]
    fn connect_convenience() {
        let server = TcpServer::bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
            .expect("server should bind");
        let addr = format!("127.0.0.1:{}", server.local_addr().port());

        let acceptor = thread::spawn(move || {
            let (stream, _) = server.accept().expect("server should accept");
            let channel = Channel::new(stream).expect("server channel should build");
            let request = channel
                .receive()
                .expect("receive should succeed")
                .expect("a request should arrive");
            channel.send(&request).expect("echo should succeed");
        });

        let channel = connect(&addr).expect("client should connect");
        assert_eq!(
            channel.peer_addr().map(|a| a.port()),
            addr.rsplit(':').next().and_then(|p| p.parse().ok())
        );
        let echoed = channel
            .call_raw("powerprims.echo.Ping", b"hi")
            .expect("call should succeed");
        assert_eq!(echoed.type_id, "powerprims.echo.Ping");

        acceptor.join().expect("acceptor should not panic");
    }

    #[test]
    fn connect_rejects_malformed_address() {
        let err = connect("missing-port").expect_err("connect should fail");
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
