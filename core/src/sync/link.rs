//! Connection setup between the two peers
//!
//! Each peer listens for the partner's outbound stream and connects its own
//! outbound stream to the partner, so every socket carries data in one
//! direction only. Both peers start at roughly the same time, so the connect
//! side retries until the partner's listener is up.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::protocol::constants::HANDSHAKE_TOKEN;
use crate::protocol::{Endpoint, Role};
use crate::sync::framing::{write_frame, Frame, FrameReader};
use crate::{Config, Error, Result};

/// Bounded retry for outbound connects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Everything a coordinator needs once both directions are live
pub struct PeerSession<R, W> {
    pub role: Role,
    pub grid_height: usize,
    pub read_timeout: Duration,
    pub send: W,
    pub recv: FrameReader<R>,
}

impl<R, W> PeerSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(role: Role, grid_height: usize, read_timeout: Duration, send: W, recv: R) -> Self {
        Self {
            role,
            grid_height,
            read_timeout,
            send,
            recv: FrameReader::new(recv),
        }
    }
}

/// Bind the local receive endpoint and start listening
pub async fn bind_and_listen(local: Endpoint) -> Result<TcpListener> {
    let addr = local.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;

    let bound = listener.local_addr()?;
    tracing::info!("listening for peer on {}", bound);
    Ok(listener)
}

/// Connect to the partner, retrying while its listener is not up yet.
///
/// When `source` is given the outbound socket is bound to it first.
pub async fn connect_with_retry(
    remote: Endpoint,
    source: Option<Endpoint>,
    policy: RetryPolicy,
) -> Result<TcpStream> {
    let addr = remote.socket_addr();
    retry_connect(addr, policy, || connect_once(addr, source)).await
}

async fn connect_once(addr: SocketAddr, source: Option<Endpoint>) -> std::io::Result<TcpStream> {
    let Some(source) = source else {
        return TcpStream::connect(addr).await;
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(source.socket_addr())?;
    socket.connect(addr).await
}

async fn retry_connect<T, F, Fut>(addr: SocketAddr, policy: RetryPolicy, mut connect: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    for attempt in 1..=policy.max_attempts {
        match connect().await {
            Ok(conn) => {
                tracing::info!("connected to peer at {} (attempt {})", addr, attempt);
                return Ok(conn);
            }
            Err(e) => {
                tracing::debug!("connect attempt {} to {} failed: {}", attempt, addr, e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    tracing::warn!("giving up on {} after {} attempt(s)", addr, policy.max_attempts);
    Err(Error::ConnectTimeout {
        addr,
        attempts: policy.max_attempts,
    })
}

/// Wait for the partner's outbound stream
pub async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr)> {
    let (stream, addr) = listener.accept().await.map_err(Error::Accept)?;
    tracing::info!("accepted peer connection from {}", addr);
    Ok((stream, addr))
}

/// Like [`accept`], but give up if the partner has not connected within `wait`
pub async fn accept_within(listener: &TcpListener, wait: Duration) -> Result<(TcpStream, SocketAddr)> {
    tokio::time::timeout(wait, accept(listener))
        .await
        .map_err(|_| Error::AcceptTimeout(wait))?
}

/// Confirm both directions carry data before the step loop starts.
///
/// The token's content is not checked, only that a frame arrives in time.
pub async fn handshake<R, W>(send: &mut W, recv: &mut FrameReader<R>, wait: Duration) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_frame(send, &Frame::from_payload(HANDSHAKE_TOKEN)?).await?;

    let token = tokio::time::timeout(wait, recv.read_frame())
        .await
        .map_err(|_| Error::HandshakeTimeout(wait))??;

    tracing::debug!("handshake token: {:?}", String::from_utf8_lossy(token.payload()));
    Ok(())
}

/// Bring up both connections and handshake.
///
/// Only the read half of the accepted stream and the write half of the
/// connected stream are kept.
pub async fn establish(config: &Config) -> Result<PeerSession<OwnedReadHalf, OwnedWriteHalf>> {
    config.validate()?;

    let listener = bind_and_listen(config.local_endpoint()).await?;
    let outbound = connect_with_retry(config.remote_endpoint(), config.source_endpoint(), config.retry_policy()).await?;
    let (inbound, _) = accept_within(&listener, config.handshake_timeout()).await?;
    drop(listener);

    for stream in [&outbound, &inbound] {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("failed to set TCP_NODELAY: {}", e);
        }
    }

    let (recv, _) = inbound.into_split();
    let (_, send) = outbound.into_split();

    let mut session = PeerSession::new(
        config.role,
        config.grid_height,
        config.read_timeout(),
        send,
        recv,
    );
    handshake(&mut session.send, &mut session.recv, config.handshake_timeout()).await?;

    tracing::info!("link to {} peer is up", config.role.partner());
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn localhost(port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retry_stops_at_max_attempts() {
        let attempts = AtomicU32::new(0);
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let result: Result<()> = retry_connect(addr, fast_policy(4), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)) }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert!(matches!(result, Err(Error::ConnectTimeout { attempts: 4, .. })));
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let attempts = AtomicU32::new(0);
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let result = retry_connect(addr, fast_policy(10), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_never_connects() {
        let attempts = AtomicU32::new(0);
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let result: Result<()> = retry_connect(addr, fast_policy(0), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(Error::ConnectTimeout { attempts: 0, .. })));
    }

    #[tokio::test]
    async fn test_connect_refused_times_out() {
        // Grab a free port, then close it so nothing is listening.
        let listener = bind_and_listen(localhost(0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect_with_retry(localhost(port), None, fast_policy(3)).await;
        assert!(matches!(result, Err(Error::ConnectTimeout { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_bind_in_use() {
        let listener = bind_and_listen(localhost(0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = bind_and_listen(localhost(port)).await;
        assert!(matches!(result, Err(Error::Bind { .. })));
    }

    #[tokio::test]
    async fn test_connect_and_accept() {
        let listener = bind_and_listen(localhost(0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (connected, accepted) = tokio::join!(
            connect_with_retry(localhost(port), None, fast_policy(3)),
            accept(&listener),
        );
        let connected = connected.unwrap();
        let (accepted, from) = accepted.unwrap();

        assert_eq!(connected.local_addr().unwrap(), from);
        assert_eq!(accepted.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_accept_gives_up_without_partner() {
        let listener = bind_and_listen(localhost(0)).await.unwrap();
        let wait = Duration::from_millis(50);

        let result = accept_within(&listener, wait).await;
        assert!(matches!(result, Err(Error::AcceptTimeout(d)) if d == wait));
    }

    #[tokio::test]
    async fn test_connect_waits_for_late_listener() {
        let scratch = bind_and_listen(localhost(0)).await.unwrap();
        let port = scratch.local_addr().unwrap().port();
        drop(scratch);

        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let listener = bind_and_listen(localhost(port)).await.unwrap();
            accept(&listener).await.unwrap();
        });

        let policy = RetryPolicy {
            max_attempts: 100,
            interval: Duration::from_millis(10),
        };
        assert!(connect_with_retry(localhost(port), None, policy).await.is_ok());
        late.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_both_ways() {
        let (a_send, b_recv) = tokio::io::duplex(64);
        let (b_send, a_recv) = tokio::io::duplex(64);
        let wait = Duration::from_secs(1);

        let mut a = PeerSession::new(Role::Left, 4, wait, a_send, a_recv);
        let mut b = PeerSession::new(Role::Right, 4, wait, b_send, b_recv);

        let (ra, rb) = tokio::join!(
            handshake(&mut a.send, &mut a.recv, wait),
            handshake(&mut b.send, &mut b.recv, wait),
        );
        ra.unwrap();
        rb.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_times_out() {
        let (mut send, _peer_recv) = tokio::io::duplex(64);
        let (_peer_send, recv) = tokio::io::duplex(64);
        let mut recv = FrameReader::new(recv);

        let wait = Duration::from_millis(50);
        let result = handshake(&mut send, &mut recv, wait).await;
        assert!(matches!(result, Err(Error::HandshakeTimeout(d)) if d == wait));
    }

    #[tokio::test]
    async fn test_handshake_peer_gone() {
        let (mut send, _peer_recv) = tokio::io::duplex(64);
        let (peer_send, recv) = tokio::io::duplex(64);
        drop(peer_send);
        let mut recv = FrameReader::new(recv);

        let result = handshake(&mut send, &mut recv, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::StreamClosed)));
    }
}
