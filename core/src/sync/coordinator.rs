//! Lockstep border exchange
//!
//! One step publishes this peer's border, applies the partner's border, then
//! swaps sync tokens. Neither peer can start step N+1 until both have applied
//! step N.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::grid::GridEdges;
use crate::protocol::constants::{MIN_GRID_WIDTH, SYNC_TOKEN};
use crate::protocol::Role;
use crate::stats::{Phase, StepStats};
use crate::sync::framing::{self, write_frame, Frame, FrameReader};
use crate::sync::link::PeerSession;
use crate::{Error, Result};

/// Where the coordinator is within a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    ExchangingBorder,
    Barrier,
    Closed,
}

/// Requests a running coordinator to stop
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by the run loop between and during steps
#[derive(Clone, Debug)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop is requested. Never resolves if every handle is
    /// dropped without stopping.
    pub async fn stopped(&mut self) {
        let senders_gone = self.rx.wait_for(|stopped| *stopped).await.is_err();
        if senders_gone {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Drives the per-step protocol for one peer
pub struct StepCoordinator<G, R, W> {
    role: Role,
    grid_height: usize,
    read_timeout: Duration,
    streams: Option<(W, FrameReader<R>)>,
    grid: G,
    step: u64,
    state: StepState,
    stats: StepStats,
    sync_frame: Frame,
}

impl<G, R, W> StepCoordinator<G, R, W>
where
    G: GridEdges,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(session: PeerSession<R, W>, grid: G) -> Result<Self> {
        if grid.width() < MIN_GRID_WIDTH {
            return Err(Error::Config(format!(
                "grid width {} leaves no owned column (minimum {})",
                grid.width(),
                MIN_GRID_WIDTH
            )));
        }
        if grid.height() != session.grid_height {
            return Err(Error::Config(format!(
                "grid height {} does not match session height {}",
                grid.height(),
                session.grid_height
            )));
        }

        Ok(Self {
            role: session.role,
            grid_height: session.grid_height,
            read_timeout: session.read_timeout,
            streams: Some((session.send, session.recv)),
            grid,
            step: 0,
            state: StepState::ExchangingBorder,
            stats: StepStats::new(),
            sync_frame: Frame::from_payload(SYNC_TOKEN)?,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn steps_completed(&self) -> u64 {
        self.step
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut G {
        &mut self.grid
    }

    pub fn into_grid(self) -> G {
        self.grid
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.streams.is_none()
    }

    /// Run one lockstep iteration and return the new step count.
    ///
    /// Any error closes both connections before it is returned.
    pub async fn step(&mut self) -> Result<u64> {
        match self.exchange().await {
            Ok(step) => Ok(step),
            Err(e) => {
                tracing::error!("step {} failed: {}", self.step + 1, e);
                self.close().await;
                Err(e)
            }
        }
    }

    async fn exchange(&mut self) -> Result<u64> {
        let Some((send, recv)) = self.streams.as_mut() else {
            return Err(Error::StreamClosed);
        };

        self.state = StepState::ExchangingBorder;

        let started = Instant::now();
        let edge = self.grid.get_edge(self.role);
        self.stats.record(Phase::Extract, started.elapsed());

        let started = Instant::now();
        let frame = framing::encode(&edge)?;
        self.stats.record(Phase::Encode, started.elapsed());

        let started = Instant::now();
        write_frame(send, &frame).await?;
        self.stats.record(Phase::Send, started.elapsed());

        let started = Instant::now();
        let incoming = receive(recv, self.read_timeout).await?;
        self.stats.record(Phase::Receive, started.elapsed());

        let started = Instant::now();
        let vector = framing::decode(incoming.as_bytes())?;
        self.stats.record(Phase::Decode, started.elapsed());

        if vector.len() != self.grid_height {
            return Err(Error::Protocol(format!(
                "expected border of {} pixels, got {}",
                self.grid_height,
                vector.len()
            )));
        }

        let started = Instant::now();
        self.grid.set_edge(self.role, vector);
        self.stats.record(Phase::Apply, started.elapsed());

        self.state = StepState::Barrier;

        let started = Instant::now();
        write_frame(send, &self.sync_frame).await?;
        let token = receive(recv, self.read_timeout).await?;
        self.stats.record(Phase::Barrier, started.elapsed());
        tracing::trace!("sync token: {:?}", String::from_utf8_lossy(token.payload()));

        self.step += 1;
        self.state = StepState::ExchangingBorder;
        tracing::debug!("{} peer completed step {}", self.role, self.step);
        Ok(self.step)
    }

    /// Step until stopped, until `max_steps` is reached, or until an error.
    ///
    /// Both connections are closed before this returns.
    pub async fn run(&mut self, mut stop: StopSignal, max_steps: Option<u64>) -> Result<u64> {
        let result = loop {
            if stop.is_stopped() {
                tracing::info!("stop requested after step {}", self.step);
                break Ok(());
            }
            if max_steps.is_some_and(|max| self.step >= max) {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => {
                    tracing::info!("stop requested during step {}", self.step + 1);
                    break Ok(());
                }
                res = self.step() => {
                    if let Err(e) = res {
                        break Err(e);
                    }
                }
            }
        };

        self.close().await;
        tracing::info!("{} peer finished after {} step(s)", self.role, self.step);
        result.map(|_| self.step)
    }

    /// Shut down the outbound stream and drop both connections
    pub async fn close(&mut self) {
        if let Some((mut send, recv)) = self.streams.take() {
            if let Err(e) = send.shutdown().await {
                tracing::debug!("error shutting down outbound stream: {}", e);
            }
            drop(recv);
            self.state = StepState::Closed;
            tracing::debug!("{} peer connections closed", self.role);
        }
    }
}

async fn receive<R: AsyncRead + Unpin>(recv: &mut FrameReader<R>, wait: Duration) -> Result<Frame> {
    tokio::time::timeout(wait, recv.read_frame())
        .await
        .map_err(|_| Error::ReceiveTimeout(wait))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::protocol::BorderVector;
    use tokio::io::DuplexStream;

    type Coordinator = StepCoordinator<Grid, DuplexStream, DuplexStream>;

    /// Coordinator plus the partner's ends of both streams
    fn lone_peer(height: usize, read_timeout: Duration) -> (Coordinator, DuplexStream, FrameReader<DuplexStream>) {
        let (send, partner_recv) = tokio::io::duplex(4096);
        let (partner_send, recv) = tokio::io::duplex(4096);
        let session = PeerSession::new(Role::Left, height, read_timeout, send, recv);
        let coordinator = StepCoordinator::new(session, Grid::seeded(6, height, 1)).unwrap();
        (coordinator, partner_send, FrameReader::new(partner_recv))
    }

    #[tokio::test]
    async fn test_height_mismatch_rejected() {
        let (send, _a) = tokio::io::duplex(64);
        let (_b, recv) = tokio::io::duplex(64);
        let session = PeerSession::new(Role::Left, 4, Duration::from_secs(1), send, recv);
        let result = StepCoordinator::new(session, Grid::new(6, 5));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_narrow_grid_rejected() {
        for width in [0, 1, 2] {
            let (send, _a) = tokio::io::duplex(64);
            let (_b, recv) = tokio::io::duplex(64);
            let session = PeerSession::new(Role::Right, 4, Duration::from_secs(1), send, recv);
            let result = StepCoordinator::new(session, Grid::new(width, 4));
            assert!(matches!(result, Err(Error::Config(_))), "width {} accepted", width);
        }
    }

    #[tokio::test]
    async fn test_step_with_scripted_partner() {
        let (mut coordinator, mut partner_send, mut partner_recv) = lone_peer(4, Duration::from_secs(1));
        let incoming = BorderVector::new(vec![[7, 8, 9]; 4]);

        write_frame(&mut partner_send, &framing::encode(&incoming).unwrap()).await.unwrap();
        write_frame(&mut partner_send, &Frame::from_payload(SYNC_TOKEN).unwrap()).await.unwrap();

        assert_eq!(coordinator.step().await.unwrap(), 1);
        assert_eq!(coordinator.grid().column(5), incoming);
        assert_eq!(coordinator.state(), StepState::ExchangingBorder);

        let sent = partner_recv.read_frame().await.unwrap();
        assert_eq!(framing::decode(sent.as_bytes()).unwrap(), coordinator.grid().column(4));
        assert_eq!(partner_recv.read_frame().await.unwrap().payload(), SYNC_TOKEN);
    }

    #[tokio::test]
    async fn test_wrong_border_length_is_protocol_error() {
        let (mut coordinator, mut partner_send, _partner_recv) = lone_peer(4, Duration::from_secs(1));
        let short = BorderVector::new(vec![[1, 1, 1]; 3]);
        write_frame(&mut partner_send, &framing::encode(&short).unwrap()).await.unwrap();

        assert!(matches!(coordinator.step().await, Err(Error::Protocol(_))));
        assert!(coordinator.is_closed());
        assert_eq!(coordinator.state(), StepState::Closed);
        assert!(matches!(coordinator.step().await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_partial_pixel_is_codec_error() {
        let (mut coordinator, mut partner_send, _partner_recv) = lone_peer(4, Duration::from_secs(1));
        write_frame(&mut partner_send, &Frame::from_payload(&[1, 2, 3, 4]).unwrap()).await.unwrap();

        assert!(matches!(coordinator.step().await, Err(Error::Codec(_))));
        assert!(coordinator.is_closed());
    }

    #[tokio::test]
    async fn test_partner_hangup_is_stream_closed() {
        let (mut coordinator, partner_send, _partner_recv) = lone_peer(4, Duration::from_secs(1));
        drop(partner_send);

        assert!(matches!(coordinator.step().await, Err(Error::StreamClosed)));
        assert_eq!(coordinator.steps_completed(), 0);
    }

    #[tokio::test]
    async fn test_silent_partner_times_out() {
        let wait = Duration::from_millis(50);
        let (mut coordinator, _partner_send, _partner_recv) = lone_peer(4, wait);

        let result = coordinator.step().await;
        assert!(matches!(result, Err(Error::ReceiveTimeout(d)) if d == wait));
        assert!(coordinator.is_closed());
    }

    #[tokio::test]
    async fn test_missing_sync_times_out_in_barrier() {
        let wait = Duration::from_millis(50);
        let (mut coordinator, mut partner_send, _partner_recv) = lone_peer(4, wait);
        let incoming = BorderVector::new(vec![[7, 8, 9]; 4]);
        write_frame(&mut partner_send, &framing::encode(&incoming).unwrap()).await.unwrap();

        assert!(matches!(coordinator.step().await, Err(Error::ReceiveTimeout(_))));
        assert_eq!(coordinator.steps_completed(), 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_stalled_step() {
        let (mut coordinator, _partner_send, mut partner_recv) = lone_peer(4, Duration::from_secs(30));
        let (handle, signal) = stop_signal();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        });

        let steps = coordinator.run(signal, None).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(steps, 0);
        assert!(coordinator.is_closed());

        // Border frame went out, then the outbound stream was shut down.
        partner_recv.read_frame().await.unwrap();
        assert!(matches!(partner_recv.read_frame().await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_run_after_stop_does_nothing() {
        let (mut coordinator, _partner_send, _partner_recv) = lone_peer(4, Duration::from_secs(1));
        let (handle, signal) = stop_signal();
        handle.stop();

        assert_eq!(coordinator.run(signal, None).await.unwrap(), 0);
        assert!(coordinator.is_closed());
    }

    #[tokio::test]
    async fn test_stats_recorded_per_step() {
        let (mut coordinator, mut partner_send, _partner_recv) = lone_peer(4, Duration::from_secs(1));
        let incoming = BorderVector::new(vec![[7, 8, 9]; 4]);
        for _ in 0..2 {
            write_frame(&mut partner_send, &framing::encode(&incoming).unwrap()).await.unwrap();
            write_frame(&mut partner_send, &Frame::from_payload(SYNC_TOKEN).unwrap()).await.unwrap();
        }

        let (_handle, signal) = stop_signal();
        assert_eq!(coordinator.run(signal, Some(2)).await.unwrap(), 2);

        for phase in Phase::ALL {
            assert_eq!(coordinator.stats().timing(phase).count, 2, "{}", phase.name());
        }
    }
}
