//! Serial link to the electronic dartboard.
//!
//! The supervisor keeps trying to open the port, reads newline-delimited JSON
//! frames while the link is up and forwards hits to the match engine. Link state
//! is published on a `watch` channel and viewers are told whenever the board
//! goes up or down.

use std::{io, sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader},
    sync::watch,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    dto::dartboard::RawFrame,
    error::EngineError,
    services::engine::EngineHandle,
    state::{
        broadcast::{BroadcastHub, broadcast_dartboard_status},
        throw::{InvalidThrow, Throw, classify},
    },
};

/// Hardware link lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    /// No port open.
    #[default]
    Disconnected,
    /// Opening the port.
    Connecting,
    /// Reading frames.
    Connected,
}

impl LinkState {
    /// Whether frames can currently arrive.
    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }
}

/// Byte stream produced by an open board link.
pub type BoardStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opens the byte stream coming from the board.
pub trait BoardConnector: Send + Sync {
    /// Human readable target, used in logs.
    fn describe(&self) -> String;
    /// Open the link.
    fn connect(&self) -> BoxFuture<'static, io::Result<BoardStream>>;
}

/// Serial port connector.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: String,
    baud_rate: u32,
}

impl SerialConnector {
    /// Connector for `path` at `baud_rate`.
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

impl BoardConnector for SerialConnector {
    fn describe(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }

    #[cfg(feature = "serial")]
    fn connect(&self) -> BoxFuture<'static, io::Result<BoardStream>> {
        use tokio_serial::SerialPortBuilderExt;

        let builder = tokio_serial::new(self.path.clone(), self.baud_rate);
        async move {
            let port = builder.open_native_async().map_err(io::Error::other)?;
            Ok(Box::new(port) as BoardStream)
        }
        .boxed()
    }

    #[cfg(not(feature = "serial"))]
    fn connect(&self) -> BoxFuture<'static, io::Result<BoardStream>> {
        let path = self.path.clone();
        async move {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("serial support is disabled, cannot open {path}"),
            ))
        }
        .boxed()
    }
}

/// A decoded firmware frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardFrame {
    /// A dart landed.
    Hit {
        /// Classified dart.
        dart: Throw,
        /// Points claimed by the firmware.
        reported_score: Option<u32>,
    },
    /// Any other firmware event (`ready`, ...).
    Event(String),
}

/// A line that is not a usable firmware frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not JSON or not an object with an `event`.
    #[error("malformed hardware frame: {0}")]
    MalformedHardwareFrame(#[from] serde_json::Error),
    /// A hit without its coordinates.
    #[error("hit frame without `{0}`")]
    MissingField(&'static str),
    /// Coordinates off the board.
    #[error(transparent)]
    InvalidThrow(#[from] InvalidThrow),
}

/// Decode one line sent by the firmware.
pub fn parse_frame(line: &str) -> Result<BoardFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(line)?;
    if raw.event != "hit" {
        return Ok(BoardFrame::Event(raw.event));
    }

    let sector = raw.sector.ok_or(FrameError::MissingField("sector"))?;
    let multiplier = raw.multiplier.ok_or(FrameError::MissingField("multiplier"))?;
    Ok(BoardFrame::Hit {
        dart: classify(sector, multiplier)?,
        reported_score: raw.score,
    })
}

/// Read frames until the stream ends or `cancel` fires. Returns the number of
/// hits forwarded to the engine.
pub async fn pump_frames<R>(
    mut reader: R,
    engine: &EngineHandle,
    cancel: &CancellationToken,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut hits = 0;

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(hits),
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            return Ok(hits);
        }

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim();
        if line.is_empty() {
            continue;
        }

        match parse_frame(line) {
            Ok(BoardFrame::Hit {
                dart,
                reported_score,
            }) => {
                if reported_score.is_some_and(|score| score != u32::from(dart.total)) {
                    warn!(%dart, ?reported_score, total = dart.total, "firmware score disagrees");
                }
                debug!(%dart, "hit received");
                if let Err(EngineError::EngineUnavailable) = engine.board_hit(dart).await {
                    warn!("match engine is gone; closing dartboard link");
                    return Ok(hits);
                }
                hits += 1;
            }
            Ok(BoardFrame::Event(event)) => {
                info!(%event, "dartboard event ignored");
            }
            Err(err) => {
                warn!(error = %err, frame = %line, "dropping dartboard frame");
            }
        }
    }
}

/// Delays between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before the very first attempt.
    pub initial_delay: Duration,
    /// Wait after a link that opened and then closed.
    pub after_close: Duration,
    /// Wait after the port failed to open.
    pub after_failure: Duration,
}

impl From<&AppConfig> for ReconnectPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_connect_delay_ms),
            after_close: Duration::from_millis(config.reconnect_after_close_ms),
            after_failure: Duration::from_millis(config.reconnect_after_failure_ms),
        }
    }
}

/// Keeps the board link up for the lifetime of the server.
pub struct DartboardSupervisor {
    connector: Arc<dyn BoardConnector>,
    engine: EngineHandle,
    hub: Arc<BroadcastHub>,
    link: watch::Sender<LinkState>,
    policy: ReconnectPolicy,
}

impl DartboardSupervisor {
    /// Build a supervisor publishing its state on `link`.
    pub fn new(
        connector: Arc<dyn BoardConnector>,
        engine: EngineHandle,
        hub: Arc<BroadcastHub>,
        link: watch::Sender<LinkState>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            connector,
            engine,
            hub,
            link,
            policy,
        }
    }

    /// Connect, read and reconnect until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let target = self.connector.describe();

        if wait_or_cancel(&cancel, self.policy.initial_delay).await {
            loop {
                self.set_link(LinkState::Connecting);
                info!(%target, "connecting to dartboard");

                let opened = tokio::select! {
                    _ = cancel.cancelled() => break,
                    opened = self.connector.connect() => opened,
                };

                let delay = match opened {
                    Ok(stream) => {
                        self.set_link(LinkState::Connected);
                        info!(%target, "dartboard connected");
                        match pump_frames(BufReader::new(stream), &self.engine, &cancel).await {
                            Ok(hits) => info!(%target, hits, "dartboard link closed"),
                            Err(err) => warn!(%target, error = %err, "dartboard read failed"),
                        }
                        self.set_link(LinkState::Disconnected);
                        self.policy.after_close
                    }
                    Err(err) => {
                        self.set_link(LinkState::Disconnected);
                        warn!(%target, error = %err, "failed to open dartboard port");
                        self.policy.after_failure
                    }
                };

                if cancel.is_cancelled() {
                    break;
                }
                info!(retry_in_ms = delay.as_millis() as u64, "dartboard reconnect scheduled");
                if !wait_or_cancel(&cancel, delay).await {
                    break;
                }
            }
        }

        self.set_link(LinkState::Disconnected);
        info!("dartboard supervisor stopped");
    }

    fn set_link(&self, next: LinkState) {
        let previous = self.link.send_replace(next);
        if previous.is_connected() != next.is_connected() {
            broadcast_dartboard_status(&self.hub, next.is_connected());
        }
    }
}

/// Sleep for `delay`. Returns `false` when cancelled first.
async fn wait_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::watch;

    use super::*;
    use crate::{
        dao::snapshot::Snapshot,
        services::engine::{Engine, EngineOptions},
        state::registry::Registry,
    };

    fn engine() -> (EngineHandle, Arc<BroadcastHub>) {
        let hub = Arc::new(BroadcastHub::new(16));
        let (_link, link_rx) = watch::channel(LinkState::Connected);
        let (snapshot_tx, _snapshot_rx) = watch::channel(Snapshot::default());
        let (handle, _task) = Engine::spawn(
            Registry::new(),
            hub.clone(),
            link_rx,
            snapshot_tx,
            EngineOptions::default(),
        );
        (handle, hub)
    }

    #[test]
    fn parses_hit_frames() {
        let frame = parse_frame(r#"{"event":"hit","sector":20,"multiplier":3,"score":60}"#).unwrap();
        assert_eq!(
            frame,
            BoardFrame::Hit {
                dart: classify(20, 3).unwrap(),
                reported_score: Some(60),
            }
        );
    }

    #[test]
    fn other_events_are_passed_through() {
        assert_eq!(
            parse_frame(r#"{"event":"ready"}"#).unwrap(),
            BoardFrame::Event("ready".into())
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            parse_frame("garbage"),
            Err(FrameError::MalformedHardwareFrame(_))
        ));
        assert!(matches!(
            parse_frame(r#"{"event":"hit","sector":20}"#),
            Err(FrameError::MissingField("multiplier"))
        ));
        assert!(matches!(
            parse_frame(r#"{"event":"hit","sector":21,"multiplier":1}"#),
            Err(FrameError::InvalidThrow(_))
        ));
    }

    #[tokio::test]
    async fn pump_skips_bad_lines_and_counts_hits() {
        let (engine, _hub) = engine();
        let input: &[u8] = b"{\"event\":\"ready\"}\r\nnot json\n\n{\"event\":\"hit\",\"sector\":5,\"multiplier\":1,\"score\":5}\n{\"event\":\"hit\",\"sector\":25,\"multiplier\":2,\"score\":50}";

        let hits = pump_frames(input, &engine, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hits, 2);
    }

    struct FlakyConnector {
        attempts: AtomicUsize,
    }

    impl BoardConnector for FlakyConnector {
        fn describe(&self) -> String {
            "fake".into()
        }

        fn connect(&self) -> BoxFuture<'static, io::Result<BoardStream>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(io::Error::new(io::ErrorKind::NotFound, "no such port"))
                } else {
                    let frames: &'static [u8] = b"{\"event\":\"ready\"}\n";
                    Ok(Box::new(frames) as BoardStream)
                }
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn supervisor_retries_and_reports_link_changes() {
        let (engine, hub) = engine();
        let mut viewer = hub.subscribe_global();
        let (link, mut link_rx) = watch::channel(LinkState::Disconnected);
        let connector = Arc::new(FlakyConnector {
            attempts: AtomicUsize::new(0),
        });
        let policy = ReconnectPolicy {
            initial_delay: Duration::ZERO,
            after_close: Duration::from_secs(3600),
            after_failure: Duration::from_millis(1),
        };
        let cancel = CancellationToken::new();
        let supervisor =
            DartboardSupervisor::new(connector.clone(), engine, hub.clone(), link, policy);
        let task = tokio::spawn(supervisor.run(cancel.clone()));

        // Failure, retry, then a link that opens and closes immediately.
        let up = viewer.recv().await.unwrap();
        assert_eq!(&*up.frame, r#"{"event":"dartboard_status","data":{"connected":true}}"#);
        let down = viewer.recv().await.unwrap();
        assert_eq!(&*down.frame, r#"{"event":"dartboard_status","data":{"connected":false}}"#);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);

        // The long after-close wait is cancellable.
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(*link_rx.borrow_and_update(), LinkState::Disconnected);
    }
}
