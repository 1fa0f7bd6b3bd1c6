//! The channel state machine (spec §3, §4.3): one instance per TCP
//! endpoint, owning the greeting handshake, the send/receive pipelines, the
//! in-flight command table, and the heartbeat timer.
//!
//! Where the teacher's `stream::sync::client::Client` drives its state
//! machine from a blocking `Read + Write` caller loop, this channel is
//! Tokio-native: a reader task and a writer/heartbeat task own the socket
//! halves, and the public API is a cheaply-`Clone`able handle around an
//! `Arc<Shared>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::Instant;

use logline_types::{
    command::{Command, Reply},
    core::{CommandId, Verb},
    message::LogMessage,
    state::ChannelState,
};

use crate::codec::{encode_command, encode_reply, parse_head, parse_reply, CommandAssembler};
use crate::error::ProtocolParseError;
use crate::framer::{encode_line, LineDecoder, LINE_CEILING};
use crate::message_codec::{parse_write, write_command};

/// Which end of the connection this channel represents. Both roles share
/// framing and the greeting handshake; only inbound-line dispatch differs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelRole {
    Client,
    Server,
}

/// Whether [`Channel::send`] blocks the caller or fails fast when the send
/// queue is at capacity (spec §5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backpressure {
    Block,
    FailFast,
}

#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub backpressure: Backpressure,
    pub send_queue_capacity: usize,
    pub heartbeat_interval: Duration,
    pub local_name: String,
    pub local_info: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            backpressure: Backpressure::Block,
            send_queue_capacity: 64,
            heartbeat_interval: Duration::ZERO,
            local_name: "logline".to_owned(),
            local_info: Vec::new(),
        }
    }
}

/// One decoded inbound line, handed to [`Channel::on_line_received`]
/// listeners regardless of role.
#[derive(Clone, Debug)]
pub enum Inbound {
    Command(Command),
    Reply(Reply),
}

/// Why a channel finished shutting down (spec §7).
#[derive(Clone, Debug)]
pub enum ShutdownCause {
    Requested,
    PeerClosed,
    TransportError(String),
    HeartbeatTimeout,
    DrainTimeout,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SendError {
    #[error("send queue is full")]
    QueueFull,
    #[error("channel is closed")]
    Closed,
}

enum Outbound {
    Cmd(Command),
    Reply(Reply),
}

type LineListener = Box<dyn Fn(Inbound) + Send + Sync>;
type ShutdownListener = Box<dyn Fn(ShutdownCause) + Send + Sync>;
type WriteListener = Box<dyn Fn(LogMessage) + Send + Sync>;

struct Shared {
    role: ChannelRole,
    backpressure: Backpressure,
    state: StdMutex<ChannelState>,
    outbound_tx: mpsc::Sender<Outbound>,
    inflight: StdMutex<HashMap<CommandId, oneshot::Sender<Reply>>>,
    next_id: AtomicU64,
    line_listeners: StdMutex<Vec<LineListener>>,
    shutdown_listeners: StdMutex<Vec<ShutdownListener>>,
    write_listeners: StdMutex<Vec<WriteListener>>,
    heartbeat_interval: StdMutex<Duration>,
    last_outbound: StdMutex<Instant>,
    last_inbound: StdMutex<Instant>,
    in_flight_items: AtomicU64,
    drained: Notify,
    shutdown_done: Notify,
}

impl Shared {
    fn set_state(&self, next: ChannelState) {
        let mut state = self.state.lock().unwrap();
        if state.can_transition_to(next) {
            *state = next;
        }
    }

    fn notify_lines(&self, inbound: Inbound) {
        let listeners = self.line_listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(inbound.clone());
        }
    }

    fn notify_shutdown(&self, cause: ShutdownCause) {
        let listeners = self.shutdown_listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(cause.clone());
        }
        drop(listeners);
        self.shutdown_done.notify_waiters();
    }

    fn notify_write(&self, msg: LogMessage) {
        let listeners = self.write_listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(msg.clone());
        }
    }
}

/// A handle to one end of a TCP connection, cheap to clone.
#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("role", &self.shared.role)
            .field("state", &*self.shared.state.lock().unwrap())
            .finish()
    }
}

impl Channel {
    /// Takes ownership of an established TCP stream and starts the
    /// greeting handshake, reader, and writer/heartbeat tasks.
    pub fn spawn(stream: TcpStream, role: ChannelRole, config: ChannelConfig) -> Channel {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue_capacity.max(1));
        let now = Instant::now();

        let shared = Arc::new(Shared {
            role,
            backpressure: config.backpressure,
            state: StdMutex::new(ChannelState::Connecting),
            outbound_tx,
            inflight: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            line_listeners: StdMutex::new(Vec::new()),
            shutdown_listeners: StdMutex::new(Vec::new()),
            write_listeners: StdMutex::new(Vec::new()),
            heartbeat_interval: StdMutex::new(config.heartbeat_interval),
            last_outbound: StdMutex::new(now),
            last_inbound: StdMutex::new(now),
            in_flight_items: AtomicU64::new(0),
            drained: Notify::new(),
            shutdown_done: Notify::new(),
        });

        let channel = Channel {
            shared: shared.clone(),
        };

        let (read_half, write_half) = stream.into_split();

        let greeting_id = CommandId::empty();
        let mut greeting_lines = vec![format!("[{}] HELLO {}", greeting_id, config.local_name)];
        for info in &config.local_info {
            greeting_lines.push(format!("[{}] INFO {}", greeting_id, info));
        }

        shared.set_state(ChannelState::GreetingSent);

        tokio::spawn(writer_task(
            shared.clone(),
            outbound_rx,
            write_half,
            greeting_lines,
        ));
        tokio::spawn(reader_task(shared.clone(), read_half));
        tokio::spawn(heartbeat_task(shared));

        channel
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.lock().unwrap()
    }

    pub fn role(&self) -> ChannelRole {
        self.shared.role
    }

    /// Waits until this channel has finished shutting down, however that
    /// came about (peer close, transport error, or [`Channel::close`]). Lets
    /// an owner join a channel's background tasks without holding a
    /// `JoinHandle` for each one (spec §4.4).
    pub async fn joined(&self) {
        let notified = self.shared.shutdown_done.notified();
        tokio::pin!(notified);
        if *self.shared.state.lock().unwrap() == ChannelState::ShutdownCompleted {
            return;
        }
        notified.await;
    }

    fn allocate_id(&self) -> CommandId {
        let n = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        CommandId::try_from(format!("c{:x}", n % 0xf_ffff_ffff_ffff).as_str())
            .expect("generated id is always within the length and alphabet limits")
    }

    /// Enqueues `cmd` for transmission, respecting the configured
    /// backpressure policy.
    pub async fn send(&self, cmd: Command) -> Result<(), SendError> {
        self.enqueue(Outbound::Cmd(cmd)).await
    }

    async fn enqueue(&self, item: Outbound) -> Result<(), SendError> {
        match self.shared.backpressure {
            Backpressure::Block => self
                .shared
                .outbound_tx
                .send(item)
                .await
                .map_err(|_| SendError::Closed),
            Backpressure::FailFast => {
                self.shared
                    .outbound_tx
                    .try_send(item)
                    .map_err(|e| match e {
                        mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
                        mpsc::error::TrySendError::Closed(_) => SendError::Closed,
                    })
            }
        }
    }

    /// Formats `msg` as a `WRITE` command and enqueues it, returning the
    /// allocated command id.
    pub async fn send_message(&self, msg: &LogMessage) -> Result<CommandId, SendError> {
        let id = self.allocate_id();
        let cmd = write_command(id.clone(), msg);
        self.send(cmd).await?;
        Ok(id)
    }

    /// Sends `cmd` and waits for its correlated reply, supporting
    /// pipelining: multiple concurrent calls may be outstanding, and
    /// replies are matched by id regardless of arrival order (spec §4.2).
    pub async fn call(&self, mut cmd: Command) -> Result<Reply, SendError> {
        if cmd.id.is_empty() {
            cmd.id = self.allocate_id();
        }
        let (tx, rx) = oneshot::channel();
        self.shared
            .inflight
            .lock()
            .unwrap()
            .insert(cmd.id.clone(), tx);
        self.send(cmd).await?;
        rx.await.map_err(|_| SendError::Closed)
    }

    /// `Duration::ZERO` disables heartbeats.
    pub fn set_heartbeat_interval(&self, interval: Duration) {
        *self.shared.heartbeat_interval.lock().unwrap() = interval;
    }

    pub fn on_line_received<F>(&self, cb: F)
    where
        F: Fn(Inbound) + Send + Sync + 'static,
    {
        self.shared
            .line_listeners
            .lock()
            .unwrap()
            .push(Box::new(cb));
    }

    pub fn on_shutdown_completed<F>(&self, cb: F)
    where
        F: Fn(ShutdownCause) + Send + Sync + 'static,
    {
        self.shared
            .shutdown_listeners
            .lock()
            .unwrap()
            .push(Box::new(cb));
    }

    /// Server-side hook invoked once per successfully parsed `WRITE`.
    pub fn on_write<F>(&self, cb: F)
    where
        F: Fn(LogMessage) + Send + Sync + 'static,
    {
        self.shared
            .write_listeners
            .lock()
            .unwrap()
            .push(Box::new(cb));
    }

    /// Begins draining the send queue; once it is empty (or `grace`
    /// elapses, whichever comes first) the channel finishes shutting down
    /// (spec §4.3, §5).
    pub async fn close(&self, grace: Duration) {
        self.shared.set_state(ChannelState::Draining);

        if self.shared.in_flight_items.load(Ordering::Acquire) > 0 {
            let drained = self.shared.drained.notified();
            tokio::pin!(drained);
            if tokio::time::timeout(grace, &mut drained).await.is_err() {
                self.shared.notify_shutdown(ShutdownCause::DrainTimeout);
            }
        }

        self.shared.set_state(ChannelState::ShutdownCompleted);
        self.shared.notify_shutdown(ShutdownCause::Requested);
    }
}

async fn writer_task(
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    greeting_lines: Vec<String>,
) {
    for line in greeting_lines {
        let encoded = encode_line(&line, LINE_CEILING);
        if write_half.write_all(encoded.as_bytes()).await.is_err() {
            shared.set_state(ChannelState::ShutdownCompleted);
            shared.notify_shutdown(ShutdownCause::TransportError(
                "failed to send greeting".to_owned(),
            ));
            return;
        }
    }
    *shared.last_outbound.lock().unwrap() = Instant::now();

    while let Some(item) = outbound_rx.recv().await {
        shared.in_flight_items.fetch_add(1, Ordering::AcqRel);
        let lines = match item {
            Outbound::Cmd(cmd) => encode_command(&cmd),
            Outbound::Reply(reply) => vec![encode_reply(&reply)],
        };

        let mut failed = false;
        for line in lines {
            let encoded = encode_line(&line, LINE_CEILING);
            if write_half.write_all(encoded.as_bytes()).await.is_err() {
                failed = true;
                break;
            }
        }
        *shared.last_outbound.lock().unwrap() = Instant::now();
        if shared.in_flight_items.fetch_sub(1, Ordering::AcqRel) == 1 {
            shared.drained.notify_waiters();
        }

        if failed {
            shared.set_state(ChannelState::ShutdownCompleted);
            shared.notify_shutdown(ShutdownCause::TransportError("write failed".to_owned()));
            return;
        }
    }
}

async fn reader_task(shared: Arc<Shared>, mut read_half: tokio::net::tcp::OwnedReadHalf) {
    let mut decoder = LineDecoder::new(LINE_CEILING);
    let mut assembler = CommandAssembler::new();
    let mut greeting_done = false;
    let mut buf = [0u8; 8192];

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                shared.set_state(ChannelState::ShutdownCompleted);
                shared.notify_shutdown(ShutdownCause::PeerClosed);
                return;
            }
            Ok(n) => {
                *shared.last_inbound.lock().unwrap() = Instant::now();
                decoder.push_bytes(&buf[..n]);

                loop {
                    match decoder.next_line() {
                        Ok(Some(line)) => {
                            if !greeting_done {
                                greeting_done = is_greeting_complete(&line);
                                if !greeting_done {
                                    continue;
                                }
                                // The line that completed the greeting is
                                // also the first operational line; it must
                                // not be dropped (spec §4.3).
                                shared.set_state(ChannelState::Operational);
                            }
                            handle_operational_line(&shared, &mut assembler, &line).await;
                        }
                        Ok(None) => break,
                        Err(_err) => {
                            let echoed = decoder.take_overflow_preview();
                            let _ = shared
                                .outbound_tx
                                .send(Outbound::Reply(Reply::Error {
                                    message: "line_too_long".to_owned(),
                                    echoed_line: echoed,
                                }))
                                .await;
                        }
                    }
                }
            }
            Err(err) => {
                shared.set_state(ChannelState::ShutdownCompleted);
                shared.notify_shutdown(ShutdownCause::TransportError(err.to_string()));
                return;
            }
        }
    }
}

/// Consumes one greeting line. Returns `true` once the greeting is
/// complete (the peer's `HELLO` was seen and this line was not `INFO`).
fn is_greeting_complete(line: &str) -> bool {
    !matches!(
        parse_head(line),
        Ok((_, Verb::Hello, _)) | Ok((_, Verb::Info, _))
    )
}

async fn handle_operational_line(
    shared: &Arc<Shared>,
    assembler: &mut CommandAssembler,
    line: &str,
) {
    match shared.role {
        ChannelRole::Client => {
            if let Ok(reply) = parse_reply(line) {
                if let Reply::Ok { id } | Reply::Nok { id, .. } = &reply {
                    if let Some(tx) = shared.inflight.lock().unwrap().remove(id) {
                        let _ = tx.send(reply.clone());
                    }
                }
                shared.notify_lines(Inbound::Reply(reply));
            } else {
                log::warn!("client channel received unparsable line: {line:?}");
            }
        }
        ChannelRole::Server => match assembler.feed_line(line) {
            Ok(Some(cmd)) => {
                shared.notify_lines(Inbound::Command(cmd.clone()));
                dispatch_server_command(shared, cmd).await;
            }
            Ok(None) => {}
            Err(ProtocolParseError::MalformedId) => {
                log::debug!("server channel received a malformed command id: {line:?}");
                let _ = shared
                    .outbound_tx
                    .send(Outbound::Reply(Reply::Error {
                        message: "malformed_id".to_owned(),
                        echoed_line: line.to_owned(),
                    }))
                    .await;
            }
            Err(err) => {
                log::debug!("server channel parse error: {err}");
                let _ = shared
                    .outbound_tx
                    .send(Outbound::Reply(Reply::nok(
                        CommandId::empty(),
                        "parse_error",
                        err.to_string(),
                    )))
                    .await;
            }
        },
    }
}

async fn dispatch_server_command(shared: &Arc<Shared>, cmd: Command) {
    let reply = match &cmd.verb {
        Verb::Hello | Verb::Info => return,
        Verb::Set | Verb::Heartbeat | Verb::ClearLogViewer | Verb::SaveSnapshot => {
            Reply::Ok { id: cmd.id.clone() }
        }
        Verb::Write => match parse_write(&cmd, chrono::Utc::now().fixed_offset()) {
            Ok(msg) => {
                shared.notify_write(msg);
                Reply::Ok { id: cmd.id.clone() }
            }
            Err(err @ ProtocolParseError::MissingBody) => {
                Reply::nok(cmd.id.clone(), "missing_body", err.to_string())
            }
            Err(err) => Reply::nok(cmd.id.clone(), "parse_error", err.to_string()),
        },
        Verb::Unknown(_) => Reply::nok(cmd.id.clone(), "unknown_verb", "unrecognized verb"),
    };

    let _ = shared.outbound_tx.send(Outbound::Reply(reply)).await;
}

async fn heartbeat_task(shared: Arc<Shared>) {
    loop {
        let interval = *shared.heartbeat_interval.lock().unwrap();
        if interval.is_zero() {
            tokio::time::sleep(Duration::from_millis(250)).await;
        } else {
            tokio::time::sleep(interval / 4).await;
        }

        let state = *shared.state.lock().unwrap();
        if state == ChannelState::ShutdownCompleted {
            return;
        }
        if interval.is_zero() || state != ChannelState::Operational {
            continue;
        }

        let since_inbound = shared.last_inbound.lock().unwrap().elapsed();
        if since_inbound >= interval * 3 {
            shared.set_state(ChannelState::ShutdownCompleted);
            shared.notify_shutdown(ShutdownCause::HeartbeatTimeout);
            return;
        }

        let since_outbound = shared.last_outbound.lock().unwrap().elapsed();
        if since_outbound >= interval {
            let id = CommandId::empty();
            let _ = shared
                .outbound_tx
                .send(Outbound::Cmd(Command::new(id, Verb::Heartbeat)))
                .await;
        }
    }
}
