//! Client dialer, with a higher-level auto-reconnect façade (spec §4.5).

use std::io;
use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelConfig, ChannelRole};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub channel: ChannelConfig,
    pub retry_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            retry_interval: Duration::from_secs(5),
        }
    }
}

/// A preemptive cancellation signal: once [`Canceller::cancel`] is called,
/// every outstanding and future [`Cancel::cancelled`] wait resolves
/// immediately, so a reconnect timer that has already been told to stop can
/// never fire a stale connect (spec §4.5).
#[derive(Clone)]
pub struct Cancel(watch::Receiver<bool>);

impl Cancel {
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

pub struct Canceller(watch::Sender<bool>);

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

pub fn cancel_pair() -> (Canceller, Cancel) {
    let (tx, rx) = watch::channel(false);
    (Canceller(tx), Cancel(rx))
}

/// Performs a single connection attempt, racing it against `cancel`.
pub async fn connect_once(
    addr: impl ToSocketAddrs,
    config: ChannelConfig,
    mut cancel: Cancel,
) -> io::Result<Channel> {
    tokio::select! {
        result = TcpStream::connect(addr) => {
            let stream = result?;
            Ok(Channel::spawn(stream, ChannelRole::Client, config))
        }
        _ = cancel.cancelled() => {
            Err(io::Error::new(io::ErrorKind::Interrupted, "connect attempt cancelled"))
        }
    }
}

/// Drives repeated connection attempts: reconnects after `retry_interval`
/// whenever the active channel reaches `ShutdownCompleted`, until stopped.
/// The initial attempt runs on its own background task so construction
/// never blocks on the network (spec §4.5).
pub struct AutoReconnect {
    canceller: Canceller,
    handle: JoinHandle<()>,
}

impl AutoReconnect {
    pub fn start<A, F>(addr: A, config: ClientConfig, on_channel: F) -> Self
    where
        A: ToSocketAddrs + Clone + Send + Sync + 'static,
        F: FnMut(Channel) + Send + 'static,
    {
        let (canceller, cancel) = cancel_pair();
        let handle = tokio::spawn(reconnect_loop(addr, config, cancel, on_channel));
        Self { canceller, handle }
    }

    /// Cancels any in-flight connect/retry timer and waits for the
    /// background task to observe it.
    pub async fn stop(self) {
        self.canceller.cancel();
        let _ = self.handle.await;
    }
}

async fn reconnect_loop<A, F>(addr: A, config: ClientConfig, mut cancel: Cancel, mut on_channel: F)
where
    A: ToSocketAddrs + Clone,
    F: FnMut(Channel) + Send + 'static,
{
    loop {
        if cancel.is_cancelled() {
            return;
        }

        match connect_once(addr.clone(), config.channel.clone(), cancel.clone()).await {
            Ok(channel) => {
                let (done_tx, done_rx) = oneshot::channel();
                let done_tx = std::sync::Mutex::new(Some(done_tx));
                channel.on_shutdown_completed(move |_cause| {
                    if let Some(tx) = done_tx.lock().unwrap().take() {
                        let _ = tx.send(());
                    }
                });
                on_channel(channel);

                tokio::select! {
                    _ = done_rx => {}
                    _ = cancel.cancelled() => return,
                }
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    return;
                }
                log::debug!("connect attempt failed: {err}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.retry_interval) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
