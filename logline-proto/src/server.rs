//! TCP acceptor for the collector side of the protocol (spec §4.4).

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelConfig, ChannelRole};

pub const DEFAULT_ADDR: &str = "127.0.0.1:6500";

/// Test-only behaviors the acceptor can be told to apply to every accepted
/// connection instead of handing it to the normal dispatch path (spec §4.4).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionMode {
    #[default]
    Dispatch,
    /// Loops received bytes back at the connection verbatim.
    Echo,
    /// Accepts the connection and drops everything it sends.
    Discard,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub channel: ChannelConfig,
    pub mode: ConnectionMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            mode: ConnectionMode::Dispatch,
        }
    }
}

/// Owns a bound listen socket and the channels spawned from it.
///
/// Mirrors the role of the teacher's `tokio-server` demo's accept loop, made
/// reusable: the acceptor owns channel lifetimes (tracked via `JoinHandle`s
/// so `shutdown` can join them) instead of a demo `main` owning a single
/// connection end to end.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Server {
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config,
            connections: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, handing each to
    /// `on_connect` so the caller can register hooks (`on_write`,
    /// `on_line_received`, ...) before traffic flows. Joins every spawned
    /// channel task before returning.
    pub async fn run<F>(self, mut on_connect: F, shutdown: impl Future<Output = ()>)
    where
        F: FnMut(Channel) + Send + 'static,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            log::debug!("accepted connection from {peer}");
                            match self.config.mode {
                                ConnectionMode::Dispatch => {
                                    let channel = Channel::spawn(
                                        stream,
                                        ChannelRole::Server,
                                        self.config.channel.clone(),
                                    );
                                    on_connect(channel.clone());
                                    let handle = tokio::spawn(async move {
                                        channel.joined().await;
                                    });
                                    self.connections.lock().unwrap().push(handle);
                                }
                                ConnectionMode::Echo => {
                                    let handle = tokio::spawn(echo_connection(stream));
                                    self.connections.lock().unwrap().push(handle);
                                }
                                ConnectionMode::Discard => {
                                    let handle = tokio::spawn(discard_connection(stream));
                                    self.connections.lock().unwrap().push(handle);
                                }
                            }
                        }
                        Err(err) => log::warn!("accept failed: {err}"),
                    }
                }
                _ = &mut shutdown => {
                    log::info!("server shutting down, joining connections");
                    break;
                }
            }
        }

        let handles = std::mem::take(&mut *self.connections.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn echo_connection(mut stream: tokio::net::TcpStream) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if stream.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn discard_connection(mut stream: tokio::net::TcpStream) {
    use tokio::io::AsyncReadExt;
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}
