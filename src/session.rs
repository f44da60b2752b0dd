//! One connection to LCDd
//!
//! The session owns the socket, the periodic main menu refresh and the
//! deadlines of running Wi-Fi scans. Inbound lines, refresh ticks and due
//! scans are handled one at a time on a single task.

use crate::{
    config::SessionConfig,
    engine::SyncEngine,
    network_client::NetworkClient,
    protocol::{self, Command, Response, ServerInfo},
};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::{fmt, future};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until},
};

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// `hello` sent, waiting for the greeting
    Handshaking,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Handshaking => write!(f, "handshaking"),
            SessionState::Ready => write!(f, "ready"),
        }
    }
}

pub struct Session<T, S = TcpStream> {
    stream: S,
    engine: SyncEngine<T>,
    config: SessionConfig,
    state: SessionState,
    refresh: Option<Interval>,
    /// settle deadline per interface; a new scan replaces the old deadline
    pending_scans: Vec<(Instant, String)>,
    inbound: Vec<u8>,
}

impl<T: NetworkClient> Session<T, TcpStream> {
    pub async fn connect(address: &str, network: T, config: SessionConfig) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .context(format!("failed to connect to LCDd at {address}"))?;

        stream
            .set_nodelay(true)
            .context("failed to disable nagle on LCDd socket")?;

        info!("connected to LCDd at {address}");

        Ok(Self::new(stream, network, config))
    }
}

impl<T, S> Session<T, S>
where
    T: NetworkClient,
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, network: T, config: SessionConfig) -> Self {
        Self {
            stream,
            engine: SyncEngine::new(network),
            config,
            state: SessionState::Disconnected,
            refresh: None,
            pending_scans: Vec::new(),
            inbound: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &SyncEngine<T> {
        &self.engine
    }

    /// Say hello and serve the connection until LCDd closes it
    ///
    /// Returns an error if reading or writing the socket fails.
    pub async fn run(&mut self) -> Result<()> {
        self.send(&[Command::Hello]).await?;
        self.set_state(SessionState::Handshaking);

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let next_scan = self.pending_scans.iter().map(|(deadline, _)| *deadline).min();

            tokio::select! {
                read = self.stream.read(&mut buffer) => {
                    let n = read.context("failed to read from LCDd")?;
                    if n == 0 {
                        info!("LCDd closed the connection");
                        self.reset();
                        return Ok(());
                    }

                    self.inbound.extend_from_slice(&buffer[..n]);
                    for response in protocol::take_complete_lines(&mut self.inbound) {
                        self.handle_response(response).await?;
                    }
                }
                _ = next_tick(&mut self.refresh) => {
                    debug!("periodic main menu refresh");
                    if let Err(e) = self.engine.refresh_main_menu().await {
                        error!("failed to refresh main menu: {e:#}");
                    }
                    self.flush().await?;
                }
                _ = deadline_reached(next_scan) => {
                    self.complete_due_scans().await?;
                }
            }
        }
    }

    /// Shut the socket down and forget all menu state
    pub async fn close(&mut self) -> Result<()> {
        info!("closing LCDd session");
        self.reset();
        self.stream
            .shutdown()
            .await
            .context("failed to shut down LCDd socket")
    }

    fn reset(&mut self) {
        self.set_state(SessionState::Disconnected);
        self.engine.reset();
        self.refresh = None;
        self.pending_scans.clear();
        self.inbound.clear();
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("session {} -> {state}", self.state);
            self.state = state;
        }
    }

    async fn handle_response(&mut self, response: Response) -> Result<()> {
        match response {
            Response::Connect(info) => self.handshake(&info).await?,
            Response::MenuEvent(event) if self.state == SessionState::Ready => {
                debug!("menuevent {} {}", event.kind, event.id);
                self.engine.handle_menu_event(&event).await;
                self.schedule_scans();
            }
            Response::MenuEvent(event) => {
                warn!("ignoring menuevent {} {} while {}", event.kind, event.id, self.state);
            }
            Response::Error(message) => warn!("LCDd reported an error: {message}"),
            Response::Listen(screen) => debug!("LCDd listens to {screen}"),
            Response::Ignore(screen) => debug!("LCDd ignores {screen}"),
            Response::Unrecognized(line) => warn!("unrecognized line from LCDd: {line:?}"),
        }

        self.flush().await
    }

    async fn handshake(&mut self, info: &ServerInfo) -> Result<()> {
        info!("LCDd greeting: {info}");

        if !info.supports_menus() {
            warn!("LCDd protocol version might not support client menus");
        }

        self.send(&[Command::ClientSet {
            name: self.config.client_name.clone(),
        }])
        .await?;

        self.set_state(SessionState::Ready);

        if let Err(e) = self.engine.refresh_main_menu().await {
            error!("failed to build main menu: {e:#}");
        }

        self.refresh = self.config.refresh_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        Ok(())
    }

    fn schedule_scans(&mut self) {
        for interface in self.engine.take_scheduled_scans() {
            let deadline = Instant::now() + self.config.scan_settle;
            self.pending_scans.retain(|(_, pending)| *pending != interface);
            debug!("collect scan results of {interface} in {:?}", self.config.scan_settle);
            self.pending_scans.push((deadline, interface));
        }
    }

    async fn complete_due_scans(&mut self) -> Result<()> {
        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_scans)
            .into_iter()
            .partition(|(deadline, _)| *deadline <= now);
        self.pending_scans = waiting;

        for (_, interface) in due {
            self.engine.finish_scan(&interface).await;
        }

        self.flush().await
    }

    async fn flush(&mut self) -> Result<()> {
        let commands = self.engine.take_commands();
        self.send(&commands).await
    }

    async fn send(&mut self, commands: &[Command]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let mut bytes = Vec::new();
        for command in commands {
            debug!("send {command}");
            bytes.extend(command.encode());
        }

        self.stream
            .write_all(&bytes)
            .await
            .context("failed to write to LCDd")?;
        self.stream.flush().await.context("failed to flush LCDd socket")
    }
}

async fn next_tick(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
