// mod.rs - main state
//
// chatircd - simple IRC-like chat server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use anyhow::Context as _;
use chrono::prelude::*;
use futures::future::{Fuse, FutureExt};
use futures::SinkExt;
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::*;

use crate::command::*;
use crate::config::*;
use crate::reply::Reply::*;

mod channel;
mod channel_cmds;
mod conn_cmds;
mod dispatch;
mod rest_cmds;
mod structs;

pub(crate) use channel::*;
pub(crate) use dispatch::*;
pub(crate) use structs::*;

pub(crate) struct MainState {
    config: MainConfig,
    commands: CommandRegistry,
    conns_count: Arc<AtomicUsize>,
    state: RwLock<VolatileState>,
    created: String,
}

impl MainState {
    pub(crate) fn new_from_config(config: MainConfig) -> MainState {
        MainState {
            config,
            commands: CommandRegistry::new(),
            conns_count: Arc::new(AtomicUsize::new(0)),
            state: RwLock::new(VolatileState::new()),
            created: Local::now().to_rfc2822(),
        }
    }

    pub(crate) fn conns_count(&self) -> usize {
        self.conns_count.load(Ordering::SeqCst)
    }

    // try to register connection state - print error if too many connections.
    pub(crate) async fn register_conn_state(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Option<ConnState> {
        let current = self.conns_count.fetch_add(1, Ordering::SeqCst);
        if let Some(max_conns) = self.config.max_connections {
            if current >= max_conns {
                self.conns_count.fetch_sub(1, Ordering::SeqCst);
                error!("Too many connections, refused {}", addr);
                return None;
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let (quit_sender, quit_receiver) = oneshot::channel();
        let id = self.state.write().await.add_client(
            addr.ip().to_string(),
            sender,
            quit_sender,
            self.config.password.is_some(),
        );
        let stream = Framed::new(
            stream,
            IRCLinesCodec::new_with_max_length(self.config.max_line_length),
        );
        Some(ConnState::new(
            id,
            stream,
            receiver,
            quit_receiver,
            self.conns_count.clone(),
        ))
    }

    // remove client with leaving all its channels.
    pub(crate) async fn remove_client(&self, conn_state: &ConnState) {
        let mut state = self.state.write().await;
        if let Some(client) = state.remove_client(conn_state.id) {
            info!(
                "Client {} ({}) disconnected: {}",
                client.id,
                client.source(),
                client.quit_reason.as_deref().unwrap_or("Connection closed")
            );
        }
    }

    pub(crate) async fn process(&self, conn_state: &mut ConnState) -> io::Result<()> {
        let res = self.process_internal(conn_state).await;
        SinkExt::<String>::flush(&mut conn_state.stream).await?;
        res
    }

    async fn process_internal(&self, conn_state: &mut ConnState) -> io::Result<()> {
        let deadline = conn_state.timer.map(|(when, _)| when);
        tokio::select! {
            Some(line) = conn_state.receiver.recv() => {
                conn_state.stream.feed(line).await?;
            },
            Ok(reason) = &mut conn_state.quit_receiver => {
                debug!("Connection {} closed: {}", conn_state.id, reason);
                self.drain_outgoing(conn_state).await?;
                conn_state.quit = true;
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                self.process_timer(conn_state).await?;
            },
            line = conn_state.stream.next() => match line {
                Some(Ok(Line::Text(line))) => self.process_line(conn_state, &line).await?,
                Some(Ok(Line::TooLong)) => {
                    let client = self.state.read().await.nick_of(conn_state.id).to_string();
                    self.feed_msg(&mut conn_state.stream, ErrInputTooLong417 { client: &client })
                        .await?;
                }
                Some(Err(e)) => return Err(e),
                None => {
                    info!("Connection {} closed by peer", conn_state.id);
                    conn_state.quit = true;
                }
            },
        }
        Ok(())
    }

    async fn process_line(&self, conn_state: &mut ConnState, line: &str) -> io::Result<()> {
        let Some(msg) = Message::parse(line) else {
            // ignore empties
            return Ok(());
        };
        debug!("Received from {}: {}", conn_state.id, msg);

        let closing = {
            let mut state = self.state.write().await;
            match state.clients.get_mut(&conn_state.id) {
                Some(client) => client.last_activity = Instant::now(),
                None => {
                    conn_state.quit = true;
                    return Ok(());
                }
            }
            let mut ctx = Context {
                state: &mut state,
                config: &self.config,
                created: &self.created,
                client: conn_state.id,
            };
            self.commands.dispatch(&mut ctx, &msg);

            let client = state.clients.get(&conn_state.id);
            conn_state.timer = client.and_then(|c| c.next_timer(&self.config));
            client.is_none_or(|c| c.is_closing())
        };

        if closing {
            self.drain_outgoing(conn_state).await?;
            conn_state.quit = true;
        }
        Ok(())
    }

    async fn process_timer(&self, conn_state: &mut ConnState) -> io::Result<()> {
        let Some((_, kind)) = conn_state.timer else {
            return Ok(());
        };
        let line = {
            let mut state = self.state.write().await;
            let Some(client) = state.clients.get_mut(&conn_state.id) else {
                conn_state.quit = true;
                return Ok(());
            };
            let line = match kind {
                TimerKind::Ping => {
                    client.ping_sent = Some(Instant::now());
                    format!("PING :{}", self.config.name)
                }
                TimerKind::PongTimeout => {
                    info!("Pong timeout for {}", client.source());
                    client.close("Pong timeout");
                    conn_state.quit = true;
                    "ERROR :Pong timeout, connection will be closed.".to_string()
                }
            };
            conn_state.timer = client.next_timer(&self.config);
            line
        };
        conn_state.stream.feed(line).await
    }

    // write lines queued for this connection.
    async fn drain_outgoing(&self, conn_state: &mut ConnState) -> io::Result<()> {
        while let Ok(line) = conn_state.receiver.try_recv() {
            conn_state.stream.feed(line).await?;
        }
        Ok(())
    }

    // helper to feed messages
    async fn feed_msg<T: std::fmt::Display>(
        &self,
        stream: &mut Framed<TcpStream, IRCLinesCodec>,
        t: T,
    ) -> io::Result<()> {
        stream.feed(format!(":{} {}", self.config.name, t)).await
    }

    // wait until every connection task has written its last lines.
    pub(crate) async fn wait_for_connections(&self, max_wait: Duration) {
        let waiting = async {
            while self.conns_count() != 0 {
                time::sleep(Duration::from_millis(20)).await;
            }
        };
        if time::timeout(max_wait, waiting).await.is_err() {
            warn!("{} connections still open at exit", self.conns_count());
        }
    }
}

async fn user_state_process(main_state: Arc<MainState>, stream: TcpStream, addr: SocketAddr) {
    let Some(mut conn_state) = main_state.register_conn_state(stream, addr).await else {
        return;
    };
    info!("New connection {} from {}", conn_state.id, addr);
    while !conn_state.is_quit() {
        if let Err(e) = main_state.process(&mut conn_state).await {
            error!("Error for connection {}: {}", conn_state.id, e);
            break;
        }
    }
    main_state.remove_client(&conn_state).await;
}

pub(crate) fn initialize_logging(config: &MainConfig) {
    use tracing_subscriber::EnvFilter;
    let s = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_level.into()))
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        // disable ansi color for files
        .with_ansi(config.log_file.is_none());
    if let Some(ref log_file) = config.log_file {
        if let Ok(f) = File::create(log_file) {
            s.with_writer(f).init();
        } else {
            error!("No log file {}", log_file);
            s.init()
        }
    } else {
        s.init();
    }
}

// main routine to run server
pub(crate) async fn run_server(
    config: MainConfig,
) -> anyhow::Result<(Arc<MainState>, JoinHandle<()>)> {
    let listener = TcpListener::bind((config.listen, config.port))
        .await
        .with_context(|| format!("Can't listen on {}:{}", config.listen, config.port))?;
    let main_state = Arc::new(MainState::new_from_config(config));
    let main_state_to_return = main_state.clone();
    let mut quit_receiver: Fuse<oneshot::Receiver<String>> = {
        let (sender, receiver) = oneshot::channel();
        main_state.state.write().await.quit_sender = Some(sender);
        receiver.fuse()
    };

    let handle = tokio::spawn(async move {
        info!(
            "Listen {} on port: {}",
            main_state.config.listen, main_state.config.port
        );
        loop {
            tokio::select! {
                res = listener.accept() => {
                    match res {
                        Ok((stream, addr)) => {
                            tokio::spawn(user_state_process(main_state.clone(), stream, addr));
                        }
                        Err(e) => { error!("Accept connection error: {}", e); }
                    };
                }
                Ok(msg) = &mut quit_receiver => {
                    info!("Server quit: {}", msg);
                    break;
                }
            };
        }
    });
    Ok((main_state_to_return, handle))
}
