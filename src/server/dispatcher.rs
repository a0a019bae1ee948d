//! Readiness Dispatcher
//!
//! One future owns the listening socket and every connection. Each wakeup
//! collects a batch of events by polling the listener and, for each queued
//! connection, the readiness that matches its state:
//!
//! | State      | Polled for          |
//! |------------|---------------------|
//! | `Request`  | `poll_read_ready`   |
//! | `Response` | `poll_write_ready`  |
//!
//! Connections poll with their own waker (see [`ReadyQueue`]), so a wakeup
//! only touches connections the reactor reported or that were just driven.
//! Driving a connection queues it again, which re-arms the readiness that
//! matches its new state.
//!
//! A readiness error counts as the connection's error interest firing and
//! tears the connection down. A failed `accept` pauses accepting for
//! [`ACCEPT_BACKOFF`] so a persistent error such as `EMFILE` cannot spin the
//! loop.

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::{ConnState, Connection, ConnectionStats};
use crate::server::ready::ReadyQueue;
use crate::storage::Store;
use std::collections::HashMap;
use std::future::{poll_fn, Future};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

/// Maximum number of connections accepted per wakeup.
pub const MAX_EVENTS: usize = 64;

/// How long accepting pauses after `accept` fails.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Identifies a connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

enum Event {
    Accepted(TcpStream, SocketAddr),
    AcceptFailed(io::Error),
    Ready(Token),
    Failed(Token, io::Error),
}

struct Registration {
    conn: Connection<TcpStream>,
    waker: Waker,
}

/// The event loop.
pub struct Dispatcher {
    listener: TcpListener,
    connections: HashMap<Token, Registration>,
    ready: ReadyQueue,
    next_token: usize,
    accept_backoff: Option<Pin<Box<Sleep>>>,
    /// Connections whose readiness was polled on the latest wakeup.
    polled: usize,
    commands: CommandHandler,
    stats: ConnectionStats,
}

impl Dispatcher {
    /// Creates the listening socket described by `config` with an empty store.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr = config.socket_addr();
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;

        Ok(Self::from_listener(listener, Store::new()))
    }

    /// Serves `store` on an existing listener.
    pub fn from_listener(listener: TcpListener, store: Store) -> Self {
        Self {
            listener,
            connections: HashMap::new(),
            ready: ReadyQueue::new(),
            next_token: 0,
            accept_backoff: None,
            polled: 0,
            commands: CommandHandler::new(store),
            stats: ConnectionStats::new(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn store(&self) -> &Store {
        self.commands.store()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of connections polled for readiness on the latest wakeup.
    pub fn last_polled(&self) -> usize {
        self.polled
    }

    /// Runs the event loop. Never returns; drop the future to stop serving.
    pub async fn run(&mut self) {
        loop {
            self.turn().await;
        }
    }

    /// Waits for at least one event and handles the whole batch.
    pub async fn turn(&mut self) {
        let events = poll_fn(|cx| self.poll_events(cx)).await;
        debug!(events = events.len(), polled = self.polled, "wakeup");

        for event in events {
            match event {
                Event::Accepted(stream, addr) => self.accept(stream, addr),
                Event::AcceptFailed(e) => self.accept_failed(e),
                Event::Ready(token) => self.drive(token),
                Event::Failed(token, e) => {
                    warn!(token = token.0, error = %e, "Connection error");
                    self.reap(token);
                }
            }
        }
    }

    fn poll_events(&mut self, cx: &mut Context<'_>) -> Poll<Vec<Event>> {
        self.ready.register(cx.waker());

        let mut events = Vec::new();
        self.poll_accept(cx, &mut events);

        self.polled = 0;
        for token in self.ready.drain() {
            let Some(registration) = self.connections.get(&token) else {
                continue;
            };
            self.polled += 1;

            let mut conn_cx = Context::from_waker(&registration.waker);
            let socket = registration.conn.socket();
            let ready = match registration.conn.state() {
                ConnState::Request => socket.poll_read_ready(&mut conn_cx),
                ConnState::Response => socket.poll_write_ready(&mut conn_cx),
                ConnState::Closing => Poll::Ready(Ok(())),
            };
            match ready {
                Poll::Ready(Ok(())) => events.push(Event::Ready(token)),
                Poll::Ready(Err(e)) => events.push(Event::Failed(token, e)),
                Poll::Pending => {}
            }
        }

        if events.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(events)
        }
    }

    fn poll_accept(&mut self, cx: &mut Context<'_>, events: &mut Vec<Event>) {
        if let Some(backoff) = self.accept_backoff.as_mut() {
            if backoff.as_mut().poll(cx).is_pending() {
                return;
            }
            self.accept_backoff = None;
        }

        let mut accepted = 0;
        while accepted < MAX_EVENTS {
            match self.listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, addr))) => {
                    events.push(Event::Accepted(stream, addr));
                    accepted += 1;
                }
                Poll::Ready(Err(e)) => {
                    events.push(Event::AcceptFailed(e));
                    break;
                }
                Poll::Pending => break,
            }
        }
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);

        info!(token = token.0, client = %addr, "New client connected");
        let registration = Registration {
            conn: Connection::new(stream, addr),
            waker: self.ready.waker(token),
        };
        self.connections.insert(token, registration);
        self.ready.schedule(token);
        self.stats.connection_opened();
    }

    fn accept_failed(&mut self, e: io::Error) {
        error!(
            error = %e,
            backoff_ms = ACCEPT_BACKOFF.as_millis() as u64,
            "accept() failed"
        );
        self.accept_backoff = Some(Box::pin(tokio::time::sleep(ACCEPT_BACKOFF)));
    }

    fn drive(&mut self, token: Token) {
        let Some(registration) = self.connections.get_mut(&token) else {
            return;
        };

        let conn = &mut registration.conn;
        conn.on_ready(&mut self.commands, &mut self.stats);
        if conn.state() == ConnState::Closing {
            self.reap(token);
        } else {
            self.ready.schedule(token);
        }
    }

    fn reap(&mut self, token: Token) {
        if let Some(registration) = self.connections.remove(&token) {
            self.stats.connection_closed();
            info!(
                token = token.0,
                client = %registration.conn.addr(),
                "Client disconnected"
            );
        }
    }
}
