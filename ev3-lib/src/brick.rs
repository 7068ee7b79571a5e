//! Connection manager.
//!
//! A [`Brick`] owns the active transport, routes inbound frames to the
//! correlator, runs the polling loop that keeps the port table fresh and
//! fans change notifications out to subscribers.

use crate::batch::Batch;
use crate::command::Command;
use crate::config::BrickConfig;
use crate::correlator::{Correlator, ReplyOutcome};
use crate::direct::DirectCommands;
use crate::error::{Ev3Error, Result};
use crate::notify::{Dispatcher, SubscriptionId, Subscribers};
use crate::opcode::CommandType;
use crate::port::{BrickButtons, BrickSnapshot, BrickState, PollReplyRaw, Port};
use crate::system::SystemCommands;
use crate::transport::{ConnectionType, DeviceTransportFactory, Transport, TransportFactory, connect_failed};
use crate::types::InputPort;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Session {
    kind: ConnectionType,
    cancel: CancellationToken,
    router: JoinHandle<()>,
    poller: Option<JoinHandle<()>>,
}

struct BrickInner {
    config: BrickConfig,
    factory: Box<dyn TransportFactory>,
    correlator: Correlator,
    transport: tokio::sync::Mutex<Option<Box<dyn Transport>>>,
    session: tokio::sync::Mutex<Option<Session>>,
    state: RwLock<BrickState>,
    connection_state: RwLock<ConnectionState>,
    polling: AtomicBool,
    subscribers: Subscribers,
}

/// Handle to one EV3 brick. Clones share the same connection.
#[derive(Clone)]
pub struct Brick {
    inner: Arc<BrickInner>,
}

impl Default for Brick {
    fn default() -> Self {
        Self::new(BrickConfig::default())
    }
}

impl Brick {
    /// Brick reached through the real USB, Bluetooth or network links.
    pub fn new(config: BrickConfig) -> Self {
        let factory = DeviceTransportFactory {
            write_timeout: config.write_timeout,
            unlock_timeout: config.unlock_timeout,
        };
        Self::with_factory(config, factory)
    }

    /// Brick whose links come from `factory`.
    pub fn with_factory(config: BrickConfig, factory: impl TransportFactory + 'static) -> Self {
        Self {
            inner: Arc::new(BrickInner {
                config,
                factory: Box::new(factory),
                correlator: Correlator::new(),
                transport: tokio::sync::Mutex::new(None),
                session: tokio::sync::Mutex::new(None),
                state: RwLock::new(BrickState::default()),
                connection_state: RwLock::new(ConnectionState::Disconnected),
                polling: AtomicBool::new(false),
                subscribers: Subscribers::default(),
            }),
        }
    }

    pub fn config(&self) -> &BrickConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.connection_state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether the polling loop is currently running.
    pub fn is_polling(&self) -> bool {
        self.inner.polling.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> BrickSnapshot {
        self.inner.state.read().snapshot()
    }

    pub fn port(&self, input_port: InputPort) -> Port {
        self.inner.state.read().ports[input_port.poll_slot()].clone()
    }

    pub fn buttons(&self) -> BrickButtons {
        self.inner.state.read().buttons
    }

    /// Mode the polling loop reads `input_port` in from the next poll on.
    pub fn set_port_mode(&self, input_port: InputPort, mode: u8) {
        self.inner.state.write().port_mut(input_port).mode = mode;
    }

    pub fn correlator(&self) -> &Correlator {
        &self.inner.correlator
    }

    /// Connects and polls at the configured interval.
    pub async fn connect(&self, kind: ConnectionType, parameter: Option<&str>) -> Result<()> {
        self.connect_with_interval(kind, parameter, self.inner.config.poll_interval)
            .await
    }

    /// Connects over `kind`, stops all motors and, unless `poll_interval`
    /// is zero, starts polling.
    pub async fn connect_with_interval(
        &self,
        kind: ConnectionType,
        parameter: Option<&str>,
        poll_interval: Duration,
    ) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        if session.is_some() {
            return Err(Ev3Error::AlreadyConnected);
        }

        self.inner.set_connection_state(ConnectionState::Connecting);
        let router = match self.inner.open(kind, parameter).await {
            Ok(router) => router,
            Err(e) => {
                self.inner.set_connection_state(ConnectionState::Disconnected);
                warn!(%kind, "Connect failed: {e}");
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let poller = (!poll_interval.is_zero()).then(|| {
            self.inner.polling.store(true, Ordering::Release);
            spawn_poller(Arc::downgrade(&self.inner), cancel.clone(), poll_interval)
        });

        *session = Some(Session {
            kind,
            cancel,
            router,
            poller,
        });
        self.inner.set_connection_state(ConnectionState::Connected);
        info!(%kind, ?poll_interval, "Brick connected");
        Ok(())
    }

    /// Stops polling, closes the link and drops the transport.
    pub async fn disconnect(&self) -> Result<()> {
        let session = self.inner.session.lock().await.take().ok_or(Ev3Error::NotConnected)?;
        session.cancel.cancel();
        if let Some(poller) = session.poller {
            let _ = poller.await;
        }
        session.router.abort();
        let _ = session.router.await;

        if let Some(mut transport) = self.inner.transport.lock().await.take() {
            transport.disconnect().await;
        }
        self.inner.set_connection_state(ConnectionState::Disconnected);
        info!(kind = %session.kind, "Brick disconnected");
        Ok(())
    }

    /// Sends `command` and, if it expects one, waits for the reply.
    ///
    /// Transport write failures are logged and otherwise ignored; a command
    /// expecting a reply then ends in [`ReplyOutcome::TimedOut`].
    pub async fn execute(&self, command: &Command) -> Result<ReplyOutcome> {
        self.inner.send(command, false).await
    }

    /// Runs one poll immediately. Returns whether the table changed.
    pub async fn poll_now(&self) -> Result<bool> {
        self.inner.poll_once().await
    }

    pub fn direct(&self) -> DirectCommands<'_> {
        DirectCommands::new(self)
    }

    pub fn system(&self) -> SystemCommands<'_> {
        SystemCommands::new(self)
    }

    /// Empty batch of the given category without reply buffers.
    pub fn batch(&self, command_type: CommandType) -> Batch<'_> {
        Batch::new(self, Command::new(command_type))
    }

    pub fn batch_with_buffers(&self, command_type: CommandType, global_size: u16, local_size: u8) -> Result<Batch<'_>> {
        Ok(Batch::new(
            self,
            Command::with_buffers(command_type, global_size, local_size)?,
        ))
    }

    /// Calls `handler` inline on the task that ran the poll, after every change.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BrickSnapshot) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(handler), None)
    }

    /// Calls `handler` through `dispatcher` after every change.
    pub fn subscribe_on<F>(&self, dispatcher: Arc<dyn Dispatcher>, handler: F) -> SubscriptionId
    where
        F: Fn(&BrickSnapshot) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(handler), Some(dispatcher))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Resolves with the first change notification in which `input_port`
    /// satisfies `predicate`.
    pub async fn wait_until<F>(&self, input_port: InputPort, predicate: F) -> Result<Port>
    where
        F: Fn(&Port) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));
        let id = self.subscribe(move |snapshot| {
            let Some(port) = snapshot.port(input_port) else {
                return;
            };
            if predicate(port) {
                if let Some(sender) = sender.lock().take() {
                    let _ = sender.send(port.clone());
                }
            }
        });
        let _guard = Unsubscribe { brick: self, id };
        receiver
            .await
            .map_err(|_| Ev3Error::Protocol("change subscription ended".to_string()))
    }
}

struct Unsubscribe<'a> {
    brick: &'a Brick,
    id: SubscriptionId,
}

impl Drop for Unsubscribe<'_> {
    fn drop(&mut self) {
        self.brick.unsubscribe(self.id);
    }
}

impl BrickInner {
    fn set_connection_state(&self, state: ConnectionState) {
        *self.connection_state.write() = state;
    }

    /// Creates and connects the transport, then brings the motors to a
    /// known state. Returns the reply router on success.
    async fn open(&self, kind: ConnectionType, parameter: Option<&str>) -> Result<JoinHandle<()>> {
        let mut transport = self.factory.create(kind, parameter)?;
        let router = spawn_router(transport.subscribe(), self.correlator.clone());

        if let Err(e) = transport.connect().await {
            router.abort();
            return Err(if e.is_connect_error() { e } else { connect_failed(kind, e) });
        }
        *self.transport.lock().await = Some(transport);

        let mut stop = Command::new(CommandType::DirectNoReply);
        stop.stop_all();
        if let Err(e) = self.send(&stop, true).await {
            router.abort();
            if let Some(mut transport) = self.transport.lock().await.take() {
                transport.disconnect().await;
            }
            return Err(connect_failed(kind, e));
        }
        Ok(router)
    }

    /// Writes `command` and waits for its reply if it expects one. With
    /// `strict` a failed write is returned instead of logged.
    async fn send(&self, command: &Command, strict: bool) -> Result<ReplyOutcome> {
        let command_type = command.command_type();
        let sequence = self.correlator.next_sequence();
        let frame = command.encode(sequence)?;
        let pending = command_type
            .expects_reply()
            .then(|| self.correlator.register(sequence, command_type));

        let written = {
            let mut transport = self.transport.lock().await;
            let transport = transport.as_mut().ok_or(Ev3Error::NotConnected)?;
            transport.write(&frame).await
        };
        if let Err(e) = written {
            if strict {
                return Err(e);
            }
            warn!(sequence, "Write failed: {e}");
        }

        match pending {
            Some(pending) => Ok(pending.wait(self.config.reply_timeout).await),
            None => Ok(ReplyOutcome::Sent),
        }
    }

    async fn poll_once(&self) -> Result<bool> {
        let command = self.state.read().poll_command()?;
        let reply = match self.send(&command, false).await? {
            ReplyOutcome::Received(reply) if !reply.is_error() && !reply.data.is_empty() => reply,
            outcome => {
                trace!(?outcome, "Poll returned no data");
                return Ok(false);
            }
        };
        let readings = match PollReplyRaw::parse(&reply.data) {
            Ok(readings) => readings,
            Err(e) => {
                debug!("Ignoring poll reply: {e}");
                return Ok(false);
            }
        };

        let (changed, snapshot) = {
            let mut state = self.state.write();
            let changed = state.apply(&readings, self.config.si_tolerance);
            (changed, state.snapshot())
        };
        if changed || self.config.always_send_events {
            self.subscribers.notify(snapshot);
        }
        Ok(changed)
    }
}

impl Drop for BrickInner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
            session.router.abort();
        }
    }
}

/// Feeds every inbound frame to the correlator until aborted.
fn spawn_router(mut frames: broadcast::Receiver<Bytes>, correlator: Correlator) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(frame) => {
                    correlator.deliver(&frame);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Reply router lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_poller(inner: Weak<BrickInner>, cancel: CancellationToken, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(brick) = inner.upgrade() else {
                return;
            };
            if let Err(e) = brick.poll_once().await {
                warn!("Poll failed: {e}");
            }
            drop(brick);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        if let Some(brick) = inner.upgrade() {
            let mut stop = Command::new(CommandType::DirectNoReply);
            stop.stop_all();
            if let Err(e) = brick.send(&stop, false).await {
                warn!("Final stop failed: {e}");
            }
            brick.polling.store(false, Ordering::Release);
        }
        debug!("Polling stopped");
    })
}
