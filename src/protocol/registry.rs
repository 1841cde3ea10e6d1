//! # Connection Registry
//!
//! Maps correlation keys to connection state. The map lock is held only to
//! look up, insert, or remove an entry; parsing runs under the connection's own
//! mutex, so connections delivered from different threads never contend on
//! the hot path.
//!
//! Teardown marks the state closed under that same mutex. A delivery that
//! resolved the entry before the close and locks it afterwards finds the mark
//! and opens a fresh connection instead of feeding the torn-down one.

use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::ParserConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection::{ConnectionPhase, ConnectionState};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::identity::{ConnectionIdentity, Direction};
use crate::protocol::query::LastExecutedQueryInfo;
use crate::utils::metrics::{EventKind, Timer};

pub(crate) type SharedState = Arc<Mutex<ConnectionState>>;

/// Registry of live connections
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<u64, SharedState>>,
    dispatcher: Dispatcher,
    config: ParserConfig,
}

impl ConnectionRegistry {
    pub fn new(config: ParserConfig, dispatcher: Dispatcher) -> Self {
        for problem in config.validate() {
            warn!(%problem, "Invalid parser configuration");
        }
        Self {
            connections: RwLock::new(HashMap::new()),
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Deliver captured bytes for one connection and direction.
    ///
    /// The capture layer must deliver the bytes of each (connection, direction)
    /// pair in order and from a single producer; the parser does not reorder.
    /// Different connections may be delivered concurrently.
    #[instrument(skip(self, bytes), fields(key = identity.correlation_key(), len = bytes.len()))]
    pub fn deliver_bytes(
        &self,
        identity: ConnectionIdentity,
        direction: Direction,
        ts: Duration,
        bytes: &[u8],
    ) -> Result<()> {
        let mut state = self.get_or_open(identity, ts)?;
        // A close may land between the lookup and the state lock
        while !self.deliver_to(&state, direction, ts, bytes)? {
            debug!("Connection closed while delivery was pending; reopening");
            state = self.get_or_open(identity, ts)?;
        }
        Ok(())
    }

    /// Feed bytes to one resolved state. Returns `false`, leaving the state
    /// untouched, when teardown already ran for it.
    pub(crate) fn deliver_to(
        &self,
        state: &SharedState,
        direction: Direction,
        ts: Duration,
        bytes: &[u8],
    ) -> Result<bool> {
        let mut state = state
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.to_string()))?;
        if state.is_closed() {
            return Ok(false);
        }
        state.process_bytes(direction, ts, bytes, &self.dispatcher);
        Ok(true)
    }

    /// Deliver a segment addressed by endpoints, inferring direction from the
    /// configured server port. Returns `false` when neither endpoint is the server.
    pub fn deliver_segment(
        &self,
        src: SocketAddrV4,
        dst: SocketAddrV4,
        ts: Duration,
        bytes: &[u8],
    ) -> Result<bool> {
        let Some(direction) = Direction::from_ports(src.port(), dst.port(), self.config.server_port)
        else {
            debug!(%src, %dst, "Segment does not involve the server port");
            return Ok(false);
        };

        let client = match direction {
            Direction::ClientToServer => src,
            Direction::ServerToClient => dst,
        };
        self.deliver_bytes(ConnectionIdentity::from(client), direction, ts, bytes)?;
        Ok(true)
    }

    /// Tear down a connection.
    ///
    /// A query still awaiting its result is marked incomplete and reported as
    /// abandoned. Returns the connection's final query record, or `None` if the
    /// connection was unknown.
    #[instrument(skip(self), fields(key = identity.correlation_key()))]
    pub fn notify_connection_closed(
        &self,
        identity: ConnectionIdentity,
    ) -> Result<Option<LastExecutedQueryInfo>> {
        let removed = {
            let mut connections = self
                .connections
                .write()
                .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.to_string()))?;
            connections.remove(&identity.correlation_key())
        };

        let Some(state) = removed else {
            debug!("Close for unknown connection");
            return Ok(None);
        };

        let mut state = state
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.to_string()))?;
        state.mark_closed();
        let ts = state.last_capture_ts();

        if state.phase() == ConnectionPhase::AwaitingResult {
            let abandoned = ProtocolError::ConnectionAbandonedIncomplete {
                key: identity.correlation_key(),
            };
            warn!(query = %state.last_executed_query_info().query, "{abandoned}");
            self.dispatcher
                .abandon_in_flight(ts, &mut state, EventKind::ConnectionAbandonedIncomplete);
        }
        if state.fragmented() {
            debug!("Discarding partial packet at close");
        }

        self.dispatcher.record(EventKind::ConnectionClosed, identity, ts);
        self.dispatcher.session_closed(identity);

        Ok(Some(state.last_executed_query_info().clone()))
    }

    /// Close every tracked connection, as at the end of a capture
    pub fn close_all(&self) -> Result<Vec<LastExecutedQueryInfo>> {
        let _timer = Timer::start("close_all");
        let keys: Vec<u64> = {
            let connections = self
                .connections
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_READ_LOCK.to_string()))?;
            connections.keys().copied().collect()
        };

        let mut closed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(info) =
                self.notify_connection_closed(ConnectionIdentity::from_correlation_key(key))?
            {
                closed.push(info);
            }
        }
        Ok(closed)
    }

    /// Snapshot of the most recent query record for a live connection
    pub fn last_executed_query_info(
        &self,
        identity: ConnectionIdentity,
    ) -> Option<LastExecutedQueryInfo> {
        self.inspect(identity, |state| state.last_executed_query_info().clone())
    }

    /// Run `f` against a live connection's state
    pub fn inspect<R>(
        &self,
        identity: ConnectionIdentity,
        f: impl FnOnce(&ConnectionState) -> R,
    ) -> Option<R> {
        let state = self.get(identity).ok()??;
        let state = state.lock().ok()?;
        Some(f(&state))
    }

    pub fn contains(&self, identity: ConnectionIdentity) -> bool {
        matches!(self.get(identity), Ok(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, identity: ConnectionIdentity) -> Result<Option<SharedState>> {
        let connections = self
            .connections
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_READ_LOCK.to_string()))?;
        Ok(connections.get(&identity.correlation_key()).cloned())
    }

    pub(crate) fn get_or_open(
        &self,
        identity: ConnectionIdentity,
        ts: Duration,
    ) -> Result<SharedState> {
        if let Some(state) = self.get(identity)? {
            return Ok(state);
        }

        let mut connections = self
            .connections
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.to_string()))?;

        // Another producer may have opened it between the two locks
        let state = connections
            .entry(identity.correlation_key())
            .or_insert_with(|| {
                debug!(key = identity.correlation_key(), %identity, "Opened connection");
                self.dispatcher.record(EventKind::ConnectionOpened, identity, ts);
                Arc::new(Mutex::new(ConnectionState::new(identity, &self.config)))
            });
        Ok(state.clone())
    }
}
