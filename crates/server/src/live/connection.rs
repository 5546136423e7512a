//! Per-session seat bindings: at most one live connection per color.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sgf_core::Color;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, Notify};

use super::LiveError;

pub const DISPLACED_NOTICE: &str = "you have been disconnected by a new connection";
pub const OPPONENT_LEFT_NOTICE: &str = "opponent disconnected";
pub const OPPONENT_RESIGNED_NOTICE: &str = "opponent left the game";

/// Frames a socket may have queued before it counts as stalled.
pub const OUTBOUND_CAPACITY: usize = 64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Work queued for a connection's socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    /// Send the notice, then close the socket.
    Close(String),
}

/// Cheap, cloneable reference to one live socket. Identity is the id, not
/// the channel, so a stale handle never matches a newer binding.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    tx: mpsc::Sender<Outbound>,
    drop_now: Arc<Notify>,
}

/// Receiving end owned by the socket task.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<Outbound>,
    drop_now: Arc<Notify>,
}

impl Mailbox {
    /// Next queued item. `None` once the connection has been dropped for
    /// lagging or every handle is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            _ = self.drop_now.notified() => None,
            queued = self.rx.recv() => queued,
        }
    }

    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }
}

impl ConnectionHandle {
    pub fn new() -> (Self, Mailbox) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let drop_now = Arc::new(Notify::new());
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        (
            Self {
                id,
                tx,
                drop_now: drop_now.clone(),
            },
            Mailbox { rx, drop_now },
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a text frame. False when the socket task is gone or has fallen
    /// `OUTBOUND_CAPACITY` frames behind; a lagging socket is told to drop.
    pub fn send(&self, frame: String) -> bool {
        match self.tx.try_send(Outbound::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.drop_now.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn close(&self, notice: &str) {
        if self.tx.try_send(Outbound::Close(notice.to_string())).is_err() {
            self.drop_now.notify_one();
        }
    }

    pub fn is_same(&self, other: &ConnectionHandle) -> bool {
        self.id == other.id
    }
}

/// Outcome of pushing an update to the other seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Offline,
}

#[derive(Debug, Default)]
struct SeatSlots {
    black: Option<ConnectionHandle>,
    white: Option<ConnectionHandle>,
    vacant_since: Option<Instant>,
    retired: bool,
}

impl SeatSlots {
    fn slot(&mut self, seat: Color) -> &mut Option<ConnectionHandle> {
        match seat {
            Color::Black => &mut self.black,
            Color::White => &mut self.white,
        }
    }

    fn refresh_vacancy(&mut self) {
        if self.black.is_none() && self.white.is_none() {
            self.vacant_since.get_or_insert_with(Instant::now);
        } else {
            self.vacant_since = None;
        }
    }
}

/// Holder of the two seat slots of one session. All slot mutation happens
/// under one lock; socket I/O never does.
#[derive(Debug)]
pub struct ConnectionManager {
    slots: Mutex<SeatSlots>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SeatSlots {
                vacant_since: Some(Instant::now()),
                ..SeatSlots::default()
            }),
        }
    }

    /// Install `conn` for `seat`, displacing (notify, then close) any previous one.
    pub async fn bind(&self, seat: Color, conn: ConnectionHandle) -> Result<(), LiveError> {
        let mut slots = self.slots.lock().await;
        if slots.retired {
            return Err(LiveError::Retired);
        }
        let id = conn.id();
        if let Some(previous) = slots.slot(seat).replace(conn) {
            previous.close(DISPLACED_NOTICE);
            tracing::info!(seat = %seat, old = previous.id(), new = id, "Connection displaced");
        }
        slots.refresh_vacancy();
        Ok(())
    }

    /// Clear `seat` only if `conn` is still the one bound there.
    pub async fn unbind(&self, seat: Color, conn: &ConnectionHandle) -> bool {
        let mut slots = self.slots.lock().await;
        let slot = slots.slot(seat);
        if !slot.as_ref().is_some_and(|current| current.is_same(conn)) {
            return false;
        }
        *slot = None;
        slots.refresh_vacancy();
        true
    }

    pub async fn current(&self, seat: Color) -> Option<ConnectionHandle> {
        self.slots.lock().await.slot(seat).clone()
    }

    /// Best-effort send to whoever sits at `seat`. A dead receiver is unbound.
    pub async fn send_to(&self, seat: Color, frame: String) -> Delivery {
        let Some(target) = self.current(seat).await else {
            return Delivery::Offline;
        };
        if target.send(frame) {
            return Delivery::Delivered;
        }
        tracing::warn!(seat = %seat, conn = target.id(), "Delivery failed, dropping connection");
        self.unbind(seat, &target).await;
        Delivery::Offline
    }

    /// Push an update from `mover` to the opposite seat.
    pub async fn deliver(&self, mover: Color, frame: String) -> Delivery {
        self.send_to(mover.opponent(), frame).await
    }

    /// Mark the session retired when both seats have been empty for `ttl`.
    pub async fn retire_if_idle(&self, ttl: Duration) -> bool {
        let mut slots = self.slots.lock().await;
        let idle = slots
            .vacant_since
            .is_some_and(|since| since.elapsed() >= ttl);
        if idle {
            slots.retired = true;
        }
        idle
    }

    pub async fn is_retired(&self) -> bool {
        self.slots.lock().await.retired
    }
}
