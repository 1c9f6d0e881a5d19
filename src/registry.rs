//! Session Registry
//!
//! Concurrency-safe store of live rooms keyed by their share code. All
//! mutations on a code are linearizable: the map lives behind one async
//! `RwLock` and no critical section performs I/O or awaits, so the lock is
//! only ever held for in-memory work. Connection handlers receive owned
//! [`RoomSnapshot`]s and never hold a room across an await point.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::codes::CodeGenerator;
use crate::connection::{ConnId, PeerHandle};

/// How many candidate codes `create` draws before giving up.
const MAX_CODE_ATTEMPTS: usize = 32;

/// A display name bound to one connection's delivery queue.
///
/// A peer occupies exactly one slot of one room for its lifetime; it never
/// migrates between rooms.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Display name announced at create or join time.
    pub name: String,
    /// Handle to the owning connection's outbound queue.
    pub handle: PeerHandle,
}

impl Peer {
    /// Bind a display name to a connection's queue handle.
    pub fn new(name: impl Into<String>, handle: PeerHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

/// The two membership positions within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The peer that opened the room.
    Creator,
    /// The peer that joined by code.
    Joiner,
}

impl Role {
    /// The opposing slot.
    pub fn other(self) -> Self {
        match self {
            Role::Creator => Role::Joiner,
            Role::Joiner => Role::Creator,
        }
    }

    /// Whether this is the creator slot, as reported in `game-ready` frames.
    pub fn is_creator(self) -> bool {
        matches!(self, Role::Creator)
    }
}

/// Room lifecycle states.
///
/// `WaitingForJoiner` can only become `Active` or `Closed`; there is no way
/// back. `Closed` is observable only transiently: a room is removed from the
/// map in the same critical section that closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Created, creator slot bound, joiner slot open.
    WaitingForJoiner,
    /// Both slots bound; relay channels are live.
    Active,
    /// Terminal.
    Closed,
}

/// A live room. Owned exclusively by the registry.
struct Room {
    dimension: u32,
    app_version: String,
    state: RoomState,
    creator: Option<Peer>,
    joiner: Option<Peer>,
}

impl Room {
    fn role_of(&self, id: ConnId) -> Option<Role> {
        slot_of(&self.creator, &self.joiner, id)
    }

    fn snapshot(&self, code: &str) -> RoomSnapshot {
        RoomSnapshot {
            code: code.to_string(),
            dimension: self.dimension,
            app_version: self.app_version.clone(),
            state: self.state,
            creator: self.creator.clone(),
            joiner: self.joiner.clone(),
        }
    }
}

fn slot_of(creator: &Option<Peer>, joiner: &Option<Peer>, id: ConnId) -> Option<Role> {
    if creator.as_ref().is_some_and(|p| p.handle.id() == id) {
        Some(Role::Creator)
    } else if joiner.as_ref().is_some_and(|p| p.handle.id() == id) {
        Some(Role::Joiner)
    } else {
        None
    }
}

/// Owned copy of a room's state, handed to dispatch logic so no registry
/// lock outlives the lookup.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// The room's share code.
    pub code: String,
    /// Board size fixed at creation.
    pub dimension: u32,
    /// Protocol version fixed at creation.
    pub app_version: String,
    /// Lifecycle state at the time of the lookup.
    pub state: RoomState,
    creator: Option<Peer>,
    joiner: Option<Peer>,
}

impl RoomSnapshot {
    /// The slot `id` occupies, if it is a member of this room.
    pub fn role_of(&self, id: ConnId) -> Option<Role> {
        slot_of(&self.creator, &self.joiner, id)
    }

    /// The peer bound to `role`, if that slot is filled.
    pub fn peer(&self, role: Role) -> Option<&Peer> {
        match role {
            Role::Creator => self.creator.as_ref(),
            Role::Joiner => self.joiner.as_ref(),
        }
    }

    /// The peer in the slot opposite to `id`'s, if both are present.
    pub fn counterpart_of(&self, id: ConnId) -> Option<&Peer> {
        self.role_of(id).and_then(|role| self.peer(role.other()))
    }
}

/// Why a join attempt was rejected. Display strings are client-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// No live room carries the requested code.
    #[error("The room code you entered is invalid")]
    NotFound,

    /// The joiner runs a different protocol version than the creator.
    #[error("Room creator has a different version of Bingo. Please make sure both have the latest version.")]
    VersionMismatch,

    /// The joiner slot is already taken.
    #[error("Room is already full")]
    AlreadyFull,
}

/// Why a room could not be created. Display strings are client-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
    /// Every candidate code collided with a live or quarantined room.
    #[error("Could not allocate a room code. Please try again.")]
    CodesExhausted,
}

/// Result of closing a room: the retired code and the peer left to notify.
#[derive(Debug)]
pub struct ClosedRoom {
    /// The code the room was registered under.
    pub code: String,
    /// The peer still occupying a slot when the room closed, if any.
    pub remaining: Option<Peer>,
}

#[derive(Default)]
struct Inner {
    rooms: BTreeMap<String, Room>,
    /// Recently removed codes and when they were retired.
    retired: BTreeMap<String, Instant>,
}

impl Inner {
    fn prune_retired(&mut self, window: Duration) {
        let now = Instant::now();
        self.retired
            .retain(|_, retired_at| now.duration_since(*retired_at) < window);
    }

    fn retire(&mut self, code: String) {
        self.retired.insert(code, Instant::now());
    }
}

/// Concurrency-safe map of live rooms.
pub struct SessionRegistry {
    generator: Box<dyn CodeGenerator>,
    reuse_quarantine: Duration,
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    /// Build a registry drawing codes from `generator`.
    ///
    /// A removed code is not re-issued for `reuse_quarantine`, so a lingering
    /// client cannot land in a stranger's freshly created room.
    /// `Duration::ZERO` disables the window.
    pub fn new(generator: Box<dyn CodeGenerator>, reuse_quarantine: Duration) -> Self {
        Self {
            generator,
            reuse_quarantine,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create a room and bind `creator` to its creator slot.
    ///
    /// Draws codes until one collides with neither a live nor a quarantined
    /// room, up to a fixed attempt bound.
    pub async fn create(
        &self,
        creator: Peer,
        dimension: u32,
        app_version: String,
    ) -> Result<RoomSnapshot, CreateError> {
        let mut inner = self.inner.write().await;
        inner.prune_retired(self.reuse_quarantine);

        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| self.generator.generate())
            .find(|code| !inner.rooms.contains_key(code) && !inner.retired.contains_key(code))
            .ok_or(CreateError::CodesExhausted)?;

        let room = Room {
            dimension,
            app_version,
            state: RoomState::WaitingForJoiner,
            creator: Some(creator),
            joiner: None,
        };
        let snapshot = room.snapshot(&code);
        inner.rooms.insert(code, room);
        Ok(snapshot)
    }

    /// Atomically check and fill the joiner slot of `code`.
    ///
    /// Existence, version equality, and slot vacancy are checked and the slot
    /// filled under one lock acquisition: of N racing joins exactly one
    /// succeeds, the rest see `AlreadyFull`.
    pub async fn try_join(
        &self,
        code: &str,
        joiner: Peer,
        app_version: &str,
    ) -> Result<RoomSnapshot, JoinError> {
        let mut inner = self.inner.write().await;
        let room = inner.rooms.get_mut(code).ok_or(JoinError::NotFound)?;

        if room.app_version != app_version {
            return Err(JoinError::VersionMismatch);
        }
        if room.state != RoomState::WaitingForJoiner || room.joiner.is_some() {
            return Err(JoinError::AlreadyFull);
        }

        room.joiner = Some(joiner);
        room.state = RoomState::Active;
        Ok(room.snapshot(code))
    }

    /// Read-only lookup for relay operations.
    pub async fn get(&self, code: &str) -> Option<RoomSnapshot> {
        let inner = self.inner.read().await;
        inner.rooms.get(code).map(|room| room.snapshot(code))
    }

    /// Delete `code` and retire it into the quarantine window. Idempotent.
    pub async fn remove(&self, code: &str) {
        let mut inner = self.inner.write().await;
        if inner.rooms.remove(code).is_some() {
            inner.retire(code.to_string());
        }
    }

    /// Close `code` on behalf of `leaver`, if it occupies a slot.
    ///
    /// Marks the room closed, removes it, retires the code, and returns the
    /// peer left behind for notification. Returns `None` when the room is
    /// absent or `leaver` is not a member, so racing closes are harmless.
    pub async fn close_for(&self, code: &str, leaver: ConnId) -> Option<ClosedRoom> {
        let mut inner = self.inner.write().await;
        let leaver_role = inner.rooms.get(code)?.role_of(leaver)?;
        let mut room = inner.rooms.remove(code)?;
        room.state = RoomState::Closed;
        inner.retire(code.to_string());

        let remaining = match leaver_role.other() {
            Role::Creator => room.creator.take(),
            Role::Joiner => room.joiner.take(),
        };
        debug!(code, %leaver, peer_remains = remaining.is_some(), "room closed");
        Some(ClosedRoom {
            code: code.to_string(),
            remaining,
        })
    }

    /// Number of live rooms.
    pub async fn live_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}
