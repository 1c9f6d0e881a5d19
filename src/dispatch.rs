//! Relay Dispatcher
//!
//! Maps each decoded inbound frame to registry operations and peer forwards.
//! One [`ConnContext`] lives per connection and remembers which room the
//! connection is bound to; roles are always derived from the registry's slot
//! assignment, never from the client-supplied `isCreator` flag.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::PeerHandle;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::registry::{Peer, Role, RoomSnapshot, RoomState, SessionRegistry};

/// Per-connection dispatch state: the connection's queue handle and its
/// current room binding.
pub struct ConnContext {
    handle: PeerHandle,
    registry: Arc<SessionRegistry>,
    room: Option<String>,
}

impl ConnContext {
    /// Build the dispatch context for one connection.
    pub fn new(handle: PeerHandle, registry: Arc<SessionRegistry>) -> Self {
        Self {
            handle,
            registry,
            room: None,
        }
    }

    /// Handle one inbound frame.
    pub async fn handle_frame(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::CreateRoom {
                res,
                dimension,
                app_version,
            } => self.on_create(res, dimension, app_version).await,
            ClientFrame::JoinRoom {
                res,
                room_code,
                app_version,
            } => self.on_join(res, room_code, app_version).await,
            ClientFrame::GameOn { r#move, .. } => {
                self.relay(ServerFrame::GameOn { r#move }, true).await;
            }
            ClientFrame::WinClaim { .. } => self.relay(ServerFrame::WinClaim, true).await,
            ClientFrame::Retry { .. } => self.relay(ServerFrame::Retry, false).await,
            ClientFrame::ExitRoom { .. } => self.on_exit().await,
            ClientFrame::Unknown => {
                debug!(conn = %self.handle.id(), "unknown channel, ignoring");
            }
        }
    }

    /// Close the connection's room on disconnect, notifying the peer left
    /// behind. Safe to call when no room is bound.
    pub async fn teardown(&mut self) {
        if let Some(code) = self.room.take() {
            self.close_room(&code).await;
        }
    }

    /// The room this connection is bound to, if the binding is still live.
    ///
    /// A binding to a room that was since removed, or where we no longer
    /// occupy a slot, is stale; it is cleared so the connection can create or
    /// join again.
    async fn bound_room(&mut self) -> Option<RoomSnapshot> {
        let code = self.room.clone()?;
        match self.registry.get(&code).await {
            Some(room) if room.role_of(self.handle.id()).is_some() => Some(room),
            _ => {
                self.room = None;
                None
            }
        }
    }

    async fn on_create(&mut self, name: String, dimension: u32, app_version: String) {
        if self.bound_room().await.is_some() {
            warn!(conn = %self.handle.id(), "create-room while already in a room, ignoring");
            return;
        }

        let creator = Peer::new(name, self.handle.clone());
        match self.registry.create(creator, dimension, app_version).await {
            Ok(room) => {
                info!(conn = %self.handle.id(), code = %room.code, dimension, "room created");
                self.room = Some(room.code.clone());
                self.handle.enqueue(ServerFrame::CreateRoom {
                    res: room.code.clone(),
                    room_code: room.code,
                });
            }
            Err(err) => {
                warn!(conn = %self.handle.id(), %err, "room creation failed");
                self.handle.enqueue(ServerFrame::Error {
                    res: err.to_string(),
                });
            }
        }
    }

    async fn on_join(&mut self, name: String, code: String, app_version: String) {
        if self.bound_room().await.is_some() {
            warn!(conn = %self.handle.id(), "join-room while already in a room, ignoring");
            return;
        }

        let joiner = Peer::new(name.clone(), self.handle.clone());
        match self.registry.try_join(&code, joiner, &app_version).await {
            Ok(room) => {
                info!(conn = %self.handle.id(), code = %room.code, "room joined");
                self.room = Some(room.code.clone());

                self.handle.enqueue(ServerFrame::GameReady {
                    res: room
                        .peer(Role::Creator)
                        .map(|p| p.name.clone())
                        .unwrap_or_default(),
                    dimension: Some(room.dimension),
                    is_creator: false,
                });
                if let Some(creator) = room.peer(Role::Creator) {
                    creator.handle.enqueue(ServerFrame::GameReady {
                        res: name,
                        dimension: None,
                        is_creator: true,
                    });
                }
            }
            Err(err) => {
                debug!(conn = %self.handle.id(), code, %err, "join rejected");
                self.handle.enqueue(ServerFrame::Error {
                    res: err.to_string(),
                });
            }
        }
    }

    /// Forward `frame` to the opposing slot of the bound room.
    ///
    /// An empty target slot or a closed target queue drops the forward
    /// silently; a missing binding or a room not yet active (for channels
    /// that require it) is logged and ignored.
    async fn relay(&mut self, frame: ServerFrame, require_active: bool) {
        let channel = frame.channel();
        let Some(room) = self.bound_room().await else {
            warn!(conn = %self.handle.id(), channel, "relay without a room, ignoring");
            return;
        };
        if require_active && room.state != RoomState::Active {
            warn!(conn = %self.handle.id(), code = %room.code, channel, "relay before game-ready, ignoring");
            return;
        }

        match room.counterpart_of(self.handle.id()) {
            Some(peer) => {
                debug!(conn = %self.handle.id(), code = %room.code, channel, "forwarding to peer");
                peer.handle.enqueue(frame);
            }
            None => {
                debug!(conn = %self.handle.id(), code = %room.code, channel, "peer slot empty, dropping");
            }
        }
    }

    async fn on_exit(&mut self) {
        let Some(code) = self.room.take() else {
            warn!(conn = %self.handle.id(), "exit-room without a room, ignoring");
            return;
        };
        self.close_room(&code).await;
    }

    async fn close_room(&self, code: &str) {
        if let Some(closed) = self.registry.close_for(code, self.handle.id()).await {
            info!(conn = %self.handle.id(), code, "room closed");
            if let Some(peer) = closed.remaining {
                peer.handle.enqueue(ServerFrame::ExitRoom);
            }
        }
    }
}
