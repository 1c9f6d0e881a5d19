//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is one UTF-8 JSON object tagged by its `channel` field;
//! all other fields are optional and take their zero defaults on decode.

use serde::{Deserialize, Serialize};

// =============================================================================
// CLIENT -> SERVER FRAMES
// =============================================================================

/// Frames sent from client to server.
///
/// The `isCreator` flag carried by the relay channels is decoded for wire
/// compatibility but never trusted: the sender's role is always derived from
/// the registry's slot assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Open a new room; `res` carries the creator's display name.
    CreateRoom {
        /// Creator's display name.
        #[serde(default)]
        res: String,
        /// Board size, fixed for the life of the room.
        #[serde(default)]
        dimension: u32,
        /// Client protocol version, matched against the joiner's.
        #[serde(default)]
        app_version: String,
    },

    /// Join an existing room by code; `res` carries the joiner's display name.
    JoinRoom {
        /// Joiner's display name.
        #[serde(default)]
        res: String,
        /// Code of the room to join.
        #[serde(default)]
        room_code: String,
        /// Client protocol version, matched against the creator's.
        #[serde(default)]
        app_version: String,
    },

    /// A move to relay to the other peer.
    GameOn {
        /// Room the sender believes it is in (ignored; binding is authoritative).
        #[serde(default)]
        room_code: String,
        /// Client-claimed role (ignored).
        #[serde(default)]
        is_creator: bool,
        /// The move payload, opaque to the server.
        #[serde(default)]
        r#move: u32,
    },

    /// A win claim to relay to the other peer. Never validated server-side.
    WinClaim {
        /// Room the sender believes it is in (ignored).
        #[serde(default)]
        room_code: String,
        /// Client-claimed role (ignored).
        #[serde(default)]
        is_creator: bool,
    },

    /// A rematch request to relay to the other peer.
    Retry {
        /// Room the sender believes it is in (ignored).
        #[serde(default)]
        room_code: String,
        /// Client-claimed role (ignored).
        #[serde(default)]
        is_creator: bool,
    },

    /// Leave the room, closing it for both peers.
    ExitRoom {
        /// Room the sender believes it is in (ignored).
        #[serde(default)]
        room_code: String,
        /// Client-claimed role (ignored).
        #[serde(default)]
        is_creator: bool,
    },

    /// Any channel this server does not implement. Logged and ignored.
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Decode a frame from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode a frame to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// SERVER -> CLIENT FRAMES
// =============================================================================

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Reply to a successful `create-room`; the generated code is echoed in
    /// both `res` and `roomCode` (historical clients read either).
    CreateRoom {
        /// The generated room code.
        res: String,
        /// The generated room code, again.
        room_code: String,
    },

    /// Both slots are filled and the match can start.
    GameReady {
        /// The other peer's display name.
        res: String,
        /// Board size; present only on the frame sent to the joiner.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimension: Option<u32>,
        /// Server-assigned role of the recipient.
        is_creator: bool,
    },

    /// A move forwarded from the other peer.
    GameOn {
        /// The move payload, as received.
        r#move: u32,
    },

    /// A win claim forwarded from the other peer.
    WinClaim,

    /// A rematch request forwarded from the other peer.
    Retry,

    /// The room is gone: the other peer left or disconnected.
    ExitRoom,

    /// A request failed; `res` is a human-readable message.
    Error {
        /// Client-facing description of the failure.
        res: String,
    },
}

impl ServerFrame {
    /// Decode a frame from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode a frame to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The `channel` tag this frame serializes under, for logging.
    pub fn channel(&self) -> &'static str {
        match self {
            ServerFrame::CreateRoom { .. } => "create-room",
            ServerFrame::GameReady { .. } => "game-ready",
            ServerFrame::GameOn { .. } => "game-on",
            ServerFrame::WinClaim => "win-claim",
            ServerFrame::Retry => "retry",
            ServerFrame::ExitRoom => "exit-room",
            ServerFrame::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_create_room() {
        let frame = ClientFrame::from_json(
            r#"{"channel":"create-room","res":"alice","dimension":5,"appVersion":"1.0.0"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::CreateRoom {
                res: "alice".into(),
                dimension: 5,
                app_version: "1.0.0".into(),
            }
        );
    }

    #[test]
    fn absent_fields_take_zero_defaults() {
        let frame = ClientFrame::from_json(r#"{"channel":"join-room"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::JoinRoom {
                res: String::new(),
                room_code: String::new(),
                app_version: String::new(),
            }
        );
    }

    #[test]
    fn unknown_channel_is_not_an_error() {
        let frame = ClientFrame::from_json(r#"{"channel":"spectate","roomCode":"k3x9p"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Unknown);
    }

    #[test]
    fn missing_channel_is_a_decode_error() {
        assert!(ClientFrame::from_json(r#"{"res":"alice"}"#).is_err());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let frame = ClientFrame::from_json(
            r#"{"channel":"game-on","roomCode":"k3x9p","isCreator":true,"move":17,"padding":[1,2]}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::GameOn {
                room_code: "k3x9p".into(),
                is_creator: true,
                r#move: 17,
            }
        );
    }

    #[test]
    fn game_ready_to_joiner_carries_dimension() {
        let json = ServerFrame::GameReady {
            res: "alice".into(),
            dimension: Some(5),
            is_creator: false,
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["channel"], "game-ready");
        assert_eq!(value["res"], "alice");
        assert_eq!(value["dimension"], 5);
        assert_eq!(value["isCreator"], false);
    }

    #[test]
    fn game_ready_to_creator_omits_dimension() {
        let json = ServerFrame::GameReady {
            res: "bob".into(),
            dimension: None,
            is_creator: true,
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("dimension").is_none());
        assert_eq!(value["isCreator"], true);
    }

    #[test]
    fn bare_notifications_serialize_as_channel_only() {
        let json = ServerFrame::ExitRoom.to_json().unwrap();
        assert_eq!(json, r#"{"channel":"exit-room"}"#);
        let json = ServerFrame::WinClaim.to_json().unwrap();
        assert_eq!(json, r#"{"channel":"win-claim"}"#);
    }

    #[test]
    fn channel_tags_match_serialized_form() {
        for frame in [
            ServerFrame::GameOn { r#move: 3 },
            ServerFrame::Retry,
            ServerFrame::Error { res: "x".into() },
        ] {
            let value: serde_json::Value =
                serde_json::from_str(&frame.to_json().unwrap()).unwrap();
            assert_eq!(value["channel"], frame.channel());
        }
    }

    proptest! {
        #[test]
        fn decode_never_panics(input in "\\PC*") {
            let _ = ClientFrame::from_json(&input);
        }

        #[test]
        fn decode_tolerates_arbitrary_channels(
            channel in "[a-z-]{1,16}",
            dimension in any::<u32>(),
            mov in any::<u32>(),
        ) {
            let json = format!(
                r#"{{"channel":"{channel}","dimension":{dimension},"move":{mov}}}"#
            );
            let _ = ClientFrame::from_json(&json);
        }
    }
}
