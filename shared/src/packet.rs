use serde::{Deserialize, Serialize};

/// Numeric message identifiers as they appear on the wire.
pub mod packet_id {
    pub const LOGIN: u32 = 0x01;
    pub const PLAY_STATUS: u32 = 0x02;
    pub const SERVER_TO_CLIENT_HANDSHAKE: u32 = 0x03;
    pub const DISCONNECT: u32 = 0x05;
    pub const RESOURCE_PACKS_INFO: u32 = 0x06;
    pub const RESOURCE_PACK_STACK: u32 = 0x07;
    pub const TEXT: u32 = 0x09;
    pub const START_GAME: u32 = 0x0b;
    pub const MOVE_PLAYER: u32 = 0x13;
    pub const SET_ACTOR_DATA: u32 = 0x27;
    pub const CRAFTING_DATA: u32 = 0x34;
    pub const LEVEL_CHUNK: u32 = 0x3a;
    pub const PLAYER_LIST: u32 = 0x3f;
    pub const CHUNK_RADIUS_UPDATED: u32 = 0x46;
    pub const MOVE_ACTOR_DELTA: u32 = 0x6f;
    pub const NETWORK_CHUNK_PUBLISHER_UPDATE: u32 = 0x79;
    pub const BIOME_DEFINITION_LIST: u32 = 0x7a;
    pub const LEVEL_EVENT_GENERIC: u32 = 0x7c;
    pub const CLIENT_CACHE_STATUS: u32 = 0x81;
    pub const CURRENT_STRUCTURE_FEATURE: u32 = 0x13a;
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TexturePackInfo {
    pub uuid: String,
    pub version: String,
    pub size: u64,
    pub content_key: String,
    pub has_scripts: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StackPack {
    pub uuid: String,
    pub version: String,
    pub sub_pack_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Experiment {
    pub name: String,
    pub enabled: bool,
}

/// Every message exchanged over a session. Types the client does not inspect
/// travel as [`Packet::Other`] with their payload left opaque.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Login {
        client_protocol: i32,
        connection_request: Vec<u8>,
    },
    PlayStatus {
        status: i32,
    },
    Disconnect {
        hide_screen: bool,
        message: String,
    },
    ResourcePacksInfo {
        texture_pack_required: bool,
        has_addons: bool,
        has_scripts: bool,
        texture_packs: Vec<TexturePackInfo>,
    },
    ResourcePackStack {
        texture_pack_required: bool,
        behaviour_packs: Vec<StackPack>,
        texture_packs: Vec<StackPack>,
        base_game_version: String,
        experiments: Vec<Experiment>,
    },
    StartGame {
        entity_runtime_id: u64,
        player_position: [f32; 3],
        world_name: String,
    },
    LevelEventGeneric {
        event_id: i32,
        serialised_event_data: Vec<u8>,
    },
    Other {
        id: u32,
        payload: Vec<u8>,
    },
}

impl Packet {
    pub fn id(&self) -> u32 {
        match self {
            Packet::Login { .. } => packet_id::LOGIN,
            Packet::PlayStatus { .. } => packet_id::PLAY_STATUS,
            Packet::Disconnect { .. } => packet_id::DISCONNECT,
            Packet::ResourcePacksInfo { .. } => packet_id::RESOURCE_PACKS_INFO,
            Packet::ResourcePackStack { .. } => packet_id::RESOURCE_PACK_STACK,
            Packet::StartGame { .. } => packet_id::START_GAME,
            Packet::LevelEventGeneric { .. } => packet_id::LEVEL_EVENT_GENERIC,
            Packet::Other { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Packet::Login { .. } => "Login",
            Packet::PlayStatus { .. } => "PlayStatus",
            Packet::Disconnect { .. } => "Disconnect",
            Packet::ResourcePacksInfo { .. } => "ResourcePacksInfo",
            Packet::ResourcePackStack { .. } => "ResourcePackStack",
            Packet::StartGame { .. } => "StartGame",
            Packet::LevelEventGeneric { .. } => "LevelEventGeneric",
            Packet::Other { .. } => "Other",
        }
    }

    /// The content-free form a session is forced into.
    pub fn empty_resource_packs_info() -> Self {
        Packet::ResourcePacksInfo {
            texture_pack_required: false,
            has_addons: false,
            has_scripts: false,
            texture_packs: Vec::new(),
        }
    }
}

/// One datagram of session traffic. Writes are coalesced into batches and
/// flushed together.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Batch {
    pub packets: Vec<Packet>,
}

impl Batch {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
