//! Filtering and rewriting of every message that crosses the session boundary.
//!
//! Each direction runs the same steps: drop anything in the block list, trace
//! what is left when debugging, then apply the per-type rules. Returning an
//! empty vector delivers nothing; otherwise the returned packets are delivered
//! in order in place of the packet that came in.

use log::{info, warn};
use shared::login::parse_client_claims;
use shared::{packet_id, Packet};
use std::collections::HashSet;
use std::fmt;

/// Packets that are always discarded, in both directions.
pub const DROPPED_PACKETS: &[u32] = &[
    packet_id::NETWORK_CHUNK_PUBLISHER_UPDATE,
    packet_id::MOVE_ACTOR_DELTA,
    packet_id::SET_ACTOR_DATA,
    packet_id::LEVEL_CHUNK,
    packet_id::MOVE_PLAYER,
    packet_id::CURRENT_STRUCTURE_FEATURE,
];

/// High-volume packets kept out of the debug trace. They are still delivered.
pub const TRACE_EXCLUDED_PACKETS: &[u32] = &[
    packet_id::CHUNK_RADIUS_UPDATED,
    packet_id::SERVER_TO_CLIENT_HANDSHAKE,
    packet_id::PLAYER_LIST,
    packet_id::BIOME_DEFINITION_LIST,
    packet_id::CRAFTING_DATA,
    packet_id::START_GAME,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "Incoming"),
            Direction::Outbound => write!(f, "Outgoing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacketFilterPolicy {
    dropped: HashSet<u32>,
    trace_excluded: HashSet<u32>,
    debug: bool,
}

impl PacketFilterPolicy {
    pub fn new(
        dropped: impl IntoIterator<Item = u32>,
        trace_excluded: impl IntoIterator<Item = u32>,
        debug: bool,
    ) -> Self {
        let dropped: HashSet<u32> = dropped.into_iter().collect();
        // Dropped ids are never traced, keep them out of the exclusion set.
        let trace_excluded = trace_excluded
            .into_iter()
            .filter(|id| !dropped.contains(id))
            .collect();
        Self {
            dropped,
            trace_excluded,
            debug,
        }
    }

    pub fn with_debug(debug: bool) -> Self {
        Self::new(
            DROPPED_PACKETS.iter().copied(),
            TRACE_EXCLUDED_PACKETS.iter().copied(),
            debug,
        )
    }

    pub fn drops(&self, id: u32) -> bool {
        self.dropped.contains(&id)
    }

    pub fn traces(&self, id: u32) -> bool {
        self.debug && !self.trace_excluded.contains(&id)
    }
}

impl Default for PacketFilterPolicy {
    fn default() -> Self {
        Self::with_debug(false)
    }
}

/// The translation hook installed on a session.
pub trait PacketTranslator: Send + Sync {
    fn inbound(&self, pk: Packet) -> Vec<Packet>;

    fn outbound(&self, pk: Packet) -> Vec<Packet>;
}

#[derive(Debug, Clone, Default)]
pub struct PacketPipeline {
    policy: PacketFilterPolicy,
}

impl PacketPipeline {
    pub fn new(policy: PacketFilterPolicy) -> Self {
        Self { policy }
    }

    fn translate(&self, direction: Direction, pk: Packet) -> Vec<Packet> {
        let id = pk.id();
        if self.policy.drops(id) {
            return Vec::new();
        }

        if self.policy.traces(id) {
            info!(target: "packets", "{} packet {} {:?}", direction, pk.name(), pk);
        }

        vec![self.rewrite(direction, pk)]
    }

    fn rewrite(&self, direction: Direction, pk: Packet) -> Packet {
        match (direction, &pk) {
            (_, Packet::ResourcePacksInfo { .. }) => return Packet::empty_resource_packs_info(),

            (
                Direction::Inbound,
                Packet::ResourcePackStack {
                    behaviour_packs,
                    texture_packs,
                    experiments,
                    ..
                },
            ) => {
                info!(
                    "ResourcePackStack: {:?} {:?} {:?}",
                    behaviour_packs, texture_packs, experiments
                );
            }

            (
                Direction::Inbound,
                Packet::LevelEventGeneric {
                    event_id,
                    serialised_event_data,
                },
            ) => {
                info!(
                    "LevelEventGeneric: {} {}",
                    event_id,
                    String::from_utf8_lossy(serialised_event_data)
                );
            }

            (Direction::Outbound, Packet::Login { connection_request, .. }) => {
                match parse_client_claims(connection_request) {
                    Ok(claims) => info!("ThirdPartyName: {}", claims.third_party_name),
                    Err(e) => warn!("Error parsing login packet: {}", e),
                }
            }

            _ => {}
        }

        pk
    }
}

impl PacketTranslator for PacketPipeline {
    fn inbound(&self, pk: Packet) -> Vec<Packet> {
        self.translate(Direction::Inbound, pk)
    }

    fn outbound(&self, pk: Packet) -> Vec<Packet> {
        self.translate(Direction::Outbound, pk)
    }
}
