//! Wire-level types shared by the client and its tests: the status string
//! carried in unconnected pongs, the offline ping codec, login claims and the
//! session message set.

pub mod login;
pub mod packet;
pub mod ping;
pub mod status;

pub use packet::{packet_id, Batch, Experiment, Packet, StackPack, TexturePackInfo};
pub use status::{split_fields, DecodeError, StatusRecord};

/// Port a server listens on when the status response does not say otherwise.
pub const DEFAULT_PORT: u16 = 19132;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
