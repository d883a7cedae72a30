//! # Auxiliary board commands

use serde::{Deserialize, Serialize};

/// Board message type of an actuation command.
pub const CMD_MSG_TYPE: u8 = 0x40;

/// One-shot actuations performed by the auxiliary board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actuation {
    /// Release a marker from the dropper
    DropMarker,

    /// Launch a torpedo
    FireTorpedo,
}

impl Actuation {
    /// Actuator ID on the auxiliary board.
    pub fn actuator_id(&self) -> u8 {
        match self {
            Actuation::DropMarker => 0x01,
            Actuation::FireTorpedo => 0x02,
        }
    }

    pub fn encode_cmd(&self) -> [u8; 1] {
        [self.actuator_id()]
    }
}
