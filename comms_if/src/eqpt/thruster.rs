//! # Thruster driver board commands

use serde::{Deserialize, Serialize};

use super::frame::MAX_BOARD_PAYLOAD;

/// Board message type of a thruster command.
pub const CMD_MSG_TYPE: u8 = 0x20;

/// Largest magnitude a thruster driver accepts.
pub const MAX_MAGNITUDE: u8 = 204;

/// Bytes used by one thruster in a command payload.
const CMD_LEN: usize = 3;

/// Maximum number of thruster commands in one board frame.
pub const MAX_CMDS_PER_FRAME: usize = MAX_BOARD_PAYLOAD / CMD_LEN;

/// Command for one thruster channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrusterCmd {
    /// Channel on the driver board
    pub channel: u8,

    /// True to run the thruster in reverse
    pub reverse: bool,

    /// Magnitude in `0..=204`
    pub magnitude: u8,
}

impl ThrusterCmd {
    /// Build a command from a signed duty cycle, rounding and saturating the magnitude.
    pub fn from_duty_cycle(channel: u8, duty_cycle: f64) -> Self {
        let magnitude = if duty_cycle.is_finite() {
            duty_cycle.abs().round().min(MAX_MAGNITUDE as f64) as u8
        } else {
            0
        };

        Self {
            channel,
            reverse: duty_cycle < 0.0,
            magnitude,
        }
    }
}

/// Encode thruster commands into board payloads, splitting them if they exceed one frame.
pub fn encode_cmds(cmds: &[ThrusterCmd]) -> Vec<Vec<u8>> {
    cmds.chunks(MAX_CMDS_PER_FRAME)
        .map(|chunk| {
            chunk
                .iter()
                .flat_map(|c| vec![c.channel, c.reverse as u8, c.magnitude.min(MAX_MAGNITUDE)])
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_duty_cycle() {
        assert_eq!(
            ThrusterCmd::from_duty_cycle(3, -50.4),
            ThrusterCmd {
                channel: 3,
                reverse: true,
                magnitude: 50
            }
        );
        assert_eq!(ThrusterCmd::from_duty_cycle(0, 1000.0).magnitude, MAX_MAGNITUDE);
        assert_eq!(ThrusterCmd::from_duty_cycle(0, std::f64::NAN).magnitude, 0);
    }

    #[test]
    fn test_encode_cmds() {
        let cmds = vec![
            ThrusterCmd::from_duty_cycle(0, 10.0),
            ThrusterCmd::from_duty_cycle(1, -20.0),
        ];
        let payloads = encode_cmds(&cmds);

        assert_eq!(payloads, vec![vec![0, 0, 10, 1, 1, 20]]);

        let many = vec![ThrusterCmd::from_duty_cycle(0, 1.0); MAX_CMDS_PER_FRAME + 1];
        let payloads = encode_cmds(&many);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].len(), CMD_LEN);
    }
}
