//! Scanning of packet-transformation programs.
//!
//! A program is parsed only far enough to count the packet fields and
//! state groups it touches; its text is embedded verbatim into the sketch
//! as the oracle the pipeline is checked against.
use std::{error::Error, fmt::Display};

use once_cell::sync::Lazy;
use regex::Regex;

static PKT_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"state_and_packet\.pkt_(\d+)").unwrap());
static STATE_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"state_and_packet\.state_group_(\d+)").unwrap());
static STATE_SLOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"state_and_packet\.state_group_(\d+)_state_(\d+)").unwrap());

#[derive(Debug, Clone)]
pub struct ProgramError {
    pub message: String,
}

impl Display for ProgramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ProgramError {}

/// What the sketch generator needs to know about a program: how many
/// packet fields and state groups it references, and which (group, slot)
/// pairs occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub num_fields: usize,
    pub num_state_groups: usize,
    /// All referenced (group, slot) pairs, ordered by first occurrence.
    pub state_slots: Vec<(usize, usize)>,
}

impl ProgramInfo {
    pub fn scan(program: &str) -> Result<ProgramInfo, ProgramError> {
        let fields: Vec<usize> = PKT_FIELD
            .captures_iter(program)
            .map(|capture| capture[1].parse().unwrap())
            .collect();
        let Some(max_field) = fields.iter().max() else {
            return Err(ProgramError {
                message: "program references no packet fields".to_string(),
            });
        };

        let num_state_groups = STATE_GROUP
            .captures_iter(program)
            .map(|capture| capture[1].parse::<usize>().unwrap())
            .max()
            .map(|group| group + 1)
            .unwrap_or(0);

        let mut state_slots = vec![];
        for capture in STATE_SLOT.captures_iter(program) {
            let pair = (capture[1].parse().unwrap(), capture[2].parse().unwrap());
            if !state_slots.contains(&pair) {
                state_slots.push(pair);
            }
        }

        Ok(ProgramInfo {
            num_fields: max_field + 1,
            num_state_groups,
            state_slots,
        })
    }

    /// Slots per group the program actually touches.
    pub fn num_state_slots(&self) -> usize {
        self.state_slots
            .iter()
            .map(|(_, slot)| slot + 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_counts_fields_and_groups() {
        let info = ProgramInfo::scan(
            "state_and_packet.pkt_0 = state_and_packet.pkt_1 + state_and_packet.state_group_0_state_0;",
        )
        .expect("should scan");

        assert_eq!(info.num_fields, 2);
        assert_eq!(info.num_state_groups, 1);
        assert_eq!(info.state_slots, vec![(0, 0)]);
    }

    #[test]
    fn test_scan_orders_slots_by_first_occurrence() {
        let info = ProgramInfo::scan(
            "state_and_packet.pkt_0;\n\
             state_and_packet.state_group_1_state_1;\n\
             state_and_packet.state_group_0_state_0;\n\
             state_and_packet.state_group_1_state_1;",
        )
        .expect("should scan");

        assert_eq!(info.num_state_groups, 2);
        assert_eq!(info.state_slots, vec![(1, 1), (0, 0)]);
        assert_eq!(info.num_state_slots(), 2);
    }

    #[test]
    fn test_scan_without_packet_fields_fails() {
        assert!(ProgramInfo::scan("state_and_packet.state_group_0_state_0;").is_err());
    }
}
