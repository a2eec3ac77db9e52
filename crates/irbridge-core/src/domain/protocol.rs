//! Protocol identifiers understood by the transceiver firmware.
//!
//! The numbers follow the IRLib2 protocol table compiled into the device
//! sketch.  Additional protocols can be used by number without being listed
//! here; the table only provides names for logging and for the command line.

/// Numeric protocol identifier.
pub type ProtocolId = u16;

pub const UNKNOWN: ProtocolId = 0;
pub const NEC: ProtocolId = 1;
pub const SONY: ProtocolId = 2;
pub const RC5: ProtocolId = 3;
pub const RC6: ProtocolId = 4;
pub const PANASONIC_OLD: ProtocolId = 5;
pub const JVC: ProtocolId = 6;
pub const NECX: ProtocolId = 7;
pub const SAMSUNG36: ProtocolId = 8;
pub const GICABLE: ProtocolId = 9;
pub const DIRECTV: ProtocolId = 10;
pub const RCMM: ProtocolId = 11;
pub const CYKM: ProtocolId = 12;

const NAMES: &[(ProtocolId, &str)] = &[
    (UNKNOWN, "UNKNOWN"),
    (NEC, "NEC"),
    (SONY, "SONY"),
    (RC5, "RC5"),
    (RC6, "RC6"),
    (PANASONIC_OLD, "PANASONIC_OLD"),
    (JVC, "JVC"),
    (NECX, "NECX"),
    (SAMSUNG36, "SAMSUNG36"),
    (GICABLE, "GICABLE"),
    (DIRECTV, "DIRECTV"),
    (RCMM, "RCMM"),
    (CYKM, "CYKM"),
];

/// Returns the firmware name of a protocol, or `None` for unlisted ids.
pub fn protocol_name(id: ProtocolId) -> Option<&'static str> {
    NAMES.iter().find(|(pid, _)| *pid == id).map(|(_, name)| *name)
}

/// Resolves a protocol name (case-insensitive) to its id.
pub fn protocol_by_name(name: &str) -> Option<ProtocolId> {
    NAMES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}
