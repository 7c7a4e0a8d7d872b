//! Roster frame decoding (1347-byte and 1028-byte datagrams).
//!
//! Roster frames carry participant names as fixed 64-byte NUL-padded UTF-8
//! strings. The primary roster frame names slots 0..16 and also identifies the
//! car, class and track; the additional roster frame names a further window of
//! 16 slots starting at its `offset` field.

use super::cursor::PacketCursor;
use crate::Result;

/// Exact length of a primary roster datagram.
pub const ROSTER_FRAME_LEN: usize = 1347;

/// Exact length of an additional roster datagram.
pub const ADDITIONAL_ROSTER_FRAME_LEN: usize = 1028;

/// Number of name strings carried by each roster frame kind.
pub const NAMES_PER_FRAME: usize = 16;

const NAME_WIDTH: usize = 64;

/// Primary roster frame: event identity strings plus names for slots 0..16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterPacket {
    pub build_version: u16,
    pub packet_type: u8,
    pub car_name: String,
    pub car_class: String,
    pub track_location: String,
    pub track_variation: String,
    /// Names for slots 0..16, in slot order. Unused slots decode as empty.
    pub names: Vec<String>,
}

impl RosterPacket {
    pub fn decode(data: &[u8]) -> Result<Self> {
        debug_assert_eq!(data.len(), ROSTER_FRAME_LEN);
        let mut cursor = PacketCursor::new(data, "roster");

        let build_version = cursor.u16_le()?;
        let packet_type = cursor.u8()?;
        let car_name = cursor.fixed_string(NAME_WIDTH, "car name")?;
        let car_class = cursor.fixed_string(NAME_WIDTH, "car class")?;
        let track_location = cursor.fixed_string(NAME_WIDTH, "track location")?;
        let track_variation = cursor.fixed_string(NAME_WIDTH, "track variation")?;
        let names = decode_names(&mut cursor)?;
        // 64 reserved bytes follow the name table.

        Ok(Self {
            build_version,
            packet_type,
            car_name,
            car_class,
            track_location,
            track_variation,
            names,
        })
    }
}

/// Additional roster frame: names for slots `offset..offset + 16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalRosterPacket {
    pub build_version: u16,
    pub packet_type: u8,
    /// First slot index the name window applies to.
    pub offset: u8,
    pub names: Vec<String>,
}

impl AdditionalRosterPacket {
    pub fn decode(data: &[u8]) -> Result<Self> {
        debug_assert_eq!(data.len(), ADDITIONAL_ROSTER_FRAME_LEN);
        let mut cursor = PacketCursor::new(data, "additional roster");

        let build_version = cursor.u16_le()?;
        let packet_type = cursor.u8()?;
        let offset = cursor.u8()?;
        let names = decode_names(&mut cursor)?;

        Ok(Self { build_version, packet_type, offset, names })
    }
}

fn decode_names(cursor: &mut PacketCursor<'_>) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(NAMES_PER_FRAME);
    for _ in 0..NAMES_PER_FRAME {
        names.push(cursor.fixed_string(NAME_WIDTH, "participant name")?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarshalError;
    use crate::test_utils::{additional_roster_frame, roster_frame};

    #[test]
    fn decodes_identity_strings_and_names() {
        let frame = roster_frame(
            "Formula A",
            "Open Wheel",
            "Eifelwald",
            "Grand Prix",
            &["Ayrton", "Niki", "Jim"],
        );
        let packet = RosterPacket::decode(&frame).unwrap();
        assert_eq!(packet.car_name, "Formula A");
        assert_eq!(packet.car_class, "Open Wheel");
        assert_eq!(packet.track_location, "Eifelwald");
        assert_eq!(packet.track_variation, "Grand Prix");
        assert_eq!(packet.names.len(), NAMES_PER_FRAME);
        assert_eq!(packet.names[0], "Ayrton");
        assert_eq!(packet.names[2], "Jim");
        assert_eq!(packet.names[3], "");
    }

    #[test]
    fn decodes_additional_roster_window() {
        let frame = additional_roster_frame(16, &["Seventeenth", "Eighteenth"]);
        let packet = AdditionalRosterPacket::decode(&frame).unwrap();
        assert_eq!(packet.offset, 16);
        assert_eq!(packet.names[0], "Seventeenth");
        assert_eq!(packet.names[1], "Eighteenth");
    }

    #[test]
    fn bad_name_encoding_is_invalid_text() {
        let mut frame = roster_frame("Car", "Class", "Track", "Variant", &["Good"]);
        // Corrupt the first name slot with a lone continuation byte.
        frame[259] = 0xFF;
        let err = RosterPacket::decode(&frame).unwrap_err();
        assert!(matches!(err, MarshalError::InvalidText { frame: "roster", .. }));
    }
}
