//! SDP Data Element Encoding
//!
//! Data elements are SDP's self-describing value encoding: a one-byte header
//! (type descriptor in the upper five bits, size index in the lower three)
//! followed by the value. Sequences nest by carrying further data elements
//! in their payload. The encoding produced here must match the Bluetooth
//! Core Specification (Vol 3, Part B, 3.2 and 3.3) bit for bit, because
//! unmodified remote peers parse it without any out-of-band schema.

use super::SdpError;
use heapless::Vec;

/// Maximum byte length of an encoded sequence payload
pub const MAX_SEQUENCE_BYTES: usize = 128;

/// Maximum byte length of a text string element
pub const MAX_TEXT_BYTES: usize = 64;

/// Bluetooth Base UUID (00000000-0000-1000-8000-00805F9B34FB)
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Data element type identifier (upper five bits of the header byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum DataElementType {
    /// Nil (null value)
    Nil = 0,
    /// Unsigned integer
    UnsignedInt = 1,
    /// UUID
    Uuid = 3,
    /// Text string
    TextString = 4,
    /// Data element sequence
    Sequence = 6,
}

/// SDP Data Element
///
/// The recursive value type used for all service record attributes. A
/// `Sequence` stores the already-encoded bytes of its members, so nesting
/// is built outward-in with [`DataElement::sequence`] without needing heap
/// allocation or a recursive type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataElement {
    /// Nil (null value)
    Nil,
    /// Unsigned 8-bit integer
    Uint8(u8),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// 16-bit UUID
    Uuid16(u16),
    /// 32-bit UUID
    Uuid32(u32),
    /// 128-bit UUID
    Uuid128(u128),
    /// Text string (UTF-8, no terminator)
    TextString(Vec<u8, MAX_TEXT_BYTES>),
    /// Sequence of data elements, stored pre-encoded
    Sequence(Vec<u8, MAX_SEQUENCE_BYTES>),
}

impl DataElement {
    /// Build a sequence element from already-constructed members
    ///
    /// # Errors
    /// Returns `SdpError::BufferTooSmall` if the encoded members exceed
    /// the sequence capacity.
    pub fn sequence(elements: &[DataElement]) -> Result<Self, SdpError> {
        let mut payload = Vec::new();
        for element in elements {
            element.encode(&mut payload)?;
        }
        Ok(Self::Sequence(payload))
    }

    /// Build a text string element from a `&str`
    ///
    /// # Errors
    /// Returns `SdpError::BufferTooSmall` if the string is too long.
    pub fn text_string(text: &str) -> Result<Self, SdpError> {
        let mut bytes = Vec::new();
        bytes
            .extend_from_slice(text.as_bytes())
            .map_err(|()| SdpError::BufferTooSmall)?;
        Ok(Self::TextString(bytes))
    }

    /// Build a UUID element from a 128-bit UUID, using the shortest form
    ///
    /// UUIDs derived from the Bluetooth Base UUID collapse to their
    /// 16-bit alias, which is how assigned-number UUIDs appear on the
    /// wire in real records.
    #[must_use]
    pub fn uuid(uuid: u128) -> Self {
        if let Some(short) = uuid16_alias(uuid) {
            Self::Uuid16(short)
        } else {
            Self::Uuid128(uuid)
        }
    }

    /// Get the data element type
    #[must_use]
    pub const fn data_type(&self) -> DataElementType {
        match self {
            Self::Nil => DataElementType::Nil,
            Self::Uint8(_) | Self::Uint16(_) | Self::Uint32(_) => DataElementType::UnsignedInt,
            Self::Uuid16(_) | Self::Uuid32(_) | Self::Uuid128(_) => DataElementType::Uuid,
            Self::TextString(_) => DataElementType::TextString,
            Self::Sequence(_) => DataElementType::Sequence,
        }
    }

    /// Get the total encoded size of this element including its header
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        match self {
            Self::Nil => 1,
            Self::Uint8(_) => 2,
            Self::Uint16(_) | Self::Uuid16(_) => 3,
            Self::Uint32(_) | Self::Uuid32(_) => 5,
            Self::Uuid128(_) => 17,
            Self::TextString(bytes) => 2 + bytes.len(),
            Self::Sequence(payload) => {
                if payload.len() <= u8::MAX as usize {
                    2 + payload.len()
                } else {
                    3 + payload.len()
                }
            }
        }
    }

    /// Encode this element into `out` in SDP wire format
    ///
    /// # Errors
    /// Returns `SdpError::BufferTooSmall` if `out` has no room left.
    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), SdpError> {
        match self {
            Self::Nil => push(out, &[0x00]),
            Self::Uint8(v) => {
                push(out, &[header(DataElementType::UnsignedInt, 0)])?;
                push(out, &[*v])
            }
            Self::Uint16(v) => {
                push(out, &[header(DataElementType::UnsignedInt, 1)])?;
                push(out, &v.to_be_bytes())
            }
            Self::Uint32(v) => {
                push(out, &[header(DataElementType::UnsignedInt, 2)])?;
                push(out, &v.to_be_bytes())
            }
            Self::Uuid16(v) => {
                push(out, &[header(DataElementType::Uuid, 1)])?;
                push(out, &v.to_be_bytes())
            }
            Self::Uuid32(v) => {
                push(out, &[header(DataElementType::Uuid, 2)])?;
                push(out, &v.to_be_bytes())
            }
            Self::Uuid128(v) => {
                push(out, &[header(DataElementType::Uuid, 4)])?;
                push(out, &v.to_be_bytes())
            }
            Self::TextString(bytes) => {
                // Size index 5: one additional length byte follows
                push(out, &[header(DataElementType::TextString, 5)])?;
                push(out, &[len_u8(bytes.len())?])?;
                push(out, bytes)
            }
            Self::Sequence(payload) => {
                if payload.len() <= u8::MAX as usize {
                    push(out, &[header(DataElementType::Sequence, 5)])?;
                    push(out, &[len_u8(payload.len())?])?;
                } else {
                    push(out, &[header(DataElementType::Sequence, 6)])?;
                    let len = u16::try_from(payload.len()).map_err(|_| SdpError::BufferTooSmall)?;
                    push(out, &len.to_be_bytes())?;
                }
                push(out, payload)
            }
        }
    }
}

/// Compose a data element header byte from type descriptor and size index
const fn header(data_type: DataElementType, size_index: u8) -> u8 {
    (data_type as u8) << 3 | size_index
}

fn len_u8(len: usize) -> Result<u8, SdpError> {
    u8::try_from(len).map_err(|_| SdpError::BufferTooSmall)
}

fn push<const N: usize>(out: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), SdpError> {
    out.extend_from_slice(bytes)
        .map_err(|()| SdpError::BufferTooSmall)
}

/// Collapse a 128-bit UUID to its 16-bit alias if it is built on the
/// Bluetooth Base UUID
#[must_use]
pub fn uuid16_alias(uuid: u128) -> Option<u16> {
    const ALIAS_MASK: u128 = 0xFFFF_0000_FFFF_FFFF_FFFF_FFFF_FFFF_FFFF;
    if uuid & ALIAS_MASK == BLUETOOTH_BASE_UUID {
        Some((uuid >> 96) as u16)
    } else {
        None
    }
}

/// Expand a 16-bit UUID alias onto the Bluetooth Base UUID
#[must_use]
pub const fn uuid16_to_uuid128(short: u16) -> u128 {
    BLUETOOTH_BASE_UUID | (short as u128) << 96
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(element: &DataElement) -> Vec<u8, 256> {
        let mut out = Vec::new();
        element.encode(&mut out).unwrap();
        out
    }

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(encoded(&DataElement::Nil).as_slice(), &[0x00]);
        assert_eq!(encoded(&DataElement::Uint8(0x07)).as_slice(), &[0x08, 0x07]);
        assert_eq!(
            encoded(&DataElement::Uint16(0x0102)).as_slice(),
            &[0x09, 0x01, 0x02]
        );
        assert_eq!(
            encoded(&DataElement::Uint32(0x0001_0003)).as_slice(),
            &[0x0A, 0x00, 0x01, 0x00, 0x03]
        );
    }

    #[test]
    fn test_uuid_encoding() {
        assert_eq!(
            encoded(&DataElement::Uuid16(0x1105)).as_slice(),
            &[0x19, 0x11, 0x05]
        );
        assert_eq!(
            encoded(&DataElement::Uuid32(0x0001_0002)).as_slice(),
            &[0x1A, 0x00, 0x01, 0x00, 0x02]
        );

        let full = encoded(&DataElement::Uuid128(BLUETOOTH_BASE_UUID));
        assert_eq!(full.len(), 17);
        assert_eq!(full[0], 0x1C);
        assert_eq!(&full[1..5], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&full[13..], &[0x5F, 0x9B, 0x34, 0xFB]);
    }

    #[test]
    fn test_text_string_encoding() {
        let text = DataElement::text_string("OPP").unwrap();
        assert_eq!(encoded(&text).as_slice(), &[0x25, 0x03, b'O', b'P', b'P']);
    }

    #[test]
    fn test_sequence_encoding() {
        let seq = DataElement::sequence(&[DataElement::Uuid16(0x0100)]).unwrap();
        assert_eq!(encoded(&seq).as_slice(), &[0x35, 0x03, 0x19, 0x01, 0x00]);
    }

    #[test]
    fn test_nested_sequence_encoding() {
        // RFCOMM protocol descriptor entry: sequence [ uuid16 0x0003, uint8 channel ]
        let rfcomm =
            DataElement::sequence(&[DataElement::Uuid16(0x0003), DataElement::Uint8(5)]).unwrap();
        let list = DataElement::sequence(&[rfcomm]).unwrap();
        assert_eq!(
            encoded(&list).as_slice(),
            &[0x35, 0x07, 0x35, 0x05, 0x19, 0x00, 0x03, 0x08, 0x05]
        );
    }

    #[test]
    fn test_encoded_size_matches_encoding() {
        let elements = [
            DataElement::Nil,
            DataElement::Uint8(1),
            DataElement::Uint16(2),
            DataElement::Uint32(3),
            DataElement::Uuid16(0x1105),
            DataElement::Uuid128(BLUETOOTH_BASE_UUID),
            DataElement::text_string("hello").unwrap(),
            DataElement::sequence(&[DataElement::Uint8(1), DataElement::Uint8(2)]).unwrap(),
        ];
        for element in &elements {
            assert_eq!(element.encoded_size(), encoded(element).len());
        }
    }

    #[test]
    fn test_uuid16_alias() {
        let opp = uuid16_to_uuid128(0x1105);
        assert_eq!(uuid16_alias(opp), Some(0x1105));
        assert_eq!(uuid16_alias(0xDEAD_BEEF), None);
        assert_eq!(DataElement::uuid(opp), DataElement::Uuid16(0x1105));
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut out: Vec<u8, 2> = Vec::new();
        let err = DataElement::Uint32(7).encode(&mut out);
        assert_eq!(err, Err(SdpError::BufferTooSmall));
    }
}
