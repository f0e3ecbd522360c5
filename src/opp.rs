//! Object Push Profile (OPP) Advertisement
//!
//! This module builds the canonical Object Push service record described
//! in the Object Push Profile specification v1.1, section 6.1: an OBEX
//! service reachable over RFCOMM, with the supported-formats list and the
//! GOEP L2CAP PSM published as profile-specific attributes.

use crate::sdp::{
    DataElement, SdpError, ServiceClassId, ServiceRecordBuilder, ServiceUuid,
    element::uuid16_to_uuid128,
};

/// OBEX Object Push profile version (1.2)
pub const OBJECT_PUSH_VERSION: u16 = 0x0102;

/// GOEP L2CAP PSM attribute ID
pub const GOEP_L2CAP_PSM_ATTRIBUTE_ID: u16 = 0x0200;

/// Supported Formats List attribute ID
pub const SUPPORTED_FORMATS_LIST_ATTRIBUTE_ID: u16 = 0x0303;

/// Object formats accepted by an Object Push server
pub mod supported_formats {
    /// vCard 2.1
    pub const VCARD_2_1: u8 = 0x01;
    /// vCard 3.0
    pub const VCARD_3_0: u8 = 0x02;
    /// vCal 1.0
    pub const VCAL_1_0: u8 = 0x03;
    /// iCal 2.0
    pub const VCAL_2_0: u8 = 0x04;
    /// vNote
    pub const VNOTE: u8 = 0x05;
    /// vMessage
    pub const VMESSAGE: u8 = 0x06;
    /// Any object type
    pub const ANY: u8 = 0xFF;
}

/// Object Push service class UUID
#[must_use]
pub const fn service_uuid() -> ServiceUuid {
    uuid16_to_uuid128(ServiceClassId::ObjectPush as u16)
}

/// Build the Object Push advertisement for a listening endpoint
///
/// `psm` and `rfcomm_channel` must be the values the transport actually
/// listens on; peers read them out of the record and connect to exactly
/// these, so a mismatch makes the service unreachable.
///
/// # Errors
/// Returns an error if an attribute exceeds its encoding capacity.
pub fn object_push_record(
    name: &str,
    psm: u16,
    rfcomm_channel: u8,
) -> Result<ServiceRecordBuilder, SdpError> {
    ServiceRecordBuilder::new(service_uuid(), rfcomm_channel)
        .profile(service_uuid(), OBJECT_PUSH_VERSION)
        .service_name(name)
        .attribute(
            SUPPORTED_FORMATS_LIST_ATTRIBUTE_ID,
            DataElement::sequence(&[
                DataElement::Uint8(supported_formats::VCARD_2_1),
                DataElement::Uint8(supported_formats::VCARD_3_0),
                DataElement::Uint8(supported_formats::VCAL_1_0),
                DataElement::Uint8(supported_formats::VCAL_2_0),
                DataElement::Uint8(supported_formats::VNOTE),
                DataElement::Uint8(supported_formats::VMESSAGE),
                DataElement::Uint8(supported_formats::ANY),
            ])?,
        )?
        .attribute(GOEP_L2CAP_PSM_ATTRIBUTE_ID, DataElement::Uint16(psm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::{ServiceRecordRegistry, universal_attributes};

    #[test]
    fn test_object_push_record_completeness() {
        let mut registry = ServiceRecordRegistry::new();
        let builder = object_push_record("OBEX Object Push", 0x1021, 0x07).unwrap();
        let handle = registry.register(builder).unwrap();

        let record = registry.get(handle).unwrap();
        assert_eq!(
            record.attribute_count(universal_attributes::PROTOCOL_DESCRIPTOR_LIST),
            1
        );
        assert_eq!(record.rfcomm_channel(), Some(0x07));
        assert!(record.matches_service_class(service_uuid()));

        // Retrievable via its own handle attribute value
        let DataElement::Uint32(advertised) = record
            .get_attribute(universal_attributes::SERVICE_RECORD_HANDLE)
            .unwrap()
        else {
            panic!("expected uint32 handle attribute");
        };
        assert!(registry.get(*advertised).is_some());
        assert_eq!(*advertised, handle);
    }

    #[test]
    fn test_goep_psm_attribute() {
        let record = object_push_record("OBEX Object Push", 0x1021, 0x07)
            .unwrap()
            .build(0x0001_0000)
            .unwrap();
        assert_eq!(
            record.get_attribute(GOEP_L2CAP_PSM_ATTRIBUTE_ID),
            Some(&DataElement::Uint16(0x1021))
        );
    }

    #[test]
    fn test_supported_formats_end_with_any() {
        let record = object_push_record("OBEX Object Push", 0x1021, 0x07)
            .unwrap()
            .build(0x0001_0000)
            .unwrap();
        let DataElement::Sequence(payload) = record
            .get_attribute(SUPPORTED_FORMATS_LIST_ATTRIBUTE_ID)
            .unwrap()
        else {
            panic!("expected sequence");
        };
        // Seven uint8 entries, the last being "any"
        assert_eq!(payload.len(), 14);
        assert_eq!(&payload[12..], &[0x08, 0xFF]);
    }
}
