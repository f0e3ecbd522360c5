//! SDP Service Records
//!
//! This module provides the service record type and the builder that
//! assembles a complete OBEX-over-RFCOMM-over-L2CAP advertisement in the
//! attribute order peers expect.

use super::{
    AttributeId, SdpError, ServiceRecordHandle, ServiceUuid, element::uuid16_to_uuid128,
    protocol_uuids, universal_attributes,
};
use crate::constants::{MAX_RECORD_ATTRIBUTES, MAX_SERVICE_NAME_LENGTH};
use crate::sdp::{DataElement, PUBLIC_BROWSE_ROOT};
use heapless::Vec;

/// Maximum encoded size of a full attribute list
pub const MAX_ENCODED_RECORD_SIZE: usize = 512;

/// Maximum number of caller-supplied custom attributes per record
pub const MAX_CUSTOM_ATTRIBUTES: usize = 8;

/// Standard Bluetooth Service Classes used by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[repr(u16)]
pub enum ServiceClassId {
    /// Serial Port Profile
    SerialPort = 0x1101,
    /// Object Push Profile
    ObjectPush = 0x1105,
    /// File Transfer Profile
    FileTransfer = 0x1106,
}

impl ServiceClassId {
    /// Convert to 128-bit UUID on the Bluetooth Base UUID
    #[must_use]
    pub const fn to_uuid(self) -> ServiceUuid {
        uuid16_to_uuid128(self as u16)
    }

    /// Get service name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SerialPort => "Serial Port",
            Self::ObjectPush => "Object Push",
            Self::FileTransfer => "File Transfer",
        }
    }
}

/// Service Record Attribute
///
/// Associates an attribute ID with its data element value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAttribute {
    /// Attribute identifier
    pub id: AttributeId,
    /// Attribute value
    pub value: DataElement,
}

/// Service Record
///
/// An ordered collection of attributes describing one advertised service.
/// Records are built once at service start-up and never mutated after
/// registration; the registry replaces them wholesale on re-registration.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    /// Service record handle (allocated by the registry)
    pub handle: ServiceRecordHandle,
    /// Service attributes, in advertisement order
    pub attributes: Vec<ServiceAttribute, MAX_RECORD_ATTRIBUTES>,
}

impl ServiceRecord {
    /// Get attribute value by ID
    #[must_use]
    pub fn get_attribute(&self, id: AttributeId) -> Option<&DataElement> {
        self.attributes
            .iter()
            .find(|attr| attr.id == id)
            .map(|attr| &attr.value)
    }

    /// Count attributes carrying the given ID
    #[must_use]
    pub fn attribute_count(&self, id: AttributeId) -> usize {
        self.attributes.iter().filter(|attr| attr.id == id).count()
    }

    /// Check whether the record advertises the given service class UUID
    #[must_use]
    pub fn matches_service_class(&self, uuid: ServiceUuid) -> bool {
        let Some(class_list) = self.get_attribute(universal_attributes::SERVICE_CLASS_ID_LIST)
        else {
            return false;
        };
        let mut expected: Vec<u8, 32> = Vec::new();
        if DataElement::uuid(uuid).encode(&mut expected).is_err() {
            return false;
        }
        match class_list {
            DataElement::Sequence(payload) => payload
                .windows(expected.len())
                .any(|window| window == expected.as_slice()),
            _ => false,
        }
    }

    /// Extract the RFCOMM server channel from the protocol descriptor list
    ///
    /// Scans the encoded list for the RFCOMM layer entry
    /// `sequence [ uuid16 0x0003, uint8 channel ]`.
    #[must_use]
    pub fn rfcomm_channel(&self) -> Option<u8> {
        let list = self.get_attribute(universal_attributes::PROTOCOL_DESCRIPTOR_LIST)?;
        let DataElement::Sequence(payload) = list else {
            return None;
        };
        payload
            .windows(5)
            .find(|window| window[..4] == [0x19, 0x00, 0x03, 0x08])
            .map(|window| window[4])
    }

    /// Encode the full attribute list in SDP wire format
    ///
    /// Each attribute is emitted as a `uint16` ID element followed by its
    /// value element, the layout used inside service attribute responses.
    ///
    /// # Errors
    /// Returns `SdpError::BufferTooSmall` if the record exceeds
    /// [`MAX_ENCODED_RECORD_SIZE`].
    pub fn encoded_attribute_list(&self) -> Result<Vec<u8, MAX_ENCODED_RECORD_SIZE>, SdpError> {
        let mut out = Vec::new();
        for attr in &self.attributes {
            DataElement::Uint16(attr.id).encode(&mut out)?;
            attr.value.encode(&mut out)?;
        }
        Ok(out)
    }
}

/// Builder for an OBEX-over-RFCOMM service record
///
/// Produces attributes in the fixed order used by the Object Push profile
/// advertisement: record handle, browse group list, service class ID list,
/// protocol descriptor list (L2CAP, then RFCOMM with the server channel,
/// then OBEX), profile descriptor list, service name, then any
/// profile-specific custom attributes in the order they were added.
///
/// Building has no side effect; registration is a separate, atomic step
/// performed by [`ServiceRecordRegistry::register`](super::registry::ServiceRecordRegistry::register).
#[derive(Debug, Clone)]
pub struct ServiceRecordBuilder {
    service_class: ServiceUuid,
    rfcomm_channel: u8,
    profile: Option<(ServiceUuid, u16)>,
    name: Option<heapless::String<MAX_SERVICE_NAME_LENGTH>>,
    custom: Vec<ServiceAttribute, MAX_CUSTOM_ATTRIBUTES>,
}

impl ServiceRecordBuilder {
    /// Create a builder for a service class listening on an RFCOMM channel
    #[must_use]
    pub fn new(service_class: ServiceUuid, rfcomm_channel: u8) -> Self {
        Self {
            service_class,
            rfcomm_channel,
            profile: None,
            name: None,
            custom: Vec::new(),
        }
    }

    /// Add a profile descriptor (profile UUID and 16-bit version)
    #[must_use]
    pub fn profile(mut self, uuid: ServiceUuid, version: u16) -> Self {
        self.profile = Some((uuid, version));
        self
    }

    /// Set the service name attribute (truncated to the name capacity)
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        let mut end = name.len().min(MAX_SERVICE_NAME_LENGTH);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        self.name = heapless::String::try_from(&name[..end]).ok();
        self
    }

    /// Add a profile-specific custom attribute
    ///
    /// # Errors
    /// Returns `SdpError::TooManyAttributes` if the custom attribute
    /// capacity is exhausted.
    pub fn attribute(mut self, id: AttributeId, value: DataElement) -> Result<Self, SdpError> {
        self.custom
            .push(ServiceAttribute { id, value })
            .map_err(|_| SdpError::TooManyAttributes)?;
        Ok(self)
    }

    /// Build the record for the given allocated handle
    ///
    /// # Errors
    /// Returns an error if an element exceeds its encoding capacity or the
    /// record has too many attributes.
    pub fn build(self, handle: ServiceRecordHandle) -> Result<ServiceRecord, SdpError> {
        let mut attributes: Vec<ServiceAttribute, MAX_RECORD_ATTRIBUTES> = Vec::new();

        let mut add = |id, value| {
            attributes
                .push(ServiceAttribute { id, value })
                .map_err(|_| SdpError::TooManyAttributes)
        };

        add(
            universal_attributes::SERVICE_RECORD_HANDLE,
            DataElement::Uint32(handle),
        )?;
        add(
            universal_attributes::BROWSE_GROUP_LIST,
            DataElement::sequence(&[DataElement::Uuid16(PUBLIC_BROWSE_ROOT)])?,
        )?;
        add(
            universal_attributes::SERVICE_CLASS_ID_LIST,
            DataElement::sequence(&[DataElement::uuid(self.service_class)])?,
        )?;
        add(
            universal_attributes::PROTOCOL_DESCRIPTOR_LIST,
            DataElement::sequence(&[
                DataElement::sequence(&[DataElement::Uuid16(protocol_uuids::L2CAP)])?,
                DataElement::sequence(&[
                    DataElement::Uuid16(protocol_uuids::RFCOMM),
                    DataElement::Uint8(self.rfcomm_channel),
                ])?,
                DataElement::sequence(&[DataElement::Uuid16(protocol_uuids::OBEX)])?,
            ])?,
        )?;
        if let Some((uuid, version)) = self.profile {
            add(
                universal_attributes::BLUETOOTH_PROFILE_DESCRIPTOR_LIST,
                DataElement::sequence(&[DataElement::sequence(&[
                    DataElement::uuid(uuid),
                    DataElement::Uint16(version),
                ])?])?,
            )?;
        }
        if let Some(name) = &self.name {
            add(
                universal_attributes::SERVICE_NAME,
                DataElement::text_string(name)?,
            )?;
        }
        for attr in self.custom {
            attributes
                .push(attr)
                .map_err(|_| SdpError::TooManyAttributes)?;
        }

        Ok(ServiceRecord { handle, attributes })
    }
}
