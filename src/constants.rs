//! `Carrierbird` Constants
//!
//! This module contains all the constants used throughout the `Carrierbird` library.
//! These constants define capacity limits, default values, and Bluetooth-specific
//! parameters used in the implementation.

/// Maximum number of RFCOMM servers that can listen at the same time
pub const MAX_SERVERS: usize = 4;

/// Maximum number of simultaneous RFCOMM data-link connections
pub const MAX_CONNECTIONS: usize = 8;

/// Maximum number of inbound connections queued per server before accepts drain them
pub const MAX_PENDING_ACCEPTS: usize = 4;

/// Maximum number of service records in the device-wide registry
pub const MAX_SERVICE_RECORDS: usize = 16;

/// Maximum number of attributes per service record
pub const MAX_RECORD_ATTRIBUTES: usize = 16;

/// Capacity of a per-connection inbound byte buffer
pub const MAX_RX_BUFFER: usize = 512;

/// Largest payload carried by a single transport data event
pub const MAX_FRAME: usize = 256;

/// Maximum length of a service name in bytes
pub const MAX_SERVICE_NAME_LENGTH: usize = 32;

/// Capacity of the API request/response channels
pub const API_CHANNEL_DEPTH: usize = 4;

/// First non-reserved SDP service record handle (Core spec Vol 3, Part B, 5.1.1)
pub const SERVICE_RECORD_HANDLE_RANGE_START: u32 = 0x0001_0000;

/// Last valid SDP service record handle
pub const SERVICE_RECORD_HANDLE_RANGE_END: u32 = 0xFFFF_FFFF;

/// Lowest valid RFCOMM server channel number
pub const RFCOMM_CHANNEL_MIN: u8 = 1;

/// Highest valid RFCOMM server channel number
pub const RFCOMM_CHANNEL_MAX: u8 = 30;

/// `BD_ADDR` length in bytes
pub const BD_ADDR_LENGTH: usize = 6;
