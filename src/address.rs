use crate::SessionError;

/// A Bluetooth Device Address (`BD_ADDR`) wrapper for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, defmt::Format)]
pub struct BluetoothAddress(pub [u8; 6]);

impl BluetoothAddress {
    /// Create a new Bluetooth address from bytes
    #[must_use]
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Format the address as a colon-separated hex string
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            let hex_chars = [
                '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F',
            ];
            result.push(hex_chars[(byte >> 4) as usize]).ok();
            result.push(hex_chars[(byte & 0x0F) as usize]).ok();
        }
        result
    }

    /// Parse a Bluetooth address from a colon-separated hex string
    ///
    /// # Returns
    /// - `Ok(BluetoothAddress)` if the string is valid
    /// - `Err(SessionError::InvalidParameter)` if the string is invalid
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 17 characters long or contains invalid characters
    pub fn from_hex(hex: &str) -> Result<Self, SessionError> {
        if hex.len() != 17 || !hex.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
            return Err(SessionError::InvalidParameter);
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in hex.split(':').enumerate() {
            if i >= 6 || byte.len() != 2 {
                return Err(SessionError::InvalidParameter);
            }
            bytes[i] = u8::from_str_radix(byte, 16).map_err(|_| SessionError::InvalidParameter)?;
        }
        Ok(Self(bytes))
    }
}

impl From<[u8; 6]> for BluetoothAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for [u8; 6] {
    fn from(addr: BluetoothAddress) -> Self {
        addr.0
    }
}

impl From<BluetoothAddress> for heapless::String<17> {
    fn from(addr: BluetoothAddress) -> Self {
        addr.format_hex()
    }
}

impl TryFrom<&str> for BluetoothAddress {
    type Error = SessionError;

    fn try_from(hex: &str) -> Result<Self, Self::Error> {
        BluetoothAddress::from_hex(hex)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = SessionError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() == 6 {
            let mut addr = [0u8; 6];
            addr.copy_from_slice(bytes);
            Ok(BluetoothAddress(addr))
        } else {
            Err(SessionError::InvalidParameter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_address_creation() {
        let addr = BluetoothAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        assert_eq!(addr.as_bytes(), &[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
    }

    #[test]
    fn test_bluetooth_address_format_hex() {
        let addr = BluetoothAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        assert_eq!(addr.format_hex().as_str(), "12:34:56:78:9A:BC");
    }

    #[test]
    fn test_bluetooth_address_round_trip() {
        let addr: BluetoothAddress = "0A:B1:2C:D3:4E:F5".try_into().unwrap();
        assert_eq!(addr.as_bytes(), &[0x0A, 0xB1, 0x2C, 0xD3, 0x4E, 0xF5]);
        assert_eq!(addr.format_hex().as_str(), "0A:B1:2C:D3:4E:F5");
    }

    #[test]
    fn test_bluetooth_address_invalid_strings() {
        assert!(BluetoothAddress::from_hex("12:34:56").is_err());
        assert!(BluetoothAddress::from_hex("12:34:56:78:9A:ZZ").is_err());
        assert!(BluetoothAddress::from_hex("12-34-56-78-9A-BC").is_err());
    }

    #[test]
    fn test_bluetooth_address_try_from_slice() {
        let bytes = &[0x12u8, 0x34, 0x56, 0x78, 0x9A, 0xBC][..];
        let addr = BluetoothAddress::try_from(bytes).unwrap();
        assert_eq!(addr.as_bytes(), &[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);

        assert!(BluetoothAddress::try_from(&[0x12u8, 0x34][..]).is_err());
    }
}
