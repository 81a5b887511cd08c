//! Slave device records populated during bus bring-up.

/// One slave on the bus, as discovered during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRecord {
    /// Bus position, 1-based.
    pub id: u32,
    /// Device name reported by the slave.
    pub name: String,
    /// Vendor identifier from the device EEPROM.
    pub vendor_id: u32,
    /// Product code from the device EEPROM.
    pub product_code: u32,
    /// Whether the slave answered during the last bring-up.
    pub online: bool,
    /// Bytes this slave contributes to the input image.
    pub input_bytes: u32,
    /// Bytes this slave contributes to the output image.
    pub output_bytes: u32,
}

impl SlaveRecord {
    /// Create a record for a discovered slave at the given bus position.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            vendor_id: 0,
            product_code: 0,
            online: false,
            input_bytes: 0,
            output_bytes: 0,
        }
    }

    /// Set the EEPROM identity.
    #[must_use]
    pub fn with_identity(mut self, vendor_id: u32, product_code: u32) -> Self {
        self.vendor_id = vendor_id;
        self.product_code = product_code;
        self
    }

    /// Set the process-image contribution in bytes.
    #[must_use]
    pub fn with_io(mut self, input_bytes: u32, output_bytes: u32) -> Self {
        self.input_bytes = input_bytes;
        self.output_bytes = output_bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let slave = SlaveRecord::new(1, "EL1008")
            .with_identity(0x0000_0002, 0x03F0_3052)
            .with_io(1, 0);

        assert_eq!(slave.id, 1);
        assert_eq!(slave.name, "EL1008");
        assert_eq!(slave.vendor_id, 2);
        assert_eq!(slave.input_bytes, 1);
        assert!(!slave.online);
    }
}
