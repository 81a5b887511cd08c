//! Wire protocol for the operator control socket.
//!
//! Commands and responses are fixed 40-byte datagrams with big-endian
//! multi-byte integers and no padding:
//!
//! ```text
//! command:  | magic:u32 | category:u8 | id:u8 | payload_len:u16 | payload:[u8; 32] |
//! response: | magic:u32 | status:u8   | error:u8 | payload_len:u16 | payload:[u8; 32] |
//! ```
//!
//! All functions here are pure; payload semantics beyond length are the
//! dispatcher's business.

/// Magic number of a command frame.
pub const CMD_MAGIC: u32 = 0xEF00_0001;

/// Magic number of a response frame.
pub const RESP_MAGIC: u32 = 0xEF80_0001;

/// Maximum payload carried by either frame.
pub const MAX_PAYLOAD: usize = 32;

/// On-wire size of both frame kinds.
pub const FRAME_LEN: usize = 40;

/// Default UDP control port.
pub const DEFAULT_PORT: u16 = 2346;

/// Command categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Category {
    /// Bus lifecycle commands.
    Network = 0x01,
    /// Process-data access commands.
    Pdo = 0x02,
    /// Diagnostic queries.
    Diagnostic = 0x03,
}

impl Category {
    /// Try to convert a raw byte into a `Category`.
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Network),
            0x02 => Some(Self::Pdo),
            0x03 => Some(Self::Diagnostic),
            _ => None,
        }
    }

    /// Number of command ids defined for this category.
    #[must_use]
    pub fn id_count(self) -> u8 {
        match self {
            Self::Network | Self::Pdo | Self::Diagnostic => 4,
        }
    }
}

/// Bus lifecycle command ids (category [`Category::Network`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetCmd {
    /// Bring the bus up.
    Start = 0x01,
    /// Take the bus down.
    Stop = 0x02,
    /// Report the slave count.
    Scan = 0x03,
    /// Report slave count and active flag.
    Status = 0x04,
}

impl NetCmd {
    /// Try to convert a raw byte into a `NetCmd`.
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Start),
            0x02 => Some(Self::Stop),
            0x03 => Some(Self::Scan),
            0x04 => Some(Self::Status),
            _ => None,
        }
    }
}

/// Process-data command ids (category [`Category::Pdo`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PdoCmd {
    /// Read from the input image.
    Read = 0x01,
    /// Write to the output image.
    Write = 0x02,
    /// Reserved.
    Monitor = 0x03,
    /// Reserved.
    StopMonitor = 0x04,
}

impl PdoCmd {
    /// Try to convert a raw byte into a `PdoCmd`.
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Read),
            0x02 => Some(Self::Write),
            0x03 => Some(Self::Monitor),
            0x04 => Some(Self::StopMonitor),
            _ => None,
        }
    }
}

/// Diagnostic command ids (category [`Category::Diagnostic`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DiagCmd {
    /// Network summary.
    Network = 0x01,
    /// Cycle timing statistics.
    Timing = 0x02,
    /// Error counters.
    Errors = 0x03,
    /// Single-slave status.
    Slave = 0x04,
}

impl DiagCmd {
    /// Try to convert a raw byte into a `DiagCmd`.
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Network),
            0x02 => Some(Self::Timing),
            0x03 => Some(Self::Errors),
            0x04 => Some(Self::Slave),
            _ => None,
        }
    }
}

/// Response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Command executed.
    Success = 0x00,
    /// Command rejected; see the error code.
    Error = 0x01,
}

/// Response error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// No error.
    None = 0x00,
    /// Command magic did not match.
    InvalidMagic = 0x01,
    /// Unknown or malformed command.
    InvalidCommand = 0x02,
    /// Payload too short or inconsistent.
    InvalidPayload = 0x03,
    /// Bus not in the required state.
    NetworkNotReady = 0x04,
    /// Slave index unknown or offline.
    SlaveNotFound = 0x05,
    /// Backend timed out.
    Timeout = 0x06,
    /// Unclassified backend failure.
    Internal = 0xFF,
}

/// One decoded operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    /// Frame magic; must equal [`CMD_MAGIC`].
    pub magic: u32,
    /// Command category byte.
    pub category: u8,
    /// Command id within the category.
    pub id: u8,
    /// Declared payload length.
    pub payload_len: u16,
    /// Raw payload bytes; only the first `payload_len` are meaningful.
    pub payload: [u8; MAX_PAYLOAD],
}

impl CommandFrame {
    /// Build a command frame from parts, clamping the payload to
    /// [`MAX_PAYLOAD`] bytes.
    #[must_use]
    pub fn new(category: u8, id: u8, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_PAYLOAD);
        let mut buf = [0u8; MAX_PAYLOAD];
        buf[..len].copy_from_slice(&payload[..len]);
        Self {
            magic: CMD_MAGIC,
            category,
            id,
            payload_len: len as u16,
            payload: buf,
        }
    }

    /// Decode a frame from raw bytes. Requires exactly [`FRAME_LEN`] bytes;
    /// no field validation is performed here.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != FRAME_LEN {
            return None;
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&buf[8..FRAME_LEN]);
        Some(Self {
            magic: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            category: buf[4],
            id: buf[5],
            payload_len: u16::from_be_bytes([buf[6], buf[7]]),
            payload,
        })
    }

    /// Encode the frame to its on-wire representation.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4] = self.category;
        buf[5] = self.id;
        buf[6..8].copy_from_slice(&self.payload_len.to_be_bytes());
        buf[8..FRAME_LEN].copy_from_slice(&self.payload);
        buf
    }

    /// Check magic, category range, declared payload length, and id range.
    /// Payload contents are not inspected.
    #[must_use]
    pub fn validate(&self) -> bool {
        if self.magic != CMD_MAGIC {
            return false;
        }
        if usize::from(self.payload_len) > MAX_PAYLOAD {
            return false;
        }
        match Category::from_u8(self.category) {
            Some(category) => self.id >= 1 && self.id <= category.id_count(),
            None => false,
        }
    }

    /// The meaningful payload slice (declared length, clamped to the buffer).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.payload_len).min(MAX_PAYLOAD);
        &self.payload[..len]
    }

    /// Build a PDO read command for `size` bytes at `offset` of `slave`.
    #[must_use]
    pub fn pdo_read(slave: u32, offset: u32, size: u32) -> Self {
        let mut payload = [0u8; 12];
        payload[0..4].copy_from_slice(&slave.to_be_bytes());
        payload[4..8].copy_from_slice(&offset.to_be_bytes());
        payload[8..12].copy_from_slice(&size.to_be_bytes());
        Self::new(Category::Pdo as u8, PdoCmd::Read as u8, &payload)
    }

    /// Build a PDO write command storing `value` at `offset` of `slave`.
    #[must_use]
    pub fn pdo_write(slave: u32, offset: u32, value: u32) -> Self {
        let mut payload = [0u8; 12];
        payload[0..4].copy_from_slice(&slave.to_be_bytes());
        payload[4..8].copy_from_slice(&offset.to_be_bytes());
        payload[8..12].copy_from_slice(&value.to_be_bytes());
        Self::new(Category::Pdo as u8, PdoCmd::Write as u8, &payload)
    }
}

/// One reply to an operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Frame magic; always [`RESP_MAGIC`].
    pub magic: u32,
    /// Status byte.
    pub status: u8,
    /// Error code byte.
    pub error: u8,
    /// Declared payload length.
    pub payload_len: u16,
    /// Payload bytes, zero-filled past `payload_len`.
    pub payload: [u8; MAX_PAYLOAD],
}

impl ResponseFrame {
    /// Build a response, copying at most [`MAX_PAYLOAD`] payload bytes and
    /// zero-filling the rest.
    #[must_use]
    pub fn new(status: Status, error: ErrorCode, data: &[u8]) -> Self {
        let len = data.len().min(MAX_PAYLOAD);
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..len].copy_from_slice(&data[..len]);
        Self {
            magic: RESP_MAGIC,
            status: status as u8,
            error: error as u8,
            payload_len: len as u16,
            payload,
        }
    }

    /// Shorthand for a successful reply.
    #[must_use]
    pub fn success(data: &[u8]) -> Self {
        Self::new(Status::Success, ErrorCode::None, data)
    }

    /// Shorthand for an error reply with no payload.
    #[must_use]
    pub fn error(code: ErrorCode) -> Self {
        Self::new(Status::Error, code, &[])
    }

    /// Encode the response to its on-wire representation.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4] = self.status;
        buf[5] = self.error;
        buf[6..8].copy_from_slice(&self.payload_len.to_be_bytes());
        buf[8..FRAME_LEN].copy_from_slice(&self.payload);
        buf
    }

    /// Decode a response from raw bytes (client side and tests).
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() != FRAME_LEN {
            return None;
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&buf[8..FRAME_LEN]);
        Some(Self {
            magic: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            status: buf[4],
            error: buf[5],
            payload_len: u16::from_be_bytes([buf[6], buf[7]]),
            payload,
        })
    }

    /// The meaningful payload slice.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.payload_len).min(MAX_PAYLOAD);
        &self.payload[..len]
    }
}

/// One process-data operation extracted from a PDO command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoOperation {
    /// Target slave identifier (1-based).
    pub slave_id: u32,
    /// Byte offset into the process image.
    pub offset: u32,
    /// Access size in bytes.
    pub size: u32,
    /// Value to store (writes only).
    pub value: u32,
}

impl PdoOperation {
    /// Extract a PDO operation from a category-PDO command.
    ///
    /// Requires at least 8 payload bytes (slave id and offset as big-endian
    /// u32s). A 12-byte payload additionally carries the value (writes) or
    /// the size (reads); shorter payloads imply a 1-byte access.
    #[must_use]
    pub fn extract(cmd: &CommandFrame) -> Option<Self> {
        if cmd.category != Category::Pdo as u8 {
            return None;
        }

        let payload_len = usize::from(cmd.payload_len);
        if payload_len < 8 {
            return None;
        }

        let word = |i: usize| {
            u32::from_be_bytes([
                cmd.payload[i],
                cmd.payload[i + 1],
                cmd.payload[i + 2],
                cmd.payload[i + 3],
            ])
        };

        let slave_id = word(0);
        let offset = word(4);

        let (size, value) = if cmd.id == PdoCmd::Write as u8 && payload_len >= 12 {
            (4, word(8))
        } else if cmd.id == PdoCmd::Read as u8 && payload_len >= 12 {
            (word(8), 0)
        } else {
            (1, 0)
        };

        Some(Self {
            slave_id,
            offset,
            size,
            value,
        })
    }
}

/// Pack the NET/STATUS payload: slave count then active flag, big-endian.
#[must_use]
pub fn pack_network_status(slave_count: u32, active: bool) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[0..4].copy_from_slice(&slave_count.to_be_bytes());
    payload[4..8].copy_from_slice(&u32::from(active).to_be_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_command(magic: u32, category: u8, id: u8, payload: &[u8]) -> [u8; FRAME_LEN] {
        let mut frame = CommandFrame::new(category, id, payload);
        frame.magic = magic;
        frame.encode()
    }

    #[test]
    fn test_decode_requires_exact_length() {
        assert!(CommandFrame::decode(&[0u8; FRAME_LEN - 1]).is_none());
        assert!(CommandFrame::decode(&[0u8; FRAME_LEN + 1]).is_none());
        assert!(CommandFrame::decode(&[0u8; FRAME_LEN]).is_some());
    }

    #[test]
    fn test_command_roundtrip() {
        let cmd = CommandFrame::new(Category::Network as u8, NetCmd::Status as u8, &[]);
        let decoded = CommandFrame::decode(&cmd.encode()).unwrap();
        assert_eq!(decoded, cmd);
        assert!(decoded.validate());
    }

    #[test]
    fn test_validate_rejects_bad_magic() {
        let buf = raw_command(0xDEAD_BEEF, 0x01, 0x01, &[]);
        let cmd = CommandFrame::decode(&buf).unwrap();
        assert!(!cmd.validate());
    }

    #[test]
    fn test_validate_rejects_unknown_category() {
        let buf = raw_command(CMD_MAGIC, 0x04, 0x01, &[]);
        assert!(!CommandFrame::decode(&buf).unwrap().validate());

        let buf = raw_command(CMD_MAGIC, 0x00, 0x01, &[]);
        assert!(!CommandFrame::decode(&buf).unwrap().validate());
    }

    #[test]
    fn test_validate_rejects_out_of_range_id() {
        for id in [0u8, 5, 0xFF] {
            let buf = raw_command(CMD_MAGIC, Category::Network as u8, id, &[]);
            assert!(!CommandFrame::decode(&buf).unwrap().validate(), "id {id}");
        }
    }

    #[test]
    fn test_validate_rejects_oversize_payload_len() {
        let mut cmd = CommandFrame::new(Category::Network as u8, NetCmd::Status as u8, &[]);
        cmd.payload_len = (MAX_PAYLOAD as u16) + 1;
        assert!(!cmd.validate());
    }

    #[test]
    fn test_pdo_read_extraction_roundtrip() {
        let cmd = CommandFrame::pdo_read(7, 16, 4);
        let op = PdoOperation::extract(&cmd).unwrap();
        assert_eq!(op.slave_id, 7);
        assert_eq!(op.offset, 16);
        assert_eq!(op.size, 4);
        assert_eq!(op.value, 0);
    }

    #[test]
    fn test_pdo_write_extraction_roundtrip() {
        let cmd = CommandFrame::pdo_write(3, 8, 0xAABB_CCDD);
        let op = PdoOperation::extract(&cmd).unwrap();
        assert_eq!(op.slave_id, 3);
        assert_eq!(op.offset, 8);
        assert_eq!(op.size, 4);
        assert_eq!(op.value, 0xAABB_CCDD);
    }

    #[test]
    fn test_pdo_extraction_short_payload_defaults() {
        // 8-byte payload: slave + offset only, size defaults to 1
        let mut payload = [0u8; 8];
        payload[0..4].copy_from_slice(&2u32.to_be_bytes());
        payload[4..8].copy_from_slice(&5u32.to_be_bytes());
        let cmd = CommandFrame::new(Category::Pdo as u8, PdoCmd::Read as u8, &payload);

        let op = PdoOperation::extract(&cmd).unwrap();
        assert_eq!(op.slave_id, 2);
        assert_eq!(op.offset, 5);
        assert_eq!(op.size, 1);
        assert_eq!(op.value, 0);
    }

    #[test]
    fn test_pdo_extraction_rejects_short_and_foreign() {
        let short = CommandFrame::new(Category::Pdo as u8, PdoCmd::Read as u8, &[0u8; 7]);
        assert!(PdoOperation::extract(&short).is_none());

        let foreign = CommandFrame::new(Category::Network as u8, NetCmd::Scan as u8, &[0u8; 12]);
        assert!(PdoOperation::extract(&foreign).is_none());
    }

    #[test]
    fn test_response_clamps_and_zero_fills() {
        let data = [0xAAu8; 48];
        let resp = ResponseFrame::success(&data);
        assert_eq!(usize::from(resp.payload_len), MAX_PAYLOAD);
        assert_eq!(resp.payload(), &data[..MAX_PAYLOAD]);

        let small = ResponseFrame::success(&[1, 2, 3]);
        assert_eq!(small.payload(), &[1, 2, 3]);
        assert!(small.payload[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_response_roundtrip() {
        let resp = ResponseFrame::new(Status::Error, ErrorCode::SlaveNotFound, &[9, 9]);
        let decoded = ResponseFrame::decode(&resp.encode()).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(decoded.magic, RESP_MAGIC);
        assert_eq!(decoded.status, Status::Error as u8);
        assert_eq!(decoded.error, ErrorCode::SlaveNotFound as u8);
    }

    #[test]
    fn test_pack_network_status() {
        let payload = pack_network_status(3, true);
        assert_eq!(payload, [0, 0, 0, 3, 0, 0, 0, 1]);

        let payload = pack_network_status(0, false);
        assert_eq!(payload, [0u8; 8]);
    }

    #[test]
    fn test_big_endian_layout() {
        let cmd = CommandFrame::new(Category::Pdo as u8, PdoCmd::Read as u8, &[0xFF]);
        let buf = cmd.encode();
        assert_eq!(&buf[0..4], &[0xEF, 0x00, 0x00, 0x01]);
        assert_eq!(buf[4], 0x02);
        assert_eq!(buf[5], 0x01);
        assert_eq!(&buf[6..8], &[0x00, 0x01]);
    }
}
