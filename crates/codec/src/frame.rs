use bytes::{BufMut, Bytes, BytesMut};

use crate::control::Control;
use crate::error::Error;

/// Fixed header size in bytes: ctrl(1) + flags(1) + header_version(1) +
/// reserved(1) + token(16) + board_id(8) + seq_num(4) + uci_len(1).
const HEADER_LEN: usize = 1 + 1 + 1 + 1 + 16 + 8 + 4 + 1;

/// Longest legal UCI move token, e.g. "e7e8q".
pub const MAX_UCI_LENGTH: usize = 6;

/// Fixed-capacity stand-in for the variable-length UCI field so frames that
/// carry one don't need a heap allocation just to hold six ASCII bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UciBytes {
    buf: [u8; MAX_UCI_LENGTH],
    len: u8,
}

impl UciBytes {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        let bytes = s.as_bytes();
        if bytes.len() > MAX_UCI_LENGTH {
            return Err(Error::UciTooLong);
        }
        let mut buf = [0u8; MAX_UCI_LENGTH];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buf,
            len: bytes.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Header flags bitfield. Bit 0 is the only bit the wire protocol currently
/// interprets; the high nibble is reserved for capability negotiation between
/// client and server hello frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    const UNRELIABLE_BIT: u8 = 0b0000_0001;

    pub fn new(unreliable: bool) -> Self {
        Self(if unreliable { Self::UNRELIABLE_BIT } else { 0 })
    }

    /// Builds flags carrying both the reliability bit and a negotiated
    /// capability nibble, as SERVER_HELLO replies to CLIENT_HELLO do.
    pub fn with_capabilities(unreliable: bool, capabilities: u8) -> Self {
        let base = if unreliable { Self::UNRELIABLE_BIT } else { 0 };
        Self(base | (capabilities << 4))
    }

    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn is_unreliable(self) -> bool {
        self.0 & Self::UNRELIABLE_BIT != 0
    }

    pub fn capabilities(self) -> u8 {
        self.0 >> 4
    }
}

/// A single decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub ctrl: Control,
    pub flags: Flags,
    pub header_version: u8,
    pub token: [u8; 16],
    pub board_id: u64,
    pub seq_num: u32,
    pub uci: UciBytes,
    pub payload: Bytes,
}

impl Frame {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.uci.len() + self.payload.len());
        buf.put_u8(self.ctrl.into());
        buf.put_u8(self.flags.raw());
        buf.put_u8(self.header_version);
        buf.put_u8(0); // reserved
        buf.put_slice(&self.token);
        buf.put_u64(self.board_id);
        buf.put_u32(self.seq_num);
        buf.put_u8(self.uci.len() as u8);
        buf.put_slice(self.uci.as_str().as_bytes());
        buf.put_slice(&self.payload);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Frame, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        let ctrl_byte = bytes[0];
        let ctrl = Control::try_from_primitive_or(ctrl_byte)?;
        let flags = Flags::from_raw(bytes[1]);
        let header_version = bytes[2];
        // bytes[3] is reserved and ignored on decode.

        let mut token = [0u8; 16];
        token.copy_from_slice(&bytes[4..20]);
        if token == [0u8; 16] && !ctrl.is_ack() {
            return Err(Error::EmptyToken);
        }

        let board_id = u64::from_be_bytes(bytes[20..28].try_into().unwrap());
        let seq_num = u32::from_be_bytes(bytes[28..32].try_into().unwrap());
        let uci_len = bytes[32] as usize;
        if uci_len > MAX_UCI_LENGTH {
            return Err(Error::UciTooLong);
        }
        if bytes.len() < HEADER_LEN + uci_len {
            return Err(Error::Truncated);
        }

        let uci_str = std::str::from_utf8(&bytes[HEADER_LEN..HEADER_LEN + uci_len])
            .map_err(|_| Error::Truncated)?;
        let uci = UciBytes::from_str(uci_str)?;
        let payload = Bytes::copy_from_slice(&bytes[HEADER_LEN + uci_len..]);

        Ok(Frame {
            ctrl,
            flags,
            header_version,
            token,
            board_id,
            seq_num,
            uci,
            payload,
        })
    }
}

// Small local extension so decode() can turn an unknown byte into our own
// Error variant instead of num_enum's TryFromPrimitiveError.
trait TryControl {
    fn try_from_primitive_or(byte: u8) -> Result<Control, Error>;
}

impl TryControl for Control {
    fn try_from_primitive_or(byte: u8) -> Result<Control, Error> {
        use num_enum::TryFromPrimitive;
        Control::try_from_primitive(byte).map_err(|_| Error::UnknownControl(byte))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            ctrl: Control::PlayerMove,
            flags: Flags::new(false),
            header_version: crate::SERVER_VERSION,
            token: [7u8; 16],
            board_id: 42,
            seq_num: 9,
            uci: UciBytes::from_str("e2e4").unwrap(),
            payload: Bytes::new(),
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let frame = sample_frame();
        let encoded = frame.encode();
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let short = [0u8; HEADER_LEN - 1];
        assert_eq!(Frame::decode(&short), Err(Error::Truncated));
    }

    #[test]
    fn decode_rejects_unknown_control() {
        let mut encoded = sample_frame().encode();
        encoded[0] = 200;
        assert_eq!(Frame::decode(&encoded), Err(Error::UnknownControl(200)));
    }

    #[test]
    fn decode_rejects_empty_token_on_non_ack() {
        let mut frame = sample_frame();
        frame.token = [0u8; 16];
        let encoded = frame.encode();
        assert_eq!(Frame::decode(&encoded), Err(Error::EmptyToken));
    }

    #[test]
    fn ack_frames_permit_empty_token() {
        let mut frame = sample_frame();
        frame.ctrl = Control::Ack;
        frame.token = [0u8; 16];
        let encoded = frame.encode();
        assert!(Frame::decode(&encoded).is_ok());
    }

    #[test]
    fn decode_rejects_uci_len_overflow() {
        let mut encoded = sample_frame().encode();
        encoded[32] = (MAX_UCI_LENGTH + 1) as u8;
        assert_eq!(Frame::decode(&encoded), Err(Error::UciTooLong));
    }
}
