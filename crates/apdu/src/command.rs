//! Command APDU framing

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ApduError;
use crate::instruction::Instruction;
use crate::tlv::Tlv;

/// Command class byte; the token uses the base ISO class throughout
pub const CLA: u8 = 0x00;

/// A command APDU before sealing
///
/// Carries the logical content of a request: instruction, the two parameter
/// bytes and a payload. For protocol commands the payload is a TLV list and
/// `p2` is written at seal time with the encryption-mode byte; the payload
/// here is always plaintext, ciphertext only exists in the sealed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    /// Instruction code
    pub instruction: Instruction,
    /// First parameter byte
    pub p1: u8,
    /// Second parameter byte (encryption mode for protocol commands)
    pub p2: u8,
    /// Payload bytes
    pub payload: Bytes,
}

impl CommandApdu {
    /// Create a command with a raw payload
    pub fn new(instruction: Instruction, payload: impl Into<Bytes>) -> Self {
        Self {
            instruction,
            p1: 0,
            p2: 0,
            payload: payload.into(),
        }
    }

    /// Create a command from a TLV list payload
    pub fn with_tlvs(instruction: Instruction, tlvs: &[Tlv]) -> Result<Self, ApduError> {
        Ok(Self::new(instruction, Tlv::serialize_list(tlvs)?))
    }

    /// Set the first parameter byte
    #[must_use]
    pub const fn with_p1(mut self, p1: u8) -> Self {
        self.p1 = p1;
        self
    }

    /// Set the second parameter byte
    #[must_use]
    pub const fn with_p2(mut self, p2: u8) -> Self {
        self.p2 = p2;
        self
    }

    /// ISO SELECT for the applet identified by `aid`
    pub fn select(aid: &[u8]) -> Self {
        Self::new(Instruction::Select, Bytes::copy_from_slice(aid)).with_p1(0x04)
    }

    /// Whether serialization needs the extended length form
    pub const fn needs_extended_length(&self) -> bool {
        self.payload.len() > 0xFF
    }

    /// Serialize to wire bytes.
    ///
    /// Header is `[CLA][INS][P1][P2]`; a non-empty payload is framed with a
    /// one-byte Lc, or the ISO extended form (`00` marker plus a big-endian
    /// `u16`) when it exceeds 255 bytes. Whether the link accepts the
    /// extended form is the sender's problem, not the codec's.
    pub fn to_bytes(&self) -> Result<Bytes, ApduError> {
        let len = self.payload.len();
        if len > u16::MAX as usize {
            return Err(ApduError::PayloadTooLong { length: len });
        }

        let mut buffer = BytesMut::with_capacity(4 + 3 + len);
        buffer.put_u8(CLA);
        buffer.put_u8(self.instruction.to_u8());
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if len > 0 {
            if self.needs_extended_length() {
                buffer.put_u8(0x00);
                buffer.put_u16(len as u16);
            } else {
                buffer.put_u8(len as u8);
            }
            buffer.put_slice(&self.payload);
        }

        Ok(buffer.freeze())
    }

    /// Parse wire bytes back into a command.
    ///
    /// Understands both Lc forms. The frame must carry exactly the declared
    /// payload and start with the protocol class byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ApduError> {
        let malformed = ApduError::MalformedCommand {
            length: bytes.len(),
        };
        if bytes.len() < 4 || bytes[0] != CLA {
            return Err(malformed);
        }

        let body = &bytes[4..];
        let payload = if body.is_empty() {
            Bytes::new()
        } else if body[0] != 0x00 {
            // Short form: one-byte Lc
            if body.len() != 1 + body[0] as usize {
                return Err(malformed);
            }
            Bytes::copy_from_slice(&body[1..])
        } else {
            // Extended form: 0x00 marker plus big-endian u16
            if body.len() < 3 {
                return Err(malformed);
            }
            let length = u16::from_be_bytes([body[1], body[2]]) as usize;
            if body.len() != 3 + length {
                return Err(malformed);
            }
            Bytes::copy_from_slice(&body[3..])
        };

        Ok(Self {
            instruction: Instruction::from_u8(bytes[1]),
            p1: bytes[2],
            p2: bytes[3],
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TlvTag;

    #[test]
    fn test_header_only_command() {
        let apdu = CommandApdu::new(Instruction::Read, Bytes::new());
        assert_eq!(apdu.to_bytes().unwrap().as_ref(), &[0x00, 0xF2, 0x00, 0x00]);
    }

    #[test]
    fn test_short_payload_framing() {
        let apdu = CommandApdu::new(Instruction::Sign, vec![0xAA, 0xBB, 0xCC])
            .with_p1(0x01)
            .with_p2(0x02);
        let bytes = apdu.to_bytes().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x00, 0xFB, 0x01, 0x02, 0x03, 0xAA, 0xBB, 0xCC]
        );
    }

    #[test]
    fn test_extended_payload_framing() {
        let apdu = CommandApdu::new(Instruction::WriteFileData, vec![0x5A; 300]);
        assert!(apdu.needs_extended_length());
        let bytes = apdu.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0xE1, 0x00, 0x00]);
        assert_eq!(bytes[4], 0x00);
        assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]), 300);
        assert_eq!(bytes.len(), 7 + 300);
    }

    #[test]
    fn test_tlv_payload() {
        let apdu = CommandApdu::with_tlvs(
            Instruction::Read,
            &[Tlv::new(TlvTag::Pin, vec![0x11; 32])],
        )
        .unwrap();
        let bytes = apdu.to_bytes().unwrap();
        assert_eq!(bytes[4], 34); // Lc: tag + length + 32 value bytes
        assert_eq!(bytes[5], 0x10); // Pin tag
        assert_eq!(bytes[6], 32);
    }

    #[test]
    fn test_select_command() {
        let bytes = CommandApdu::select(&[0x54, 0x41, 0x50, 0x01]).to_bytes().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x00, 0xA4, 0x04, 0x00, 0x04, 0x54, 0x41, 0x50, 0x01]
        );
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let apdu = CommandApdu::new(Instruction::WriteFileData, vec![0x00; 0x1_0000]);
        assert!(matches!(
            apdu.to_bytes(),
            Err(ApduError::PayloadTooLong { length: 0x1_0000 })
        ));
    }

    #[test]
    fn test_parse_round_trip() {
        let apdu = CommandApdu::new(Instruction::Sign, vec![0xAA; 40])
            .with_p1(0x01)
            .with_p2(0x02);
        let parsed = CommandApdu::from_bytes(&apdu.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, apdu);

        let extended = CommandApdu::new(Instruction::WriteFileData, vec![0x5A; 300]);
        let parsed = CommandApdu::from_bytes(&extended.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, extended);
    }

    #[test]
    fn test_parse_rejects_inconsistent_frames() {
        // Truncated header
        assert!(CommandApdu::from_bytes(&[0x00, 0xF2, 0x00]).is_err());
        // Lc promises more bytes than present
        assert!(CommandApdu::from_bytes(&[0x00, 0xF2, 0x00, 0x00, 0x05, 0x01]).is_err());
        // Trailing garbage beyond the declared payload
        assert!(CommandApdu::from_bytes(&[0x00, 0xF2, 0x00, 0x00, 0x01, 0x01, 0x02]).is_err());
        // Wrong class byte
        assert!(CommandApdu::from_bytes(&[0x80, 0xF2, 0x00, 0x00]).is_err());
    }
}
