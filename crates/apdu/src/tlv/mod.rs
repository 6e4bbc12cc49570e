//! TLV records and list codec
//!
//! Payloads are flat lists of tag-length-value records: a one-byte tag, a
//! length, then the value. Lengths below `0xFF` occupy one byte; longer
//! values use a `0xFF` marker followed by a big-endian `u16`. Nested
//! structures (wallet records) are encoded as a TLV list inside the value of
//! a single record and decoded by recursing on that value.

mod error;
mod tag;

use bytes::{BufMut, Bytes, BytesMut};

pub use error::TlvError;
pub use tag::TlvTag;

/// Marker byte introducing a two-byte length field
const LONG_LENGTH_MARKER: u8 = 0xFF;

/// A single tag-length-value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: TlvTag,
    value: Bytes,
}

impl Tlv {
    /// Create a record
    pub fn new(tag: TlvTag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// The record's tag
    pub const fn tag(&self) -> TlvTag {
        self.tag
    }

    /// The record's value bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume the record, returning its value
    pub fn into_value(self) -> Bytes {
        self.value
    }

    /// Serialized length of this record including its header
    fn encoded_len(&self) -> usize {
        let header = if self.value.len() < LONG_LENGTH_MARKER as usize {
            2
        } else {
            4
        };
        header + self.value.len()
    }

    /// Serialize a list of records into one byte string
    pub fn serialize_list(tlvs: &[Self]) -> Result<Bytes, TlvError> {
        let mut buf = BytesMut::with_capacity(tlvs.iter().map(Self::encoded_len).sum());
        for tlv in tlvs {
            let len = tlv.value.len();
            if len > u16::MAX as usize {
                return Err(TlvError::ValueTooLong { length: len });
            }
            buf.put_u8(tlv.tag.to_u8());
            if len < LONG_LENGTH_MARKER as usize {
                buf.put_u8(len as u8);
            } else {
                buf.put_u8(LONG_LENGTH_MARKER);
                buf.put_u16(len as u16);
            }
            buf.put_slice(&tlv.value);
        }
        Ok(buf.freeze())
    }

    /// Deserialize a byte string into its record list
    pub fn deserialize_list(data: &[u8]) -> Result<Vec<Self>, TlvError> {
        let mut tlvs = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let start = offset;
            let tag = TlvTag::from_u8(data[offset]);
            offset += 1;
            let len = match data.get(offset) {
                Some(&LONG_LENGTH_MARKER) => {
                    let hi = data.get(offset + 1);
                    let lo = data.get(offset + 2);
                    offset += 3;
                    match (hi, lo) {
                        (Some(&hi), Some(&lo)) => u16::from_be_bytes([hi, lo]) as usize,
                        _ => return Err(TlvError::Truncated { offset: start }),
                    }
                }
                Some(&len) => {
                    offset += 1;
                    len as usize
                }
                None => return Err(TlvError::Truncated { offset: start }),
            };
            if offset + len > data.len() {
                return Err(TlvError::Truncated { offset: start });
            }
            tlvs.push(Self::new(tag, Bytes::copy_from_slice(&data[offset..offset + len])));
            offset += len;
        }
        Ok(tlvs)
    }
}

/// Decoded-list view with typed accessors
///
/// Lookups return the first record carrying the tag; [`TlvMap::all`] exposes
/// repeated tags (digest chunks, wallet records).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvMap(Vec<Tlv>);

impl TlvMap {
    /// Decode a byte string into a map view
    pub fn parse(data: &[u8]) -> Result<Self, TlvError> {
        Ok(Self(Tlv::deserialize_list(data)?))
    }

    /// The underlying records in wire order
    pub fn tlvs(&self) -> &[Tlv] {
        &self.0
    }

    /// Value of the first record with `tag`, if present
    pub fn get(&self, tag: TlvTag) -> Option<&[u8]> {
        self.0.iter().find(|tlv| tlv.tag() == tag).map(Tlv::value)
    }

    /// Value of the first record with `tag`, or [`TlvError::MissingTag`]
    pub fn required(&self, tag: TlvTag) -> Result<&[u8], TlvError> {
        self.get(tag).ok_or(TlvError::MissingTag(tag))
    }

    /// Values of every record with `tag`, in wire order
    pub fn all(&self, tag: TlvTag) -> impl Iterator<Item = &[u8]> {
        self.0
            .iter()
            .filter(move |tlv| tlv.tag() == tag)
            .map(Tlv::value)
    }

    /// Required value as an owned byte string
    pub fn required_bytes(&self, tag: TlvTag) -> Result<Bytes, TlvError> {
        self.required(tag).map(Bytes::copy_from_slice)
    }

    /// Required value as UTF-8 text
    pub fn required_string(&self, tag: TlvTag) -> Result<String, TlvError> {
        let value = self.required(tag)?;
        String::from_utf8(value.to_vec()).map_err(|_| TlvError::InvalidValue {
            tag,
            expected: "UTF-8 text",
        })
    }

    /// Required value as a single byte
    pub fn required_byte(&self, tag: TlvTag) -> Result<u8, TlvError> {
        match self.required(tag)? {
            [byte] => Ok(*byte),
            _ => Err(TlvError::InvalidValue {
                tag,
                expected: "exactly one byte",
            }),
        }
    }

    /// Required value as a big-endian unsigned integer of 1..=8 bytes.
    ///
    /// The wire width varies by firmware, so any width up to eight bytes is
    /// accepted and widened.
    pub fn required_uint(&self, tag: TlvTag) -> Result<u64, TlvError> {
        let value = self.required(tag)?;
        if value.is_empty() || value.len() > 8 {
            return Err(TlvError::InvalidValue {
                tag,
                expected: "1 to 8 big-endian bytes",
            });
        }
        Ok(value.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    /// Required value as a fixed-width byte array
    pub fn required_array<const N: usize>(&self, tag: TlvTag) -> Result<[u8; N], TlvError> {
        self.required(tag)?
            .try_into()
            .map_err(|_| TlvError::InvalidValue {
                tag,
                expected: "fixed-width value",
            })
    }

    /// Boolean flag: true when the tag is present with a non-zero last byte
    /// or an empty value (bare-presence encoding)
    pub fn flag(&self, tag: TlvTag) -> bool {
        self.get(tag)
            .is_some_and(|value| value.last().is_none_or(|&b| b != 0))
    }
}
