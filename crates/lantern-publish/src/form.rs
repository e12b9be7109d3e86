//! Decoding of the POST body the owner UI submits.
//!
//! The body is `serializedServices=` followed by a URL-encoded stream of
//! ASCII `<type>:<length>:<bytes>` triples (this is *not* the binary TLV
//! of the SDE payloads). A `DESCRIPTION` triple opens one service record;
//! the triples after it, up to the next `DESCRIPTION` or the end of the
//! stream, fill in that record's fields.

use lantern_core::sde::ChunkType;
use lantern_store::{ServiceDraft, ServiceList, StoreError};

/// Literal prefix every valid POST body starts with.
pub const POST_KEY: &[u8] = b"serializedServices=";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing length")]
    MissingLength,

    #[error("cannot find length's ':'")]
    LengthDelimiter,

    #[error("missing or corrupted value")]
    TruncatedValue,

    #[error("field is not a decimal number")]
    InvalidNumber,

    #[error("field is not valid UTF-8")]
    InvalidText,

    #[error("unexpected type {0}")]
    UnexpectedType(u32),

    #[error("a service URI is required")]
    MissingUri,
}

/// URL-decodes `data` in one pass: `+` becomes a space, `%HH` becomes the
/// byte with hex value `HH`, everything else passes through. Decoding
/// stops at the first `&` (the start of the next form field) or the end
/// of the buffer.
pub fn url_decode(data: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'&' => break,
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b'%' => match (hex_digit(data.get(i + 1)), hex_digit(data.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    decoded.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    decoded.push(b'%');
                    i += 1;
                }
            },
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    decoded
}

fn hex_digit(byte: Option<&u8>) -> Option<u8> {
    (*byte? as char).to_digit(16).map(|d| d as u8)
}

/// Skims the decoded body one record at a time.
pub struct ServiceScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ServiceScanner<'a> {
    /// Initialises the scanner by skimming to the first `DESCRIPTION`
    /// triple. Triples before it carry no record and are dropped; a body
    /// with no `DESCRIPTION` at all yields no services.
    pub fn new(data: &'a [u8]) -> Result<Self, ParseError> {
        let mut scanner = Self { data, pos: 0 };
        while let Some((chunk_type, _)) = scanner.read_triple()? {
            if chunk_type == ChunkType::Description {
                break;
            }
        }
        Ok(scanner)
    }

    /// Parses one record: the field triples up to the next `DESCRIPTION`
    /// (which is consumed — it delimits the following record) or the end
    /// of the stream. Returns `Ok(None)` once the stream is exhausted.
    pub fn next_service(&mut self) -> Result<Option<ServiceDraft>, ParseError> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let mut cat_id: u32 = 0;
        let mut uri: Option<String> = None;
        let mut desc: Option<String> = None;
        let mut long_desc: Option<String> = None;

        while let Some((chunk_type, value)) = self.read_triple()? {
            match chunk_type {
                ChunkType::Description => break,
                ChunkType::ServiceCatId => cat_id = decimal(value)?,
                ChunkType::ServiceUri => uri = Some(text(value)?),
                ChunkType::ServiceShortDesc => desc = Some(text(value)?),
                ChunkType::ServiceLongDesc => long_desc = Some(text(value)?),
                other => return Err(ParseError::UnexpectedType(other.into())),
            }
        }

        let mut draft = ServiceDraft::new(cat_id, uri.ok_or(ParseError::MissingUri)?)
            .map_err(|_| ParseError::MissingUri)?;
        if let Some(desc) = desc {
            draft = draft.with_desc(desc);
        }
        if let Some(long_desc) = long_desc {
            draft = draft.with_long_desc(long_desc);
        }
        Ok(Some(draft))
    }

    /// Collects every remaining record.
    pub fn collect_services(mut self) -> Result<Vec<ServiceDraft>, ParseError> {
        let mut drafts = Vec::new();
        while let Some(draft) = self.next_service()? {
            drafts.push(draft);
        }
        Ok(drafts)
    }

    /// Reads one `<type>:<length>:<bytes>` triple. `Ok(None)` at the end
    /// of the stream (no further type delimiter, matching the grammar's
    /// EOF), errors on malformed framing past that point.
    fn read_triple(&mut self) -> Result<Option<(ChunkType, &'a [u8])>, ParseError> {
        let data = self.data;
        let mut cursor = self.pos;
        if cursor >= data.len() {
            return Ok(None);
        }

        // <type>:
        let Some(colon) = find_colon(data, cursor) else {
            return Ok(None);
        };
        let raw_type: u32 = decimal(&data[cursor..colon])?;
        cursor = colon + 1;

        // <length>:
        if cursor >= data.len() {
            return Err(ParseError::MissingLength);
        }
        let colon = find_colon(data, cursor).ok_or(ParseError::LengthDelimiter)?;
        let length: usize = decimal(&data[cursor..colon])?;
        cursor = colon + 1;

        // <bytes>, exactly `length` of them
        if data.len() - cursor < length {
            return Err(ParseError::TruncatedValue);
        }
        let value = &data[cursor..cursor + length];
        self.pos = cursor + length;

        let chunk_type =
            ChunkType::try_from(raw_type).map_err(|_| ParseError::UnexpectedType(raw_type))?;
        Ok(Some((chunk_type, value)))
    }
}

fn find_colon(data: &[u8], from: usize) -> Option<usize> {
    data[from..].iter().position(|&b| b == b':').map(|i| from + i)
}

fn decimal<T: std::str::FromStr>(bytes: &[u8]) -> Result<T, ParseError> {
    std::str::from_utf8(bytes)
        .map_err(|_| ParseError::InvalidNumber)?
        .parse()
        .map_err(|_| ParseError::InvalidNumber)
}

fn text(bytes: &[u8]) -> Result<String, ParseError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidText)
}

/// Replaces the published catalog with `drafts` in one staged commit.
pub fn replace_catalog(
    list: &mut ServiceList,
    drafts: &[ServiceDraft],
) -> Result<(), StoreError> {
    list.remove_all()?;
    for draft in drafts {
        list.add_last(draft)?;
    }
    list.commit()
}

// ── Tests ────────────────────────────────────────────────────────────────────
