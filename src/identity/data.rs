/// Variant-tagged identity data
///
/// Identity fields on chain are one of several alternatives: absent, raw
/// bytes of at most 32 bytes, or a 32-byte hash of data kept elsewhere.
/// Clients render the same value in different JSON shapes, all of which are
/// accepted here:
///
/// - `null`, `"None"`, `{"none": null}`, `{"type": "None"}`
/// - `{"raw": P}`, `{"Raw": P}`, `{"Raw5": P}`, `{"type": "Raw5", "value": P}`
/// - `{"BlakeTwo256": P}` and friends for the hash variants
///
/// where the payload `P` is `0x`-prefixed hex, a plain string, or a list of
/// byte values.
use serde_json::Value;
use thiserror::Error;

/// Largest payload a raw data field may carry
pub const MAX_RAW_LEN: usize = 32;

/// Failures while decoding on-chain identity payloads
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unknown variant: {0}")]
    UnknownVariant(String),

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("{variant} expects {expected} bytes, got {actual}")]
    LengthMismatch {
        variant: String,
        expected: usize,
        actual: usize,
    },

    #[error("raw data is {0} bytes, limit is 32")]
    TooLong(usize),

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),
}

/// Identity data field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    /// No data here.
    None,
    /// The data is stored directly.
    Raw(Vec<u8>),
    /// Only the Blake2 hash of the data is stored.
    BlakeTwo256([u8; 32]),
    /// Only the SHA2-256 hash of the data is stored.
    Sha256([u8; 32]),
    /// Only the Keccak-256 hash of the data is stored.
    Keccak256([u8; 32]),
    /// Only the SHA3-256 hash of the data is stored.
    ShaThree256([u8; 32]),
}

impl Default for Data {
    fn default() -> Self {
        Self::None
    }
}

impl Data {
    /// Decode any supported JSON rendering
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(Data::None),
            Value::String(tag) => Self::from_tag(tag, None),
            Value::Object(fields) => {
                if let Some(tag) = fields.get("type").and_then(Value::as_str) {
                    return Self::from_tag(tag, fields.get("value"));
                }

                let mut iter = fields.iter();
                match (iter.next(), iter.next()) {
                    (Some((tag, payload)), None) => Self::from_tag(tag, Some(payload)),
                    _ => Err(DecodeError::UnexpectedShape(value.to_string())),
                }
            }
            other => Err(DecodeError::UnexpectedShape(other.to_string())),
        }
    }

    fn from_tag(tag: &str, payload: Option<&Value>) -> Result<Self, DecodeError> {
        let lower = tag.to_ascii_lowercase();

        match lower.as_str() {
            "none" => Ok(Data::None),
            "raw" => {
                let bytes = payload_bytes(tag, payload)?;
                if bytes.len() > MAX_RAW_LEN {
                    return Err(DecodeError::TooLong(bytes.len()));
                }
                Ok(Data::Raw(bytes))
            }
            "blaketwo256" => Ok(Data::BlakeTwo256(hash_payload(tag, payload)?)),
            "sha256" => Ok(Data::Sha256(hash_payload(tag, payload)?)),
            "keccak256" => Ok(Data::Keccak256(hash_payload(tag, payload)?)),
            "shathree256" => Ok(Data::ShaThree256(hash_payload(tag, payload)?)),
            fixed if fixed.starts_with("raw") => {
                // Fixed-length variants: Raw0 ..= Raw32
                let expected: usize = fixed[3..]
                    .parse()
                    .map_err(|_| DecodeError::UnknownVariant(tag.to_string()))?;
                if expected > MAX_RAW_LEN {
                    return Err(DecodeError::UnknownVariant(tag.to_string()));
                }

                let bytes = payload_bytes(tag, payload)?;
                if bytes.len() != expected {
                    return Err(DecodeError::LengthMismatch {
                        variant: tag.to_string(),
                        expected,
                        actual: bytes.len(),
                    });
                }
                Ok(Data::Raw(bytes))
            }
            _ => Err(DecodeError::UnknownVariant(tag.to_string())),
        }
    }

    /// Text carried by the field
    ///
    /// `None` decodes to the empty string and raw bytes must be UTF-8. Hashed
    /// variants carry no preimage, so they have no text at all.
    pub fn to_text(&self) -> Result<Option<String>, DecodeError> {
        match self {
            Data::None => Ok(Some(String::new())),
            Data::Raw(bytes) => String::from_utf8(bytes.clone())
                .map(Some)
                .map_err(|_| DecodeError::InvalidUtf8),
            Data::BlakeTwo256(_) | Data::Sha256(_) | Data::Keccak256(_) | Data::ShaThree256(_) => {
                Ok(None)
            }
        }
    }
}

/// Decode a JSON field straight to non-empty text
pub fn decode_text(value: &Value) -> Result<Option<String>, DecodeError> {
    let text = Data::from_json(value)?.to_text()?;
    Ok(text.filter(|t| !t.is_empty()))
}

/// Bytes of a payload: `0x` hex, plain text, or a byte array
pub fn payload_bytes(tag: &str, payload: Option<&Value>) -> Result<Vec<u8>, DecodeError> {
    match payload {
        Some(Value::String(s)) => match s.strip_prefix("0x") {
            Some(hex_str) => {
                hex::decode(hex_str).map_err(|e| DecodeError::InvalidHex(e.to_string()))
            }
            None => Ok(s.as_bytes().to_vec()),
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| DecodeError::UnexpectedShape(format!("{} byte: {}", tag, item)))
            })
            .collect(),
        Some(other) => Err(DecodeError::UnexpectedShape(format!("{} payload: {}", tag, other))),
        None => Err(DecodeError::UnexpectedShape(format!("{} without payload", tag))),
    }
}

fn hash_payload(tag: &str, payload: Option<&Value>) -> Result<[u8; 32], DecodeError> {
    let bytes = payload_bytes(tag, payload)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| DecodeError::LengthMismatch {
        variant: tag.to_string(),
        expected: 32,
        actual,
    })
}
