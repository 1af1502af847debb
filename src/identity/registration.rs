/// Decoding of `IdentityOf` registration values into domain identities
use crate::identity::{
    data::{decode_text, payload_bytes, DecodeError},
    IdentityFields, Judgement, PolkadotIdentity, RegistrarJudgement,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Split a stored value into the registration and an optional username
///
/// Newer runtimes store `(Registration, Option<Username>)`.
fn split_registration(raw: &Value) -> Result<(&Map<String, Value>, Option<&Value>), DecodeError> {
    match raw {
        Value::Object(registration) => Ok((registration, None)),
        Value::Array(parts) if parts.len() == 2 => match &parts[0] {
            Value::Object(registration) => Ok((registration, Some(&parts[1]))),
            other => Err(DecodeError::UnexpectedShape(format!(
                "registration tuple head: {}",
                other
            ))),
        },
        other => Err(DecodeError::UnexpectedShape(format!("registration: {}", other))),
    }
}

fn info_of(registration: &Map<String, Value>) -> Result<&Map<String, Value>, DecodeError> {
    registration
        .get("info")
        .and_then(Value::as_object)
        .ok_or_else(|| DecodeError::UnexpectedShape("registration without info".to_string()))
}

/// Display name of a stored registration
pub fn display_name_of(raw: &Value) -> Result<Option<String>, DecodeError> {
    let (registration, _) = split_registration(raw)?;
    let info = info_of(registration)?;

    match info.get("display") {
        Some(display) => decode_text(display),
        None => Ok(None),
    }
}

/// Decode a stored registration into a `PolkadotIdentity`
pub fn decode_registration(address: &str, raw: &Value) -> Result<PolkadotIdentity, DecodeError> {
    let (registration, username) = split_registration(raw)?;
    let info = info_of(registration)?;

    let display_name = match info.get("display") {
        Some(display) => decode_text(display)?,
        None => None,
    };

    let judgements = match registration.get("judgements") {
        Some(Value::Array(items)) => items
            .iter()
            .map(decode_registrar_judgement)
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(DecodeError::UnexpectedShape(format!("judgements: {}", other)));
        }
    };

    let fields = IdentityFields {
        legal: optional_text(info, "legal"),
        web: optional_text(info, "web"),
        email: optional_text(info, "email"),
        twitter: optional_text(info, "twitter"),
        matrix: optional_text(info, "matrix").or_else(|| optional_text(info, "riot")),
        github: optional_text(info, "github"),
        discord: optional_text(info, "discord"),
        image: optional_text(info, "image"),
    };

    let username = username.and_then(decode_username);
    let verified = judgements.iter().any(|j| j.judgement.is_positive());

    Ok(PolkadotIdentity {
        address: address.to_string(),
        display_name,
        judgements,
        verified,
        fields,
        username,
    })
}

/// Secondary info fields never fail a resolution
fn optional_text(info: &Map<String, Value>, field: &str) -> Option<String> {
    let value = info.get(field)?;
    match decode_text(value) {
        Ok(text) => text,
        Err(e) => {
            debug!("Ignoring undecodable identity field {}: {}", field, e);
            None
        }
    }
}

fn decode_username(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let bytes = payload_bytes("username", Some(value)).ok()?;
    String::from_utf8(bytes).ok().filter(|u| !u.is_empty())
}

fn decode_registrar_judgement(value: &Value) -> Result<RegistrarJudgement, DecodeError> {
    let (registrar, judgement) = match value {
        Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
        Value::Object(fields) => match (fields.get("registrar"), fields.get("judgement")) {
            (Some(registrar), Some(judgement)) => (registrar, judgement),
            _ => return Err(DecodeError::UnexpectedShape(format!("judgement: {}", value))),
        },
        other => return Err(DecodeError::UnexpectedShape(format!("judgement: {}", other))),
    };

    let registrar = match registrar {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| DecodeError::UnexpectedShape(format!("registrar index: {}", registrar)))?;

    Ok(RegistrarJudgement {
        registrar,
        judgement: decode_judgement(judgement)?,
    })
}

fn decode_judgement(value: &Value) -> Result<Judgement, DecodeError> {
    let (tag, payload) = match value {
        Value::String(tag) => (tag.as_str(), None),
        Value::Object(fields) => match fields.get("type").and_then(Value::as_str) {
            Some(tag) => (tag, fields.get("value")),
            None => {
                let mut iter = fields.iter();
                match (iter.next(), iter.next()) {
                    (Some((tag, payload)), None) => (tag.as_str(), Some(payload)),
                    _ => return Err(DecodeError::UnexpectedShape(format!("judgement: {}", value))),
                }
            }
        },
        other => return Err(DecodeError::UnexpectedShape(format!("judgement: {}", other))),
    };

    match tag.to_ascii_lowercase().as_str() {
        "unknown" => Ok(Judgement::Unknown),
        "feepaid" => Ok(Judgement::FeePaid(decode_balance(payload)?)),
        "reasonable" => Ok(Judgement::Reasonable),
        "knowngood" => Ok(Judgement::KnownGood),
        "outofdate" => Ok(Judgement::OutOfDate),
        "lowquality" => Ok(Judgement::LowQuality),
        "erroneous" => Ok(Judgement::Erroneous),
        _ => Err(DecodeError::UnknownVariant(tag.to_string())),
    }
}

/// Balances arrive as JSON numbers, decimal strings, or `0x` hex
fn decode_balance(payload: Option<&Value>) -> Result<u128, DecodeError> {
    let parsed = match payload {
        Some(Value::Number(n)) => n.as_u64().map(u128::from),
        Some(Value::String(s)) => match s.strip_prefix("0x") {
            Some(hex_str) => u128::from_str_radix(hex_str, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    };

    parsed.ok_or_else(|| {
        let payload = payload.cloned().unwrap_or(Value::Null);
        DecodeError::UnexpectedShape(format!("balance: {}", payload))
    })
}
