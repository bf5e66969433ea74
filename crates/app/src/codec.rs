//! Command codec — text protocol exchanged with the peripheral.
//!
//! Pure functions, no IO. Outbound frames are ASCII
//! `c,<code>,<band tag>,<protocol>,<repeat>`. Inbound notifications come in
//! two shapes because the firmware has shipped both:
//!
//! | Shape | Example |
//! |-------|---------|
//! | Compact | `21654,1,2` (`<raw>,<band tag>,<protocol>`) |
//! | Structured | `{"raw":"21654","Freq":315,"Protocol":2}` |
//!
//! The payload is classified into a [`Payload`] first, then parsed by the
//! matching parser; there is no try-one-then-the-other fallback.

use serde::Deserialize;

use rfremote_domain::band::FrequencyBand;
use rfremote_domain::error::{DecodeError, EncodingError};
use rfremote_domain::rf_command::RfCommand;
use rfremote_domain::sniffed_code::SniffedCode;

/// Leading field of every transmit frame.
const COMMAND_PREFIX: &str = "c";

/// Encode a transmit command into its wire payload.
///
/// Transport framing (base64 for some stacks, MTU chunking, ...) is the
/// gateway's business, not the codec's.
///
/// # Errors
///
/// Returns [`EncodingError`] when the command fails validation.
pub fn encode_command(cmd: &RfCommand) -> Result<Vec<u8>, EncodingError> {
    cmd.validate()?;
    let frame = format!(
        "{COMMAND_PREFIX},{},{},{},{}",
        cmd.code(),
        cmd.band().tag(),
        cmd.protocol(),
        cmd.repeat()
    );
    Ok(frame.into_bytes())
}

/// A notification payload, classified by shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// `<raw>,<band tag>,<protocol>`
    Compact(&'a str),
    /// Bracket-delimited key/value record.
    Structured(&'a str),
}

impl<'a> Payload<'a> {
    /// Classify a raw notification.
    ///
    /// Trailing NULs and surrounding whitespace are stripped, since some
    /// firmware builds pad the characteristic value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotUtf8`] or [`DecodeError::Empty`].
    pub fn classify(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if text.is_empty() {
            return Err(DecodeError::Empty);
        }
        if text.starts_with('{') {
            Ok(Self::Structured(text))
        } else {
            Ok(Self::Compact(text))
        }
    }
}

/// Decode an inbound notification into a [`SniffedCode`].
///
/// # Errors
///
/// Returns [`DecodeError`] for partial or garbled frames: empty `raw`,
/// missing or zero frequency, missing or zero protocol.
pub fn decode_notification(bytes: &[u8]) -> Result<SniffedCode, DecodeError> {
    match Payload::classify(bytes)? {
        Payload::Compact(text) => decode_compact(text),
        Payload::Structured(text) => decode_structured(text),
    }
}

fn decode_compact(text: &str) -> Result<SniffedCode, DecodeError> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    let [raw, tag, protocol] = fields.as_slice() else {
        return Err(DecodeError::FieldCount(fields.len()));
    };

    if raw.is_empty() {
        return Err(DecodeError::EmptyRaw);
    }
    if tag.is_empty() || *tag == "0" {
        return Err(DecodeError::MissingFrequency);
    }
    // Garbled tags fail open to the common band.
    let band = tag
        .parse::<u8>()
        .map_or(FrequencyBand::High, FrequencyBand::from_tag);
    let protocol = parse_protocol(protocol)?;

    Ok(SniffedCode::new(*raw, band, protocol))
}

fn parse_protocol(field: &str) -> Result<u8, DecodeError> {
    if field.is_empty() {
        return Err(DecodeError::MissingProtocol);
    }
    match field.parse::<u8>() {
        Ok(0) => Err(DecodeError::MissingProtocol),
        Ok(protocol) => Ok(protocol),
        Err(_) => Err(DecodeError::InvalidProtocol(field.to_string())),
    }
}

/// Structured record as sent by the JSON-speaking firmware.
#[derive(Debug, Deserialize)]
struct StructuredRecord {
    raw: Option<RawField>,
    #[serde(rename = "Freq")]
    freq: Option<u32>,
    #[serde(rename = "Protocol")]
    protocol: Option<u32>,
}

/// `raw` has been observed both as a string and as a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawField {
    Text(String),
    Number(u64),
}

impl RawField {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(n) => n.to_string(),
        }
    }
}

fn decode_structured(text: &str) -> Result<SniffedCode, DecodeError> {
    let record: StructuredRecord =
        serde_json::from_str(text).map_err(|err| DecodeError::Structured(err.to_string()))?;

    let raw = record
        .raw
        .map(RawField::into_string)
        .filter(|raw| !raw.trim().is_empty())
        .ok_or(DecodeError::EmptyRaw)?;
    let freq = record
        .freq
        .filter(|f| *f != 0)
        .ok_or(DecodeError::MissingFrequency)?;
    let protocol = record
        .protocol
        .filter(|p| *p != 0)
        .ok_or(DecodeError::MissingProtocol)?;
    let protocol =
        u8::try_from(protocol).map_err(|_| DecodeError::InvalidProtocol(protocol.to_string()))?;

    Ok(SniffedCode::new(
        raw.trim(),
        FrequencyBand::from_mhz(freq),
        protocol,
    ))
}
