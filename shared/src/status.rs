//! Decoding of the status string carried in an unconnected pong.
//!
//! The server advertises itself as a single `;`-separated line such as
//! `MCPE;My Server;422;1.21.0;3;10;13253860892328930865;Bedrock level;Survival;1;19132;19133;`.
//! A backslash escapes the next character, so `\;` keeps a semicolon inside a field.

use crate::DEFAULT_PORT;
use thiserror::Error;

/// Fewer fields than this means the response omitted the trailing port fields.
pub const MIN_STATUS_FIELDS: usize = 11;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("missing {field}")]
    MissingField { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub edition: String,
    pub motd: String,
    pub protocol_id: i32,
    pub protocol_version: String,
    pub player_count: i32,
    pub max_player_count: i32,
    pub server_id: String,
    pub game_mode: String,
    pub game_mode_id: i32,
    pub ipv4_port: i32,
    pub ipv6_port: i32,
}

/// Splits a status string into its fields, honouring backslash escapes.
pub fn split_fields(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ';' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    fields.push(current);
    fields
}

/// Escapes a single field so that `split_fields` yields it back unchanged.
#[cfg(test)]
fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == ';' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl StatusRecord {
    /// Decodes a raw pong payload.
    ///
    /// Protocol id, player counts and both ports must be numeric; the game mode id
    /// falls back to 0. When fewer than [`MIN_STATUS_FIELDS`] fields are present two
    /// default ports are appended before the positional mapping, without checking
    /// which fields were actually missing.
    pub fn parse(raw: &[u8]) -> Result<Self, DecodeError> {
        let fields = padded_fields(&String::from_utf8_lossy(raw));

        let text_at = |index: usize| fields.get(index).cloned().unwrap_or_default();

        Ok(StatusRecord {
            edition: text_at(0),
            motd: text_at(1),
            protocol_id: required(&fields, 2, "protocol id")?,
            protocol_version: text_at(3),
            player_count: required(&fields, 4, "player count")?,
            max_player_count: required(&fields, 5, "max player count")?,
            server_id: text_at(6),
            game_mode: text_at(8),
            game_mode_id: fields
                .get(9)
                .and_then(|value| value.parse().ok())
                .unwrap_or(0),
            ipv4_port: required(&fields, 10, "ipv4 port")?,
            ipv6_port: match fields.get(11) {
                Some(value) => numeric(value, "ipv6 port")?,
                None => i32::from(DEFAULT_PORT),
            },
        })
    }
}

/// Splits the status string and appends two default ports when it is short.
fn padded_fields(text: &str) -> Vec<String> {
    let mut fields = split_fields(text);
    if fields.len() < MIN_STATUS_FIELDS {
        fields.push(DEFAULT_PORT.to_string());
        fields.push(DEFAULT_PORT.to_string());
    }
    fields
}

fn required(fields: &[String], index: usize, field: &'static str) -> Result<i32, DecodeError> {
    let value = fields.get(index).ok_or(DecodeError::MissingField { field })?;
    numeric(value, field)
}

fn numeric(value: &str, field: &'static str) -> Result<i32, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}
