//! Response parsing.
//!
//! Inbound lines look like
//!
//! ```text
//! <CommandType> <ChannelId...> <Block> <Parameter> [<Value...>]
//! EP MIC 103 LEVEL MUTE 0
//! EP MIC101 LEVEL GAIN -10.50
//! EP UA 101 NOTIFICATION STATE_CHANGE PL 1;DIALTONE
//! BOX CONVERGE1 UNIT SN 2150-0123
//! ```
//!
//! The channel identifier is one token (`MIC101`) or an endpoint type followed by
//! a number (`MIC 103`, `UA 101`). Everything after the parameter name is the
//! value, which for call notifications is a `;`-separated list of sub-tokens.

use crate::tokenizer::{tokenize, unquote};
use dsp_core::error::{DspError, DspResult};

/// One received line, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A line beginning with `Error`; logged only
    Error(String),
    Message(ResponseLine),
}

/// The fields of a structured response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub command_type: String,
    pub channel: String,
    pub block: String,
    pub parameter: String,
    /// Raw value text; empty for value-less acknowledgements
    pub value: String,
}

impl ResponseLine {
    /// The value split on `;`, honouring quotes.
    pub fn sub_tokens(&self) -> Vec<String> {
        tokenize(&self.value, ';')
    }

    /// The value as a decimal number, parsed independently of locale.
    pub fn decimal(&self) -> DspResult<f64> {
        parse_decimal(&self.parameter, &self.value)
    }

    /// The value with one pair of surrounding quotes removed.
    pub fn unquoted_value(&self) -> &str {
        unquote(&self.value)
    }
}

/// Parse a decimal field. `field` only labels the error.
pub fn parse_decimal(field: &str, value: &str) -> DspResult<f64> {
    let text = unquote(value);
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DspError::invalid_number(field, value)),
    }
}

/// Parse one framed line.
pub fn parse_line(line: &str) -> DspResult<Response> {
    let tokens = tokenize(line, ' ');

    let first = tokens
        .first()
        .ok_or_else(|| DspError::malformed(line, "empty line"))?;
    if first
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("error"))
    {
        return Ok(Response::Error(line.trim().to_string()));
    }

    let channel_width = if tokens.len() >= 5 && is_endpoint_pair(&tokens[1], &tokens[2]) {
        2
    } else {
        1
    };

    // command type + channel + block + parameter
    let min_len = 1 + channel_width + 2;
    if tokens.len() < min_len {
        return Err(DspError::malformed(
            line,
            format!("expected at least {} fields, got {}", min_len, tokens.len()),
        ));
    }

    let block_idx = 1 + channel_width;
    Ok(Response::Message(ResponseLine {
        command_type: tokens[0].clone(),
        channel: tokens[1..block_idx].join(" "),
        block: tokens[block_idx].clone(),
        parameter: tokens[block_idx + 1].clone(),
        value: tokens[block_idx + 2..].join(" "),
    }))
}

/// `MIC 103`, `UA 101`, `PROC 201`: an alphabetic type followed by a number.
fn is_endpoint_pair(kind: &str, number: &str) -> bool {
    !kind.is_empty()
        && kind.chars().all(|c| c.is_ascii_alphabetic())
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}
