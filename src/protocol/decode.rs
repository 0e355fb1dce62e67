use crate::error::{Error, Result};
use crate::protocol::TagKind;
use serde::Deserialize;

/// A tag must start at or before this character index to count.
pub const TAG_WINDOW: usize = 20;

/// Suffix of the game's log line written after a save completes.
const SAVE_FINISHED_SUFFIX: &str = "Saving finished";
/// Substring of the game's log line written when a client desyncs.
const DESYNC_MARKER: &str = "DesyncedWaitingForMap";

/// A tagged protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolEvent {
    pub tag: TagKind,
    pub payload: String,
}

/// Side signal carried by an untagged log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    SaveFinished,
    Desync,
}

/// Result of decoding one line of process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    Tagged(ProtocolEvent),
    Untagged { signal: Option<OutputSignal> },
}

/// Decode one line of process output.
///
/// The first `[TAG]` in the line is used if it starts within
/// [`TAG_WINDOW`] characters and names a known tag; everything after it,
/// trimmed, is the payload. Any other line is plain output, checked for the
/// save-finished and desync signals.
pub fn decode_line(line: &str) -> DecodedLine {
    if let Some((position, tag, rest)) = find_tag(line) {
        if position <= TAG_WINDOW {
            if let Some(kind) = TagKind::from_tag(tag) {
                return DecodedLine::Tagged(ProtocolEvent {
                    tag: kind,
                    payload: rest.trim().to_string(),
                });
            }
        }
    }

    DecodedLine::Untagged {
        signal: output_signal(line),
    }
}

/// Find the first `[...]` with non-empty content and no nested brackets.
///
/// Returns the character index of the opening bracket, the tag including its
/// brackets, and the text after the closing bracket.
fn find_tag(line: &str) -> Option<(usize, &str, &str)> {
    let mut open: Option<(usize, usize)> = None;

    for (char_index, (byte_index, c)) in line.char_indices().enumerate() {
        match c {
            '[' => open = Some((char_index, byte_index)),
            ']' => {
                if let Some((start_char, start_byte)) = open.take() {
                    if byte_index > start_byte + 1 {
                        return Some((
                            start_char,
                            &line[start_byte..=byte_index],
                            &line[byte_index + 1..],
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    None
}

fn output_signal(line: &str) -> Option<OutputSignal> {
    let message = strip_uptime(line.trim_start())?.trim_end();

    if message.ends_with(SAVE_FINISHED_SUFFIX) {
        Some(OutputSignal::SaveFinished)
    } else if message.contains(DESYNC_MARKER) {
        Some(OutputSignal::Desync)
    } else {
        None
    }
}

/// Strip a leading `<seconds>.<fraction> ` uptime prefix.
fn strip_uptime(line: &str) -> Option<&str> {
    let (uptime, rest) = line.split_once(' ')?;
    let (whole, fraction) = uptime.split_once('.')?;
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    (is_number(whole) && is_number(fraction)).then_some(rest)
}

/// Split a `<callbackId> <payload>` pair.
///
/// The callback id must be a non-empty run of digits since it is echoed
/// verbatim into a command.
pub fn split_callback(payload: &str) -> Result<(&str, &str)> {
    let (id, rest) = match payload.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim()),
        None => (payload, ""),
    };

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!(
            "Missing callback id in payload '{}'",
            payload
        )));
    }

    Ok((id, rest))
}

/// Name from a `name[ reason]` payload.
pub fn player_name(payload: &str) -> Result<&str> {
    payload
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::Protocol("Missing player name".to_string()))
}

/// Split a `<channel> <text>` payload of the named notification tags.
pub fn split_named(payload: &str) -> Result<(&str, &str)> {
    match payload.split_once(char::is_whitespace) {
        Some((channel, text)) if !channel.is_empty() => Ok((channel, text.trim_start())),
        _ => Err(Error::Protocol(format!(
            "Missing channel name in payload '{}'",
            payload
        ))),
    }
}

/// Deserialize a JSON payload, mapping failures to [`Error::Protocol`].
pub fn parse_json<'a, T: Deserialize<'a>>(tag: TagKind, payload: &'a str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| Error::Protocol(format!("Malformed {} payload: {}", tag, e)))
}

/// Body of a `[DATA-GET]` request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataGetRequest {
    pub data_set: String,
    pub key: String,
}

/// Body of a `[DATA-GET-ALL]` request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataGetAllRequest {
    pub data_set: String,
}
