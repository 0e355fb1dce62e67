//! Outbound command construction.
//!
//! Commands are Lua-like text assembled from literal fragments, quoted strings
//! and raw values. Quoted strings escape their own delimiter, backslashes and
//! ASCII control characters; nothing else is altered.

use crate::protocol::DataEntry;
use std::fmt::{Display, Write};

const SILENT_COMMAND: &str = "/silent-command ";
const SERVER_NAMESPACE: &str = "Server.";

/// Builds one outbound command string.
///
/// # Examples
///
/// ```
/// use factorio_controller::protocol::CommandBuilder;
///
/// let command = CommandBuilder::server_command("raise_callback")
///     .add_value(7)
///     .add(",")
///     .add_single_quoted("it's")
///     .build();
///
/// assert_eq!(command, r"/silent-command Server.raise_callback(7,'it\'s')");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    text: String,
    close_call: bool,
}

impl CommandBuilder {
    /// An empty builder; the command is sent exactly as built.
    pub fn raw() -> Self {
        Self::default()
    }

    /// A `/silent-command` wrapper; what follows is executed without echo.
    pub fn silent_command() -> Self {
        Self {
            text: SILENT_COMMAND.to_string(),
            close_call: false,
        }
    }

    /// A call into the scenario's `Server` interface. The call's closing
    /// parenthesis is appended by [`build`](Self::build).
    pub fn server_command(name: &str) -> Self {
        Self {
            text: format!("{}{}{}(", SILENT_COMMAND, SERVER_NAMESPACE, name),
            close_call: true,
        }
    }

    /// Append a literal fragment.
    pub fn add(mut self, fragment: &str) -> Self {
        self.text.push_str(fragment);
        self
    }

    /// Append a raw value such as a number or a serialized table.
    pub fn add_value(mut self, value: impl Display) -> Self {
        let _ = write!(self.text, "{}", value);
        self
    }

    /// Append a double-quoted string.
    pub fn add_quoted(mut self, value: &str) -> Self {
        push_quoted(&mut self.text, value, '"');
        self
    }

    /// Append a single-quoted string.
    pub fn add_single_quoted(mut self, value: &str) -> Self {
        push_quoted(&mut self.text, value, '\'');
        self
    }

    /// Remove one trailing occurrence of `separator`, if present.
    pub fn trim_trailing(mut self, separator: char) -> Self {
        if self.text.ends_with(separator) {
            self.text.pop();
        }
        self
    }

    pub fn build(mut self) -> String {
        if self.close_call {
            self.text.push(')');
        }
        self.text
    }
}

fn push_quoted(text: &mut String, value: &str, delimiter: char) {
    text.push(delimiter);
    for c in value.chars() {
        match c {
            c if c == delimiter => {
                text.push('\\');
                text.push(c);
            }
            '\\' => text.push_str("\\\\"),
            '\n' => text.push_str("\\n"),
            '\r' => text.push_str("\\r"),
            '\t' => text.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(text, "\\x{:02X}", c as u32);
            }
            c => text.push(c),
        }
    }
    text.push(delimiter);
}

/// `/ban` command; one trailing period of the reason is dropped because the
/// game appends its own.
pub fn ban(username: &str, reason: &str) -> String {
    let reason = reason.strip_suffix('.').unwrap_or(reason);
    CommandBuilder::raw()
        .add("/ban ")
        .add(username)
        .add(" ")
        .add(reason)
        .build()
}

/// `/unban` command
pub fn unban(username: &str) -> String {
    CommandBuilder::raw().add("/unban ").add(username).build()
}

/// Echo a ping payload back to its callback unchanged.
pub fn ping_callback(callback_id: &str, payload: &str) -> String {
    CommandBuilder::server_command("raise_callback")
        .add(callback_id)
        .add(",")
        .add(payload)
        .build()
}

/// Answer a `[DATA-GET]` request. A missing value leaves out the `value` field.
pub fn data_get_callback(
    callback_id: &str,
    data_set: &str,
    key: &str,
    value: Option<&str>,
) -> String {
    let mut builder = CommandBuilder::server_command("raise_callback")
        .add(callback_id)
        .add(",{data_set=")
        .add_single_quoted(data_set)
        .add(",key=")
        .add_single_quoted(key);

    if let Some(value) = value {
        builder = builder.add(",value=").add(value);
    }

    builder.add("}").build()
}

/// Answer a `[DATA-GET-ALL]` request with every entry of a data set.
///
/// Zero entries render as `entries={}`; otherwise the `[key]=value` pairs are
/// comma-joined with no trailing separator.
pub fn data_get_all_callback(
    callback_id: &str,
    data_set: &str,
    entries: &[(String, String)],
) -> String {
    let mut builder = CommandBuilder::server_command("raise_callback")
        .add(callback_id)
        .add(",{data_set=")
        .add_single_quoted(data_set)
        .add(",entries={");

    for (key, value) in entries {
        builder = builder
            .add("[")
            .add_single_quoted(key)
            .add("]=")
            .add(value)
            .add(",");
    }

    builder.trim_trailing(',').add("}}").build()
}

/// Push a changed entry to a server tracking its data set.
pub fn data_set(entry: &DataEntry) -> String {
    let mut builder = CommandBuilder::server_command("raise_data_set")
        .add("{data_set=")
        .add_single_quoted(&entry.data_set)
        .add(",key=")
        .add_single_quoted(&entry.key);

    if let Some(value) = &entry.value {
        builder = builder.add(",value=").add(value);
    }

    builder.add("}").build()
}

/// Ask the scenario to report every online player.
pub fn query_online_players() -> String {
    CommandBuilder::server_command("query_online_players").build()
}

/// Ask the scenario to report the data sets it tracks.
pub fn get_tracked_data_sets() -> String {
    CommandBuilder::server_command("get_tracked_data_sets").build()
}
