/// Tagged line protocol spoken by the server scenario.
///
/// Inbound, each line of process output is decoded by [`decode_line`] into a
/// [`ProtocolEvent`] (a [`TagKind`] plus payload) or recognised as plain
/// output. Outbound, [`CommandBuilder`] and the helpers in [`command`] render
/// typed requests as console command text.
///
/// # Examples
///
/// ```
/// use factorio_controller::protocol::{decode_line, DecodedLine, TagKind};
///
/// match decode_line("2019-05-04 10:11:12 [CHAT] bob: hi") {
///     DecodedLine::Tagged(event) => {
///         assert_eq!(event.tag, TagKind::Chat);
///         assert_eq!(event.payload, "bob: hi");
///     }
///     DecodedLine::Untagged { .. } => unreachable!(),
/// }
/// ```
mod ban_line;
pub mod command;
mod decode;
mod tag;

pub use ban_line::{BanLine, UnbanLine, parse_ban_line, parse_unban_line};
pub use command::CommandBuilder;
pub use decode::{
    DataGetAllRequest, DataGetRequest, DecodedLine, OutputSignal, ProtocolEvent, TAG_WINDOW,
    decode_line, parse_json, player_name, split_callback, split_named,
};
pub use tag::TagKind;

use serde::{Deserialize, Serialize};

/// One key of a scenario data set.
///
/// `value` is a serialized Lua value sent to servers verbatim; `None` removes
/// the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub data_set: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}
