use std::fmt;

/// Closed set of tags the server scenario prints in front of protocol lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Chat,
    Shout,
    Discord,
    DiscordRaw,
    DiscordBold,
    DiscordAdmin,
    DiscordAdminRaw,
    DiscordEmbed,
    DiscordEmbedRaw,
    DiscordAdminEmbed,
    DiscordAdminEmbedRaw,
    DiscordNamed,
    DiscordNamedRaw,
    DiscordNamedBold,
    DiscordNamedEmbed,
    DiscordNamedEmbedRaw,
    PlayerJoin,
    PlayerLeave,
    QueryPlayers,
    Ban,
    Unban,
    StartScenario,
    Ping,
    DataGet,
    DataGetAll,
    DataSet,
    DataTracked,
}

const TAGS: [(TagKind, &str); 27] = [
    (TagKind::Chat, "[CHAT]"),
    (TagKind::Shout, "[SHOUT]"),
    (TagKind::Discord, "[DISCORD]"),
    (TagKind::DiscordRaw, "[DISCORD-RAW]"),
    (TagKind::DiscordBold, "[DISCORD-BOLD]"),
    (TagKind::DiscordAdmin, "[DISCORD-ADMIN]"),
    (TagKind::DiscordAdminRaw, "[DISCORD-ADMIN-RAW]"),
    (TagKind::DiscordEmbed, "[DISCORD-EMBED]"),
    (TagKind::DiscordEmbedRaw, "[DISCORD-EMBED-RAW]"),
    (TagKind::DiscordAdminEmbed, "[DISCORD-ADMIN-EMBED]"),
    (TagKind::DiscordAdminEmbedRaw, "[DISCORD-ADMIN-EMBED-RAW]"),
    (TagKind::DiscordNamed, "[DISCORD-NAMED]"),
    (TagKind::DiscordNamedRaw, "[DISCORD-NAMED-RAW]"),
    (TagKind::DiscordNamedBold, "[DISCORD-NAMED-BOLD]"),
    (TagKind::DiscordNamedEmbed, "[DISCORD-NAMED-EMBED]"),
    (TagKind::DiscordNamedEmbedRaw, "[DISCORD-NAMED-EMBED-RAW]"),
    (TagKind::PlayerJoin, "[PLAYER-JOIN]"),
    (TagKind::PlayerLeave, "[PLAYER-LEAVE]"),
    (TagKind::QueryPlayers, "[QUERY-PLAYERS]"),
    (TagKind::Ban, "[BAN]"),
    (TagKind::Unban, "[UNBAN]"),
    (TagKind::StartScenario, "[START-SCENARIO]"),
    (TagKind::Ping, "[PING]"),
    (TagKind::DataGet, "[DATA-GET]"),
    (TagKind::DataGetAll, "[DATA-GET-ALL]"),
    (TagKind::DataSet, "[DATA-SET]"),
    (TagKind::DataTracked, "[DATA-TRACKED]"),
];

impl TagKind {
    /// Look up a tag by its bracketed text, e.g. `"[CHAT]"`.
    pub fn from_tag(tag: &str) -> Option<TagKind> {
        TAGS.iter()
            .find(|(_, text)| *text == tag)
            .map(|(kind, _)| *kind)
    }

    /// The bracketed text of this tag.
    pub fn as_str(self) -> &'static str {
        TAGS.iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, text)| *text)
            .unwrap_or("[UNKNOWN]")
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
