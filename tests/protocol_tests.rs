use factorio_controller::error::Error;
use factorio_controller::protocol::{
    DataEntry, DecodedLine, OutputSignal, TAG_WINDOW, TagKind, command, decode_line, parse_json,
    split_callback, split_named,
};

fn tagged(line: &str) -> (TagKind, String) {
    match decode_line(line) {
        DecodedLine::Tagged(event) => (event.tag, event.payload),
        other => panic!("expected a tagged line, got {other:?}"),
    }
}

#[test]
fn test_tag_at_window_edge_is_decoded() {
    let line = format!("{}[PLAYER-JOIN] bob", "x".repeat(TAG_WINDOW));
    assert_eq!(tagged(&line), (TagKind::PlayerJoin, "bob".to_string()));
}

#[test]
fn test_tag_past_window_is_untagged() {
    let line = format!("{}[PLAYER-JOIN] bob", "x".repeat(TAG_WINDOW + 1));
    assert_eq!(decode_line(&line), DecodedLine::Untagged { signal: None });
}

#[test]
fn test_window_counts_characters_not_bytes() {
    let line = format!("{}[CHAT] hi", "é".repeat(TAG_WINDOW));
    assert_eq!(tagged(&line), (TagKind::Chat, "hi".to_string()));
}

#[test]
fn test_unknown_tag_is_plain_output() {
    assert_eq!(
        decode_line("[NOT-A-TAG] hello"),
        DecodedLine::Untagged { signal: None }
    );
}

#[test]
fn test_game_log_signals() {
    assert_eq!(
        decode_line("  61.482 Info AppManagerStates.cpp:1802: Saving finished"),
        DecodedLine::Untagged {
            signal: Some(OutputSignal::SaveFinished)
        }
    );
    assert_eq!(
        decode_line("1234.002 Info ServerMultiplayerManager.cpp:808: bob DesyncedWaitingForMap"),
        DecodedLine::Untagged {
            signal: Some(OutputSignal::Desync)
        }
    );
    // Without the uptime prefix the line is someone's chat, not a game log.
    assert_eq!(
        decode_line("bob: Saving finished"),
        DecodedLine::Untagged { signal: None }
    );
}

#[test]
fn test_every_tag_round_trips_through_its_text() {
    for tag in [
        TagKind::Chat,
        TagKind::DiscordAdminEmbedRaw,
        TagKind::DiscordNamedEmbedRaw,
        TagKind::QueryPlayers,
        TagKind::DataGetAll,
        TagKind::DataTracked,
    ] {
        assert_eq!(TagKind::from_tag(tag.as_str()), Some(tag));
        let (decoded, payload) = tagged(&format!("{} payload", tag));
        assert_eq!(decoded, tag);
        assert_eq!(payload, "payload");
    }
}

#[test]
fn test_callback_payloads() {
    assert_eq!(split_callback("12 {\"a\":1}").unwrap(), ("12", "{\"a\":1}"));
    assert_eq!(split_callback("5").unwrap(), ("5", ""));
    assert!(matches!(split_callback("{\"a\":1}"), Err(Error::Protocol(_))));
    assert!(matches!(split_callback(""), Err(Error::Protocol(_))));
}

#[test]
fn test_named_payloads() {
    assert_eq!(split_named("events Rocket launched").unwrap(), ("events", "Rocket launched"));
    assert!(split_named("lonely").is_err());
}

#[test]
fn test_malformed_json_is_protocol_error() {
    let result: Result<Vec<String>, _> = parse_json(TagKind::QueryPlayers, "[\"bob\",");
    assert!(matches!(result, Err(Error::Protocol(message)) if message.contains("[QUERY-PLAYERS]")));
}

#[test]
fn test_get_all_with_no_entries() {
    let command = command::data_get_all_callback("9", "tokens", &[]);
    assert_eq!(
        command,
        "/silent-command Server.raise_callback(9,{data_set='tokens',entries={}})"
    );
}

#[test]
fn test_get_all_with_one_entry() {
    let entries = vec![("bob".to_string(), "1".to_string())];
    let command = command::data_get_all_callback("9", "tokens", &entries);
    assert_eq!(
        command,
        "/silent-command Server.raise_callback(9,{data_set='tokens',entries={['bob']=1}})"
    );
}

#[test]
fn test_get_all_with_many_entries() {
    let entries = vec![
        ("alice".to_string(), "2".to_string()),
        ("bob".to_string(), "1".to_string()),
        ("it's".to_string(), "{x=1}".to_string()),
    ];
    let command = command::data_get_all_callback("9", "tokens", &entries);
    assert_eq!(
        command,
        r"/silent-command Server.raise_callback(9,{data_set='tokens',entries={['alice']=2,['bob']=1,['it\'s']={x=1}}})"
    );
    assert!(!command.contains(",}"));
}

#[test]
fn test_ban_reason_loses_one_period() {
    assert_eq!(command::ban("alice", "spam."), "/ban alice spam");
    assert_eq!(command::ban("alice", "spam"), "/ban alice spam");
    assert_eq!(command::ban("alice", "spam.."), "/ban alice spam.");
}

#[test]
fn test_data_get_without_value() {
    assert_eq!(
        command::data_get_callback("3", "tokens", "carol", None),
        "/silent-command Server.raise_callback(3,{data_set='tokens',key='carol'})"
    );
}

#[test]
fn test_data_set_removal() {
    let entry = DataEntry {
        data_set: "tokens".to_string(),
        key: "bob".to_string(),
        value: None,
    };
    assert_eq!(
        command::data_set(&entry),
        "/silent-command Server.raise_data_set({data_set='tokens',key='bob'})"
    );
}
