use crate::error::{Error, Result};

/// A `[BAN]` line: `<user> was banned by <admin>. Reason: <reason>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanLine {
    pub username: String,
    pub admin: String,
    /// Reason as printed, trailing period included
    pub reason: String,
}

/// An `[UNBAN]` line: `<user> was unbanned by <admin>.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbanLine {
    pub username: String,
    pub admin: String,
}

pub fn parse_ban_line(text: &str) -> Result<BanLine> {
    let (username, rest) = text
        .split_once(" was banned by ")
        .ok_or_else(|| Error::Protocol(format!("Unrecognised ban line '{}'", text)))?;

    let (admin, reason) = match rest.split_once(". Reason: ") {
        Some((admin, reason)) => (admin, reason.trim()),
        None => (rest.trim().strip_suffix('.').unwrap_or(rest.trim()), ""),
    };

    let username = username.trim();
    if username.is_empty() || admin.is_empty() {
        return Err(Error::Protocol(format!("Unrecognised ban line '{}'", text)));
    }

    Ok(BanLine {
        username: username.to_string(),
        admin: admin.to_string(),
        reason: reason.to_string(),
    })
}

pub fn parse_unban_line(text: &str) -> Result<UnbanLine> {
    let (username, rest) = text
        .split_once(" was unbanned by ")
        .ok_or_else(|| Error::Protocol(format!("Unrecognised unban line '{}'", text)))?;

    let rest = rest.trim();
    let admin = rest.strip_suffix('.').unwrap_or(rest);
    let username = username.trim();
    if username.is_empty() || admin.is_empty() {
        return Err(Error::Protocol(format!("Unrecognised unban line '{}'", text)));
    }

    Ok(UnbanLine {
        username: username.to_string(),
        admin: admin.to_string(),
    })
}
