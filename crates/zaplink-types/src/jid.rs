//! Jid parsing helpers.
//!
//! A jid is the chat network's opaque remote-party identifier. Individual
//! jids look like `<digits>@s.whatsapp.net`; group jids end in `@g.us`.

/// Suffix of an individual (direct-chat) jid.
pub const USER_JID_SUFFIX: &str = "@s.whatsapp.net";

/// Suffix of a group jid.
pub const GROUP_JID_SUFFIX: &str = "@g.us";

/// Extract the phone number portion of a jid.
///
/// Returns `None` for empty input; otherwise everything before the first
/// `@` (for group jids this is the group id, not a dialable number).
pub fn phone_number_from_jid(jid: &str) -> Option<String> {
    if jid.is_empty() {
        return None;
    }
    Some(jid.split('@').next().unwrap_or(jid).to_string())
}

/// Build an individual jid from a phone number, stripping any formatting.
pub fn jid_from_phone_number(phone_number: &str) -> String {
    let digits: String = phone_number.chars().filter(char::is_ascii_digit).collect();
    format!("{digits}{USER_JID_SUFFIX}")
}

/// Whether a jid addresses a group conversation.
pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(GROUP_JID_SUFFIX)
}
