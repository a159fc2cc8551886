//! Command text parsing.
//!
//! `/verb@botname type argument...` is split into a lowercased verb, a
//! lowercased first word (the command type) and the untouched remainder.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: String,
    /// Everything after the verb, trimmed. `None` when empty.
    pub rest: Option<String>,
}

impl ParsedCommand {
    /// First word after the verb, lowercased.
    pub fn command_type(&self) -> Option<String> {
        let rest = self.rest.as_deref()?;
        rest.split_whitespace().next().map(|w| w.to_lowercase())
    }

    /// Remainder after the command type, trimmed. `None` when empty.
    pub fn argument(&self) -> Option<&str> {
        let rest = self.rest.as_deref()?;
        let (_, arg) = rest.split_once(char::is_whitespace)?;
        let arg = arg.trim();
        if arg.is_empty() {
            None
        } else {
            Some(arg)
        }
    }

    /// `yes` / `y` as the whole remainder, any case.
    pub fn is_confirmation(&self) -> bool {
        self.rest.as_deref().is_some_and(is_confirmation)
    }
}

/// Parse `text` as a command if it starts with one of `prefixes`.
///
/// Telegram may send `/cmd@botname arg1 ...`; the `@botname` part is dropped.
pub fn parse_command(text: &str, prefixes: &[String]) -> Option<ParsedCommand> {
    let text = text.trim();
    let body = prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| text.strip_prefix(p.as_str()))?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let verb = first.split('@').next().unwrap_or("").to_lowercase();
    if verb.is_empty() {
        return None;
    }

    let rest = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(ParsedCommand { verb, rest })
}

pub fn is_confirmation(text: &str) -> bool {
    static CONFIRM: OnceLock<Regex> = OnceLock::new();
    CONFIRM
        .get_or_init(|| Regex::new(r"(?i)^(?:yes|y)$").expect("valid regex"))
        .is_match(text.trim())
}
