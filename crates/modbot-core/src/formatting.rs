//! Telegram HTML helpers for report texts.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn code(text: impl AsRef<str>) -> String {
    format!("<code>{}</code>", escape_html(text.as_ref()))
}

pub fn bold(text: impl AsRef<str>) -> String {
    format!("<b>{}</b>", escape_html(text.as_ref()))
}

/// `Label: <code>value</code>` line terminated by a newline.
pub fn field(label: &str, value: impl AsRef<str>) -> String {
    format!("{}: {}\n", escape_html(label), code(value))
}

/// Mention a user by id (works without a username).
pub fn user_mention(user_id: i64) -> String {
    format!("<a href=\"tg://user?id={user_id}\">{user_id}</a>")
}
