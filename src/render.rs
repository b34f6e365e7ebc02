//! HTML rendering for chat messages and pages.
//!
//! Everything here is pure string building. User-supplied text only ever
//! reaches markup through `escape_html`.

use std::borrow::Cow;
use std::fmt::Write as _;

use time::macros::format_description;

use crate::services::store::Message;

/// Head markup for the streamed message document.
pub const MESSAGE_STYLES: &str = r"<style>
body { margin: 0; padding: 20px; background: transparent; font-family: system-ui, sans-serif; color: #e4e6eb; }
.message { background: #1e2541; padding: 16px 20px; border-radius: 12px; margin-bottom: 15px; border: 1px solid rgba(255, 255, 255, 0.1); }
.message-header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 8px; }
.username-wrapper { display: flex; align-items: baseline; gap: 6px; }
.username { font-weight: 600; font-size: 1.1em; }
.user-hash { color: #6a6d72; font-size: 0.9em; font-weight: 400; }
.timestamp { font-size: 0.85em; color: #b0b3b8; opacity: 0.7; }
.message-text { color: #e4e6eb; line-height: 1.5; }
</style>";

/// Escape the five HTML-significant characters.
#[must_use]
pub fn escape_html(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 16);
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

fn clock_time(message: &Message) -> String {
    message
        .created_at
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Render one message as a self-contained fragment.
#[must_use]
pub fn render_fragment(message: &Message) -> String {
    format!(
        concat!(
            "<div class=\"message\" id=\"msg-{id}\">",
            "<div class=\"message-header\">",
            "<span class=\"username-wrapper\">",
            "<span class=\"username\" style=\"color: {color}\">{name}</span>",
            "<span class=\"user-hash\">#{tag}</span>",
            "</span>",
            "<span class=\"timestamp\">{time}</span>",
            "</div>",
            "<div class=\"message-text\">{text}</div>",
            "</div>"
        ),
        id = message.id,
        color = escape_html(message.author.color),
        name = escape_html(&message.author.name),
        tag = escape_html(&message.author.tag),
        time = clock_time(message),
        text = escape_html(&message.text),
    )
}

/// Complete, non-streaming document listing `messages`.
#[must_use]
pub fn render_static_messages(title: &str, messages: &[Message]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}\n</head>\n<body>\n",
        escape_html(title),
        MESSAGE_STYLES
    );
    for message in messages {
        html.push_str(&render_fragment(message));
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// The chat page: message frame on top, post form below.
#[must_use]
pub fn render_chat_page(title: &str, username: Option<&str>, stream_src: &str) -> String {
    let value_attr = username
        .filter(|name| !name.is_empty())
        .map(|name| format!(" value=\"{}\"", escape_html(name)))
        .unwrap_or_default();
    let title = escape_html(title);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<div class="chat-container">
<div class="chat-header"><h1>{title}</h1><p>Chat with anyone, anywhere!</p></div>
<div class="chat-wrapper">
<iframe src="{src}" class="chat-messages" style="width: 100%; flex: 1; border: none;"></iframe>
<form action="/send" method="POST" class="message-form">
<div class="form-group">
<input type="text" name="username" placeholder="Your name" required class="username-input"{value_attr}>
<input type="text" name="text" placeholder="Type a message..." required class="message-input" autofocus>
<button type="submit" class="send-button"><span>Send</span></button>
</div>
</form>
</div>
</div>
</body>
</html>
"#,
        src = escape_html(stream_src),
    )
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
