use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::domain::NewEntry;

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Render the notification body for `entries`, in the order given.
pub fn render(entries: &[NewEntry]) -> String {
    let count = entries.len();
    let mut body = format!(
        "<h1>New Blog Posts</h1>\n<p>Found {} new blog post{}:</p>\n<ul>",
        count,
        if count == 1 { "" } else { "s" }
    );

    for entry in entries {
        body.push_str(&format!(
            "\n  <li>\n    <strong>{}</strong>:\n    <a href=\"{}\">{}</a>\n    ({})\n  </li>",
            encode_text(&entry.feed_title),
            encode_double_quoted_attribute(&entry.link),
            encode_text(&entry.title),
            entry.published_at.format(DATE_FORMAT),
        ));
    }

    body.push_str("\n</ul>\n<p>Enjoy your reading!</p>");
    body
}
