use std::fmt::Write;

use axum::extract::State;
use axum::response::Html;
use roster_database::Attendee;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn roster_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let attendees = state.attendees().list().await?;
    Ok(Html(render_roster_page(&attendees)))
}

pub fn render_roster_page(attendees: &[Attendee]) -> String {
    let mut body = String::new();

    if attendees.is_empty() {
        body.push_str("<p class=\"empty\">No attendees yet.</p>\n");
    } else {
        body.push_str(
            "<table>\n<thead><tr><th>ID</th><th>First name</th><th>Last name</th><th>Nickname</th></tr></thead>\n<tbody>\n",
        );
        for attendee in attendees {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                attendee.id,
                escape_html(&attendee.first_name),
                escape_html(&attendee.last_name),
                attendee
                    .nickname
                    .as_deref()
                    .map(escape_html)
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        body.push_str("</tbody>\n</table>\n");
    }

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Attendees</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; }}
th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }}
.empty {{ color: #666; }}
</style>
</head>
<body>
<h1>Attendees</h1>
<p><a href="/chat">Open chat</a></p>
{body}</body>
</html>
"#
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
