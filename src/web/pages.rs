//! Server-rendered HTML pages

use chrono::DateTime;

use crate::error::Result;
use crate::models::Entry;
use crate::render::format_expiration;

const DURATION_CHOICES: [&str; 6] = ["1 hour", "12 hours", "1 day", "1 week", "4 weeks", "forever"];

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(title),
        body = body,
    )
}

pub fn login_page(token_is_not_set: bool) -> String {
    let warning = if token_is_not_set {
        r#"<p class="warning">No access token is configured (ALOHOMORA_TOKEN). Login is disabled.</p>"#
    } else {
        ""
    };

    let body = format!(
        r#"<main class="login">
<h1>Alohomora</h1>
{warning}
<form method="post" action="/login">
<input type="password" name="token" placeholder="Access token" autofocus required>
<button type="submit">Sign in</button>
</form>
</main>"#
    );

    layout("Alohomora - Login", &body)
}

pub fn index_page(entries: &[Entry], client_ip: &str, now: i64) -> Result<String> {
    let mut rows = String::new();
    for entry in entries {
        let status = if entry.is_expired(now) { " class=\"expired\"" } else { "" };
        rows.push_str(&format!(
            "<tr{status}><td>{id}</td><td>{ip}</td><td>{label}</td><td>{expiration}</td>\
             <td><a href=\"/delete/{id}\">delete</a></td></tr>\n",
            status = status,
            id = entry.id,
            ip = escape_html(&entry.ip),
            label = escape_html(&entry.label),
            expiration = format_expiration(entry.expiration)?.trim_end(),
        ));
    }

    let options: String = DURATION_CHOICES
        .iter()
        .map(|choice| format!("<option value=\"{choice}\"></option>"))
        .collect();

    let current_time = DateTime::from_timestamp(now, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();

    let body = format!(
        r#"<header>
<h1>Alohomora</h1>
<p>Your address: <strong>{client_ip}</strong> &middot; {current_time}</p>
<nav><a href="/allow.conf">allow.conf</a> &middot; <a href="/allow.conf?dl">download</a> &middot; <a href="/logout">logout</a></nav>
</header>
<main>
<form method="post" action="/add" class="add">
<input type="text" name="ip" value="{client_ip}" placeholder="IPv4 address" required>
<input type="text" name="label" placeholder="Label">
<input type="text" name="expiration" list="durations" value="1 day" placeholder="Duration">
<datalist id="durations">{options}</datalist>
<button type="submit">Allow</button>
</form>
<table>
<thead><tr><th>#</th><th>IP</th><th>Label</th><th>Expiration</th><th></th></tr></thead>
<tbody>
{rows}</tbody>
</table>
</main>"#,
        client_ip = escape_html(client_ip),
        current_time = current_time,
        options = options,
        rows = rows,
    );

    Ok(layout("Alohomora", &body))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
