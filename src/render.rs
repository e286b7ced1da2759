use std::fmt::Write;

use crate::containers::{Action, ContainerRecord};
use crate::filter::MembershipFilter;

const STYLE: &str = r"
body { font-family: Arial, sans-serif; background: #f4f4f4; color: #333; padding: 20px; }
h1 { color: #4caf50; text-align: center; }
ul { list-style: none; padding: 0; max-width: 640px; margin: auto; }
li { background: white; border: 1px solid #ddd; border-radius: 5px; margin: 10px 0; padding: 15px;
     display: flex; justify-content: space-between; align-items: center; }
li.missing { color: #999; }
button { color: white; border: none; border-radius: 5px; padding: 8px 14px; cursor: pointer; margin-left: 4px; }
button.start, button.restart { background: #4caf50; }
button.stop { background: #ff5722; }
button:disabled { background: #b0bec5; cursor: not-allowed; }
form.upload { max-width: 640px; margin: 20px auto; }
.hint { color: #777; font-size: 0.9em; }
.status { font-weight: bold; }
";

/// Escapes text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }

    out
}

/// Actions offered for a container in its current state.
pub fn available(record: &ContainerRecord) -> [(Action, bool); 3] {
    let running = record.status.is_running();

    [(Action::Start, !running), (Action::Stop, running), (Action::Restart, true)]
}

/// One `<li>` for `record`. Action buttons replace the whole row with the
/// fragment the action handler returns.
pub fn row(record: &ContainerRecord) -> String {
    let id = escape(&record.id);
    let mut buttons = String::new();

    for (action, enabled) in available(record) {
        let _ = write!(
            buttons,
            r##"<button class="{action}" hx-post="/containers/{id}/{action}" hx-target="#container-{id}" hx-swap="outerHTML"{disabled}>{label}</button>"##,
            disabled = if enabled { "" } else { " disabled" },
            label = capitalize(&action.to_string()),
        );
    }

    format!(
        r#"<li id="container-{id}"><span>{name} <small>{image}</small> - Status: <span class="status">{status}</span></span><div>{buttons}</div></li>"#,
        name = escape(&record.name),
        image = escape(&record.image),
        status = escape(record.status.as_str()),
    )
}

/// The `<ul>` holding every visible container, followed by a row for each
/// filter entry that matched nothing.
pub fn list(records: &[ContainerRecord], filter: &MembershipFilter) -> String {
    let mut out = String::from(r#"<ul id="containers">"#);

    for record in records {
        out.push_str(&row(record));
    }

    for entry in filter.unmatched(records) {
        let _ = write!(out, r#"<li class="missing">{} - not found</li>"#, escape(entry));
    }

    out.push_str("</ul>");
    out
}

pub fn dashboard(records: &[ContainerRecord], filter: &MembershipFilter) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Dockhand</title>
<script src="https://unpkg.com/htmx.org@1.9.12"></script>
<style>{STYLE}</style>
</head>
<body>
<h1>Containers</h1>
<form class="upload" hx-post="/upload-csv" hx-encoding="multipart/form-data" hx-target="#containers" hx-swap="outerHTML">
<input type="file" name="file" accept=".csv,text/csv"> <button class="start" type="submit">Upload filter</button>
<p class="hint">The <code>container_id</code> column needs full ids, as printed by <code>docker ps --no-trunc</code>.</p>
</form>
{list}
</body>
</html>"##,
        list = list(records, filter),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();

    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod test {
    use super::{dashboard, escape, list, row};
    use crate::containers::{ContainerRecord, ContainerStatus};
    use crate::filter::{FilterMode, MembershipFilter};

    fn record(status: &str) -> ContainerRecord {
        ContainerRecord {
            id: "a1".to_owned(),
            name: "web".to_owned(),
            status: ContainerStatus::from(status),
            image: "nginx".to_owned(),
        }
    }

    #[test]
    fn running_rows_can_stop_but_not_start() {
        let html = row(&record("running"));

        assert!(html.starts_with(r#"<li id="container-a1">"#));
        assert!(html.contains(r##"<button class="stop" hx-post="/containers/a1/stop" hx-target="#container-a1" hx-swap="outerHTML">Stop</button>"##));
        assert!(html.contains(r##"hx-post="/containers/a1/start" hx-target="#container-a1" hx-swap="outerHTML" disabled>Start"##));
    }

    #[test]
    fn exited_rows_can_start_but_not_stop() {
        let html = row(&record("exited"));

        assert!(html.contains(r##"hx-post="/containers/a1/stop" hx-target="#container-a1" hx-swap="outerHTML" disabled>Stop"##));
        assert!(html.contains(r#"hx-swap="outerHTML">Start</button>"#));
        assert!(html.contains(r#"<span class="status">exited</span>"#));
    }

    #[test]
    fn markup_in_names_is_escaped() {
        assert_eq!(escape(r#"<b a="1">&'"#), "&lt;b a=&quot;1&quot;&gt;&amp;&#39;");

        let filter = MembershipFilter::new(FilterMode::ByName, ["<script>"]);
        let html = list(&[], &filter);

        assert!(html.contains("&lt;script&gt; - not found"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn dashboard_wraps_the_list() {
        let html = dashboard(&[record("running")], &MembershipFilter::default());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<ul id="containers"><li id="container-a1">"#));
        assert!(html.contains(r#"hx-post="/upload-csv""#));
        assert!(html.contains("docker ps --no-trunc"));
    }
}
