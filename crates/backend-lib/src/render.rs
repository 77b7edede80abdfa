// ============================
// crates/backend-lib/src/render.rs
// ============================
//! HTML pages for viewers.
//!
//! The participant page subscribes to `/ws` and keeps its list current from
//! the pushed `add`, `remove` and `reset` messages.
use chrono::{DateTime, Utc};

use crate::meetings::MeetingSnapshot;

/// Display format of the last-updated timestamp
pub const UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEMO_TOPIC: &str = "Simulated Demo";

pub const DEMO_NAMES: [&str; 26] = [
    "Alice Smith",
    "Bob Johnson",
    "Charlie Brown",
    "David Wilson",
    "Eve Davis",
    "Frank Miller",
    "Grace Lee",
    "Hannah Garcia",
    "Ian Martinez",
    "Jack Taylor",
    "Kate Anderson",
    "Liam Thomas",
    "Mia Jackson",
    "Noah White",
    "Olivia Harris",
    "Paul Clark",
    "Quinn Lewis",
    "Rachel Walker",
    "Sam Hall",
    "Tina Young",
    "Uma King",
    "Vera Wright",
    "Walter Scott",
    "Xander Green",
    "Yara Adams",
    "Zoe Baker",
];

const STYLE: &str = r#"<style>
body { font-family: sans-serif; margin: 2rem auto; max-width: 40rem; color: #222; }
h1 { font-size: 1.4rem; }
.meta { color: #666; font-size: 0.9rem; }
.error { color: #b00020; }
ul#participants { columns: 2; padding-left: 1.2rem; }
</style>"#;

const LIVE_SCRIPT: &str = r#"<script>
(function () {
  const root = document.getElementById("roster");
  const list = document.getElementById("participants");
  const count = document.getElementById("count");
  let names = Array.from(list.children).map((li) => li.textContent);

  function draw() {
    names.sort();
    list.replaceChildren(...names.map((name) => {
      const li = document.createElement("li");
      li.textContent = name;
      return li;
    }));
    count.textContent = String(names.length);
  }

  function connect() {
    const scheme = location.protocol === "https:" ? "wss:" : "ws:";
    const url = scheme + "//" + location.host + "/ws?password=" + encodeURIComponent(root.dataset.password);
    const socket = new WebSocket(url);
    const keepalive = setInterval(() => socket.readyState === 1 && socket.send("ping"), 30000);
    socket.onmessage = (event) => {
      const message = JSON.parse(event.data);
      if (message.action === "add") {
        names.push(message.name);
      } else if (message.action === "remove") {
        const index = names.indexOf(message.name);
        if (index >= 0) names.splice(index, 1);
      } else if (message.action === "reset") {
        names = message.participants.slice();
      }
      draw();
    };
    socket.onclose = () => {
      clearInterval(keepalive);
      setTimeout(connect, 5000);
    };
  }

  connect();
})();
</script>"#;

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn format_updated(at: DateTime<Utc>) -> String {
    at.format(UPDATED_FORMAT).to_string()
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{STYLE}\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}

/// Password form, optionally with an error line
pub fn render_prompt(error: Option<&str>) -> String {
    let mut body = String::from("<h1>Participants</h1>\n");
    if let Some(error) = error {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", escape_html(error)));
    }
    body.push_str(
        "<form method=\"post\" action=\"/\">\n\
         <label for=\"password\">Viewer password</label>\n\
         <input type=\"password\" id=\"password\" name=\"password\" autofocus>\n\
         <button type=\"submit\">Show</button>\n\
         </form>\n",
    );
    page("Participants", &body)
}

/// Participant page for the tenant's latest meeting.
///
/// `snapshot` is `None` when the tenant has no meeting yet; the page then
/// shows an empty list that fills in as people join. With an empty
/// `password` the page is static.
pub fn render_roster(snapshot: Option<&MeetingSnapshot>, password: &str) -> String {
    let topic = snapshot.map(|s| s.topic.as_str()).unwrap_or_default();
    let participants = snapshot.map(|s| s.participants.as_slice()).unwrap_or_default();

    let mut body = format!(
        "<section id=\"roster\" data-password=\"{}\">\n<h1>{}</h1>\n",
        escape_html(password),
        if topic.is_empty() { "Participants".to_string() } else { escape_html(topic) },
    );
    body.push_str(&format!(
        "<p class=\"meta\"><span id=\"count\">{}</span> participants",
        participants.len()
    ));
    if let Some(snapshot) = snapshot {
        body.push_str(&format!(", last updated {}", format_updated(snapshot.last_updated)));
    }
    body.push_str("</p>\n<ul id=\"participants\">");
    for name in participants {
        body.push_str(&format!("<li>{}</li>", escape_html(name)));
    }
    body.push_str("</ul>\n</section>\n");
    if !password.is_empty() {
        body.push_str(LIVE_SCRIPT);
        body.push('\n');
    }

    page(if topic.is_empty() { "Participants" } else { topic }, &body)
}

/// Static page with a simulated full meeting
pub fn render_demo(now: DateTime<Utc>) -> String {
    let snapshot = MeetingSnapshot {
        meeting_id: "demo".to_string(),
        topic: DEMO_TOPIC.to_string(),
        participants: DEMO_NAMES.iter().map(|name| name.to_string()).collect(),
        last_updated: now,
    };
    render_roster(Some(&snapshot), "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(participants: &[&str]) -> MeetingSnapshot {
        MeetingSnapshot {
            meeting_id: "M1".to_string(),
            topic: "Weekly <sync>".to_string(),
            participants: participants.iter().map(|p| p.to_string()).collect(),
            last_updated: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<b>"Tom" & 'Jerry'</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_prompt_shows_error() {
        let page = render_prompt(Some("Wrong password."));
        assert!(page.contains("name=\"password\""));
        assert!(page.contains("Wrong password."));
        assert!(!render_prompt(None).contains("class=\"error\""));
    }

    #[test]
    fn test_roster_lists_names_and_metadata() {
        let page = render_roster(Some(&snapshot(&["Ann", "Bob"])), "viewer-password-one");

        assert!(page.contains("Weekly &lt;sync&gt;"));
        assert!(page.contains("<span id=\"count\">2</span>"));
        assert!(page.contains("last updated 2024-03-09 14:05:07"));
        assert!(page.contains("<li>Ann</li><li>Bob</li>"));
        assert!(page.contains("data-password=\"viewer-password-one\""));
        assert!(page.contains("new WebSocket"));
    }

    #[test]
    fn test_roster_escapes_names() {
        let page = render_roster(Some(&snapshot(&["<script>alert(1)</script>"])), "pw");
        assert!(!page.contains("<li><script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn test_roster_without_meeting() {
        let page = render_roster(None, "viewer-password-one");
        assert!(page.contains("<span id=\"count\">0</span>"));
        assert!(!page.contains("last updated"));
    }

    #[test]
    fn test_demo_page() {
        let page = render_demo(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(page.contains(DEMO_TOPIC));
        assert!(page.contains("<span id=\"count\">26</span>"));
        assert!(page.contains("<li>Alice Smith</li>"));
        assert!(page.contains("<li>Zoe Baker</li>"));
        assert!(!page.contains("new WebSocket"));
    }
}
