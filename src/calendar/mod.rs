// src/calendar/mod.rs — iCalendar feed of a user's dated tasks
//
// Subscribed to by calendar clients through a per-user secret token.
// Output follows RFC 5545: CRLF line endings, text escaping, and lines
// folded at 75 octets.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::infra::config::CalendarConfig;
use crate::infra::errors::TrackError;
use crate::store::types::{Task, User};
use crate::store::StoreHandle;

pub const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
pub const CONTENT_DISPOSITION: &str = "attachment; filename=\"calendar.ics\"";

const FOLD_AT: usize = 75;

/// Look up the token's owner and render their feed.
pub async fn feed_for_token(
    store: &StoreHandle,
    token: &str,
    config: &CalendarConfig,
) -> Result<String, TrackError> {
    let user = store
        .find_user_by_calendar_token(token)
        .await?
        .ok_or_else(|| TrackError::UnknownCalendarToken {
            token: token.to_string(),
        })?;
    let tasks = store.tasks_for_user(&user.id).await?;
    tracing::debug!(
        "Rendering calendar for user {} ({} tasks)",
        user.id,
        tasks.len()
    );
    Ok(render_calendar(&user, &tasks, config, Utc::now()))
}

pub fn calendar_name(user: &User) -> String {
    format!("Calendar of {}", user.full_name())
}

/// Render one all-day event per task carrying both a start and an end date.
pub fn render_calendar(
    user: &User,
    tasks: &[Task],
    config: &CalendarConfig,
    now: DateTime<Utc>,
) -> String {
    let name = calendar_name(user);
    let mut out = String::new();

    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{}", config.product_id));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    push_line(&mut out, &format!("NAME:{}", escape_text(&name)));
    push_line(&mut out, &format!("X-WR-CALNAME:{}", escape_text(&name)));
    push_line(&mut out, &format!("TIMEZONE-ID:{}", config.timezone));
    push_line(&mut out, &format!("X-WR-TIMEZONE:{}", config.timezone));

    let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    for task in tasks {
        let (Some(start), Some(end)) = (task.start_date, task.end_date) else {
            tracing::warn!("Skipping task '{}' in calendar: missing dates", task.title);
            continue;
        };
        if end < start {
            tracing::warn!(
                "Skipping task '{}' in calendar: ends {} before it starts {}",
                task.title,
                end,
                start
            );
            continue;
        }
        push_event(&mut out, task, start, end, &stamp);
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

fn push_event(out: &mut String, task: &Task, start: NaiveDate, end: NaiveDate, stamp: &str) {
    // DTEND of an all-day event is exclusive
    let end_exclusive = end + Duration::days(1);

    push_line(out, "BEGIN:VEVENT");
    push_line(out, &format!("UID:{}@tasktrack", task.id));
    push_line(out, &format!("DTSTAMP:{stamp}"));
    push_line(out, &format!("DTSTART;VALUE=DATE:{}", ical_date(start)));
    push_line(out, &format!("DTEND;VALUE=DATE:{}", ical_date(end_exclusive)));
    push_line(out, &format!("SUMMARY:{}", escape_text(&task.title)));
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        push_line(out, &format!("DESCRIPTION:{}", escape_text(description)));
    }
    push_line(out, "END:VEVENT");
}

fn ical_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Escape a TEXT value.
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Append a content line, folding it without splitting a UTF-8 sequence.
fn push_line(out: &mut String, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > FOLD_AT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out.push_str("\r\n");
}
