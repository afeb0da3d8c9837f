//! Feed parsing using the icalendar crate's parser.

use crate::error::{ReminderError, ReminderResult};
use crate::event::{CalendarEvent, EventStart, UNTITLED};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};
use tracing::warn;

/// Parse a whole calendar feed into its VEVENT instances.
///
/// Other component types (VTODO, VJOURNAL, VTIMEZONE, ...) and unknown
/// properties are ignored. A VEVENT without a UID or a readable DTSTART is
/// skipped with a warning.
pub fn parse_feed(content: &str) -> ReminderResult<Vec<CalendarEvent>> {
    if !content
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(ReminderError::MalformedFeed(
            "missing BEGIN:VCALENDAR".to_string(),
        ));
    }

    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| ReminderError::MalformedFeed(e.to_string()))?;

    let events = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|vevent| {
            let event = parse_vevent(vevent);
            if event.is_none() {
                warn!(
                    uid = ?vevent.find_prop("UID").map(|p| p.val.to_string()),
                    "Skipping VEVENT without UID or DTSTART"
                );
            }
            event
        })
        .collect();

    Ok(events)
}

fn parse_vevent(vevent: &Component) -> Option<CalendarEvent> {
    let uid = vevent.find_prop("UID")?.val.to_string();
    let start = to_event_start(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);

    // Overridden instances of a recurring event share the master's UID
    let id = match vevent.find_prop("RECURRENCE-ID") {
        Some(rid) => format!("{}#{}", uid, rid.val),
        None => uid,
    };

    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let body = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();

    Some(CalendarEvent {
        id,
        title,
        body,
        start,
    })
}

/// Convert icalendar's DatePerhapsTime to our EventStart, preserving timezone info
fn to_event_start(dpt: DatePerhapsTime) -> EventStart {
    match dpt {
        DatePerhapsTime::Date(d) => EventStart::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => EventStart::Utc(dt),
            CalendarDateTime::Floating(naive) => EventStart::Floating(naive),
            CalendarDateTime::WithTimezone { date_time, tzid } => EventStart::Zoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}

/// Decode RFC 5545 TEXT escapes (`\n`, `\,`, `\;`, `\\`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
