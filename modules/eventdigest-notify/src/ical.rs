//! RFC-5545 calendar export for notification email attachments.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};

use eventdigest_store::Event;

use crate::email::Attachment;

/// Render one event as a VCALENDAR containing a single VEVENT.
/// DTEND falls back to start + 2h when no end date is known.
pub fn event_to_ical(event: &Event) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//eventdigest//datatalk.cz//".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@eventdigest", event.external_id),
        format!("DTSTAMP:{}", format_utc(event.scraped_at)),
        format!("SUMMARY:{}", escape_text(&event.title)),
    ];

    if let Some(start) = event.date {
        lines.push(format!("DTSTART:{}", format_utc(start)));
        let end = event.end_date.unwrap_or(start + Duration::hours(2));
        lines.push(format!("DTEND:{}", format_utc(end)));
    }
    if let Some(location) = &event.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(description) = &event.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    lines.push(format!("URL:{}", event.url));
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    lines.join("\r\n") + "\r\n"
}

/// Base64-encoded `.ics` attachment for one event.
pub fn make_ics_attachment(event: &Event) -> Attachment {
    Attachment {
        content: BASE64.encode(event_to_ical(event)),
        filename: format!("event-{}.ics", event.external_id),
        mime_type: "text/calendar".to_string(),
    }
}

fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape text per RFC 5545 §3.3.11.
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event(date: Option<DateTime<Utc>>, end_date: Option<DateTime<Utc>>) -> Event {
        Event {
            id: Uuid::new_v4(),
            external_id: "abc123def4567890".to_string(),
            title: "AI Meetup, Praha".to_string(),
            date,
            end_date,
            location: Some("Kampus Hybernská".to_string()),
            description: Some("Talks and networking".to_string()),
            url: "https://datatalk.cz/akce/ai-meetup".to_string(),
            topics: serde_json::json!([]),
            speakers: serde_json::json!([]),
            event_type: None,
            level: None,
            language: None,
            organizer: None,
            image_url: None,
            scraped_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_vevent_structure() {
        let start = Utc.with_ymd_and_hms(2026, 3, 12, 18, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 12, 21, 0, 0).unwrap();
        let ics = event_to_ical(&event(Some(start), Some(end)));

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART:20260312T180000Z"));
        assert!(ics.contains("DTEND:20260312T210000Z"));
        assert!(ics.contains("SUMMARY:AI Meetup\\, Praha"));
        assert!(ics.contains("URL:https://datatalk.cz/akce/ai-meetup"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_dtend_defaults_to_two_hours() {
        let start = Utc.with_ymd_and_hms(2026, 3, 12, 18, 0, 0).unwrap();
        let ics = event_to_ical(&event(Some(start), None));
        assert!(ics.contains("DTEND:20260312T200000Z"));
    }

    #[test]
    fn test_undated_event_has_no_dtstart() {
        let ics = event_to_ical(&event(None, None));
        assert!(!ics.contains("DTSTART"));
        assert!(!ics.contains("DTEND"));
        assert!(ics.contains("SUMMARY:"));
    }

    #[test]
    fn test_attachment_is_base64_ics() {
        let attachment = make_ics_attachment(&event(None, None));
        assert_eq!(attachment.filename, "event-abc123def4567890.ics");
        assert_eq!(attachment.mime_type, "text/calendar");
        let decoded = BASE64.decode(attachment.content).unwrap();
        assert!(String::from_utf8(decoded).unwrap().contains("BEGIN:VEVENT"));
    }
}
