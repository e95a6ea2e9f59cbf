//! Notification message rendering: HTML email digest and the shorter
//! Telegram variant.

use eventdigest_store::Event;

/// Telegram messages list at most this many events.
const TELEGRAM_MAX_EVENTS: usize = 5;

/// Card-per-event HTML digest for the notification email.
pub fn format_event_email(events: &[Event]) -> String {
    let mut items = String::new();
    for event in events {
        let speakers = event.speakers_vec();
        let speakers_html = if speakers.is_empty() {
            String::new()
        } else {
            format!(
                r#"<p style="color:#444;margin:5px 0;font-size:0.9em;">Speakers: {}</p>"#,
                speakers.join(", ")
            )
        };
        let desc_html = event
            .description
            .as_deref()
            .map(|d| format!(r#"<p style="color:#555;margin:5px 0;font-size:0.9em;">{d}</p>"#))
            .unwrap_or_default();

        items.push_str(&format!(
            r#"<div style="margin-bottom:20px;padding:15px;border:1px solid #ddd;border-radius:8px;">
<h3 style="margin:0 0 10px 0;">{title}</h3>
<p style="color:#666;margin:5px 0;">{location}</p>
{speakers_html}{desc_html}<a href="{url}" style="color:#0066cc;">Vice info</a>
</div>"#,
            title = event.title,
            location = event.location.as_deref().unwrap_or("TBD"),
            url = event.url,
        ));
    }

    format!(
        r#"<div style="font-family:sans-serif;max-width:600px;margin:0 auto;">
<h1 style="color:#333;">Nove eventy tento tyden</h1>
{items}</div>"#
    )
}

/// Markdown message for Telegram, capped at the first few events.
pub fn format_telegram_message(events: &[Event]) -> String {
    let items = events
        .iter()
        .take(TELEGRAM_MAX_EVENTS)
        .map(|e| {
            format!(
                "*{}*\n{}\n[Vice info]({})",
                e.title,
                e.location.as_deref().unwrap_or("TBD"),
                e.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("*Nove eventy*\n\n{items}")
}
