//! User-visible text, rendered as Telegram HTML.

use crate::{
    conversation::{Delta, Prompt},
    meters::{Field, MeterDiff, MeterRecord},
    rates::ExchangeRate,
    validate::ValidationError,
};

/// Escape HTML special characters for Telegram.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn reading_lines(record: &MeterRecord, diff: Option<&MeterDiff>) -> String {
    Field::ALL
        .iter()
        .map(|f| match diff {
            Some(d) => format!("<b>{}:</b> {} ({:+})", f.label(), record.get(*f), d.get(*f)),
            None => format!("<b>{}:</b> {}", f.label(), record.get(*f)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Confirmation after a record was appended.
pub fn render_finished(record: &MeterRecord, delta: &Delta) -> String {
    match delta {
        Delta::Changed(diff) => format!("sheet updated\n\n{}", reading_lines(record, Some(diff))),
        Delta::NoHistory => format!("sheet updated\n\n{}", reading_lines(record, None)),
        Delta::Unavailable(e) => format!(
            "sheet updated\n\n{}\n\nprevious meters unavailable: {}",
            reading_lines(record, None),
            escape_html(&e.to_string())
        ),
    }
}

/// `/lastmeters` report; deltas only when a previous record exists.
pub fn render_last_meters(last: &MeterRecord, previous: Option<&MeterRecord>) -> String {
    let diff = previous.map(|p| last.diff(p));
    format!(
        "here is the last meters\n\n<b>date:</b> {}\n{}",
        last.formatted_date(),
        reading_lines(last, diff.as_ref())
    )
}

/// Rejected reply followed by the same question again.
pub fn render_invalid(error: &ValidationError, prompt: &Prompt) -> String {
    format!("{error}\n{}", prompt.text)
}

pub fn render_rates(date: Option<&str>, rates: &[&ExchangeRate]) -> String {
    if rates.is_empty() {
        return "No exchange rate found".to_string();
    }

    let mut lines = Vec::with_capacity(rates.len() + 1);
    if let Some(date) = date {
        lines.push(format!("<i>{}</i>", escape_html(date)));
    }
    for r in rates {
        let code = escape_html(&r.char_code);
        if r.nominal > 1 {
            lines.push(format!("<b>{code}:</b> {:.2} per {}", r.value, r.nominal));
        } else {
            lines.push(format!("<b>{code}:</b> {:.2}", r.value));
        }
    }
    lines.join("\n")
}

pub fn render_whoami(chat_id: i64, first_name: &str, last_name: Option<&str>) -> String {
    let name = match last_name {
        Some(last) if !last.is_empty() => format!("{first_name} {last}"),
        _ => first_name.to_string(),
    };
    format!("<b>id:</b> {chat_id}\n<b>name:</b> {}", escape_html(name.trim()))
}
