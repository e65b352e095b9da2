//! Field-specific clean-up of raw answers.
//!
//! Normalization never fails: input that no rule recognizes is kept as typed
//! (trimmed). Validation is a separate, advisory concern (see
//! [`crate::fields::Validator`]).

use crate::fields::HOURS_FIELD;
use chrono::NaiveDateTime;

const YES_NO_FIELDS: &[&str] = &[
    "aseo_alrededores",
    "lavado_canastilla",
    "desalojo_lodos",
    "limpieza_sedimentador",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Date,
    Time,
    YesNo,
    Level,
    Plain,
}

impl Category {
    fn of(field_key: &str) -> Self {
        match field_key {
            "fecha" => Category::Date,
            HOURS_FIELD => Category::Time,
            "nivel_pozo" => Category::Level,
            k if YES_NO_FIELDS.contains(&k) => Category::YesNo,
            _ => Category::Plain,
        }
    }
}

pub fn normalize(raw: &str, field_key: &str, now: NaiveDateTime) -> String {
    let value = raw.trim();
    let normalized = match Category::of(field_key) {
        Category::Date => normalize_date(value, now),
        Category::Time => normalize_time(value, now),
        Category::YesNo => normalize_yes_no(value),
        Category::Level => normalize_level(value),
        Category::Plain => None,
    };
    normalized.unwrap_or_else(|| value.to_string())
}

fn normalize_date(value: &str, now: NaiveDateTime) -> Option<String> {
    let lower = value.to_lowercase();
    if lower == "hoy" || lower == "today" {
        return Some(now.format("%d/%m/%Y").to_string());
    }
    let parts: Vec<&str> = value.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    let year = if year.chars().count() == 2 {
        format!("20{year}")
    } else {
        year.to_string()
    };
    Some(format!("{}/{}/{}", zero_pad(day), zero_pad(month), year))
}

/// Left-pad with zeros to two characters.
fn zero_pad(s: &str) -> String {
    format!("{s:0>2}")
}

fn normalize_time(value: &str, now: NaiveDateTime) -> Option<String> {
    if value.to_lowercase() == "ahora" {
        return Some(now.format("%H:%M").to_string());
    }
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let hour: u32 = value.parse().ok()?;
        return (hour <= 23).then(|| format!("{hour:02}:00"));
    }
    let (h, m) = value.split_once(':')?;
    if m.contains(':') {
        return None;
    }
    let hour: i64 = h.trim().parse().ok()?;
    let minute: i64 = m.trim().parse().ok()?;
    ((0..=23).contains(&hour) && (0..=59).contains(&minute))
        .then(|| format!("{hour:02}:{minute:02}"))
}

fn normalize_yes_no(value: &str) -> Option<String> {
    match value.to_lowercase().as_str() {
        "s" | "si" | "yes" | "1" => Some("SI".into()),
        "n" | "no" | "0" | "" => Some("NO".into()),
        _ => None,
    }
}

fn normalize_level(value: &str) -> Option<String> {
    let lower = value.to_lowercase();
    if lower.contains("alt") {
        Some("Alto".into())
    } else if lower.contains("med") {
        Some("Medio".into())
    } else if lower.contains("baj") {
        Some("Bajo".into())
    } else {
        None
    }
}
