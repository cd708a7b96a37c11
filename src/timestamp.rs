use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime, PrimitiveDateTime};

/// Unix seconds for the date formats the registries hand out.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(dt.unix_timestamp());
    }
    let naive_format =
        time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(trimmed, &naive_format) {
        return Some(dt.assume_utc().unix_timestamp());
    }
    let spaced_format =
        time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(trimmed, &spaced_format) {
        return Some(dt.assume_utc().unix_timestamp());
    }
    let date_format = time::macros::format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(trimmed, &date_format) {
        return date
            .with_hms(0, 0, 0)
            .ok()
            .map(|dt| dt.assume_utc().unix_timestamp());
    }
    None
}

pub fn format_timestamp(timestamp: i64) -> Option<String> {
    let date = OffsetDateTime::from_unix_timestamp(timestamp).ok()?;
    let format = time::macros::format_description!("[year]-[month]-[day]");
    date.format(&format).ok()
}
