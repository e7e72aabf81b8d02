use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Delivery callbacks go to `/status` on whatever host the webhook request
/// came in on; no separately configured public URL.
pub fn status_callback_url(host: &str) -> String {
    format!("https://{host}/status")
}

const DATE_FMT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");
const DATETIME_T_FMT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const DATETIME_SPACE_FMT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

fn parse_datetime(value: &str) -> Option<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(dt);
    }
    for fmt in [DATETIME_T_FMT, DATETIME_SPACE_FMT] {
        if let Ok(dt) = PrimitiveDateTime::parse(value, fmt) {
            return Some(dt.assume_utc());
        }
    }
    None
}

fn parse_bare_date(value: &str) -> Option<Date> {
    Date::parse(value, DATE_FMT).ok()
}

/// Inclusive lower bound for `created_at` filters.  Bare dates mean midnight
/// UTC; anything unparseable is `None` and the filter is skipped.
pub fn parse_start_filter(value: &str) -> Option<OffsetDateTime> {
    parse_datetime(value).or_else(|| Some(parse_bare_date(value)?.midnight().assume_utc()))
}

/// Exclusive upper bound.  A bare date covers the whole day, so it becomes
/// midnight of the following day.
pub fn parse_end_filter(value: &str) -> Option<OffsetDateTime> {
    if let Some(dt) = parse_datetime(value) {
        return Some(dt);
    }
    let date = parse_bare_date(value)?;
    Some(date.next_day()?.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn start_accepts_bare_date() {
        assert_eq!(
            parse_start_filter("2024-01-01"),
            Some(datetime!(2024-01-01 00:00:00 UTC))
        );
    }

    #[test]
    fn end_bare_date_covers_whole_day() {
        assert_eq!(
            parse_end_filter("2024-01-01"),
            Some(datetime!(2024-01-02 00:00:00 UTC))
        );
    }

    #[test]
    fn accepts_naive_datetimes() {
        assert_eq!(
            parse_start_filter("2024-03-05T10:30:00"),
            Some(datetime!(2024-03-05 10:30:00 UTC))
        );
        assert_eq!(
            parse_end_filter("2024-03-05 10:30:00"),
            Some(datetime!(2024-03-05 10:30:00 UTC))
        );
    }

    #[test]
    fn accepts_rfc3339_with_offset() {
        assert_eq!(
            parse_start_filter("2024-03-05T10:30:00+02:00"),
            Some(datetime!(2024-03-05 08:30:00 UTC))
        );
    }

    #[test]
    fn garbage_is_ignored() {
        assert!(parse_start_filter("yesterday").is_none());
        assert!(parse_end_filter("2024-13-40").is_none());
        assert!(parse_end_filter("").is_none());
    }

    #[test]
    fn callback_url_uses_request_host() {
        assert_eq!(
            status_callback_url("bot.example.com"),
            "https://bot.example.com/status"
        );
    }
}
