use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Wall-clock view of an instant in a named zone. The offset is derived from
/// the zone for this specific instant, so readings stay correct across DST
/// transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalParts {
    pub hour: u32,
    pub minute: u32,
    /// Stable calendar-day key ("2025-09-08"), used to gate daily jobs to at
    /// most one firing per local day.
    pub day_key: String,
    /// (month, day) ignoring year, for anniversary matching.
    pub month_day: (u32, u32),
}

pub fn local_parts(instant: DateTime<Utc>, tz: Tz) -> LocalParts {
    let local = instant.with_timezone(&tz);
    LocalParts {
        hour: local.hour(),
        minute: local.minute(),
        day_key: local.format("%Y-%m-%d").to_string(),
        month_day: (local.month(), local.day()),
    }
}

pub fn local_month_day(instant: DateTime<Utc>, tz: Tz) -> (u32, u32) {
    let local = instant.with_timezone(&tz);
    (local.month(), local.day())
}

/// Month-day key of the local calendar date `days_ahead` days from `instant`.
pub fn local_month_day_in(instant: DateTime<Utc>, tz: Tz, days_ahead: u64) -> (u32, u32) {
    let date = instant.with_timezone(&tz).date_naive();
    let ahead = date.checked_add_days(Days::new(days_ahead)).unwrap_or(date);
    (ahead.month(), ahead.day())
}

/// Feb 29 rolls over to Mar 1 in non-leap years; other (month, day) pairs are
/// always representable.
fn anniversary_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month % 12 + 1, 1))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 1, 1).unwrap())
}

/// UTC instant of the given local wall time. A DST gap (the skipped hour)
/// resolves forward to the next representable hour; an ambiguous wall time
/// (the repeated hour) resolves to its earlier occurrence.
pub fn zoned_instant(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    for h in hour..24 {
        match tz.with_ymd_and_hms(date.year(), date.month(), date.day(), h, minute, 0) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return dt.with_timezone(&Utc)
            }
            LocalResult::None => continue,
        }
    }
    // whole remainder of the day skipped; cannot happen for real zones
    Utc.from_utc_datetime(&date.and_hms_opt(hour.min(23), minute, 0).unwrap())
}

/// Next occurrence of the birthday's local month-day at the fixed local hour:
/// this year when still ahead of `now`, otherwise next year.
pub fn next_birthday_occurrence(
    birthday: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: Tz,
    hour: u32,
) -> DateTime<Utc> {
    let (month, day) = local_month_day(birthday, tz);
    let year = now.with_timezone(&tz).year();
    let this_year = zoned_instant(tz, anniversary_date(year, month, day), hour, 0);
    if this_year > now {
        this_year
    } else {
        zoned_instant(tz, anniversary_date(year + 1, month, day), hour, 0)
    }
}

/// 12:00 UTC of the instant's UTC calendar date. Hire dates are pinned to
/// midday so rendering them in nearby zones never drifts across a date line.
pub fn utc_noon_of(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&instant.date_naive().and_hms_opt(12, 0, 0).unwrap())
}
