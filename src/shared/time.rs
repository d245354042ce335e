use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

const SAST_OFFSET_SECS: i32 = 2 * 3600;

/// South African Standard Time (UTC+2, no daylight saving).
pub fn sast() -> FixedOffset {
    FixedOffset::east_opt(SAST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn now_sast() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&sast())
}

pub fn today_sast() -> NaiveDate {
    now_sast().date_naive()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
