use chrono::{Datelike, Days, Months, NaiveDate};

/// Every date from `start` to `end` inclusive. Empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

pub fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// CUR billing period label, `YYYYMM01-YYYYMM01`.
pub fn billing_period_str(d: NaiveDate) -> String {
    let start = month_start(d);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    format!("{}-{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
}

pub fn days_before(d: NaiveDate, days: u32) -> NaiveDate {
    d.checked_sub_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MIN)
}

pub fn days_after(d: NaiveDate, days: u32) -> NaiveDate {
    d.checked_add_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MAX)
}

/// Monday of the ISO week containing `d`.
pub fn week_start(d: NaiveDate) -> NaiveDate {
    days_before(d, d.weekday().num_days_from_monday())
}
