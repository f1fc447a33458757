use jiff::{Timestamp, ToSpan, Zoned, civil::Date};

/// Calendar date of `ts` in the time zone of `now`.
pub fn local_date(ts: Timestamp, now: &Zoned) -> Date {
    ts.to_zoned(now.time_zone().clone()).date()
}

/// Sunday through Saturday of the week containing `date`, both inclusive.
pub fn week_bounds(date: Date) -> Option<(Date, Date)> {
    let days_since_sunday = i64::from(date.weekday().to_sunday_zero_offset());
    let start = date.checked_sub(days_since_sunday.days()).ok()?;
    let end = start.checked_add(6.days()).ok()?;
    Some((start, end))
}

pub fn is_due_today(due: Option<Timestamp>, now: &Zoned) -> bool {
    due.is_some_and(|due| local_date(due, now) == now.date())
}

/// Strictly before `now`; status is the caller's concern.
pub fn is_past_due(due: Option<Timestamp>, now: &Zoned) -> bool {
    due.is_some_and(|due| due < now.timestamp())
}

pub fn is_due_this_week(due: Option<Timestamp>, now: &Zoned) -> bool {
    let Some(due) = due else {
        return false;
    };
    let Some((start, end)) = week_bounds(now.date()) else {
        return false;
    };
    let date = local_date(due, now);
    start <= date && date <= end
}
