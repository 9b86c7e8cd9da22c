use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::error::{Reason, TimestampError};

// get a character from the bytes as a decimal
macro_rules! get_digit {
    ($bytes:ident, $index:expr, $reason:ident) => {
        match $bytes.get($index) {
            Some(c) if c.is_ascii_digit() => (c - b'0') as u32,
            _ => return Err(Reason::$reason),
        }
    };
}

/// Parse the TIMESTAMP field of a RFC 5424 header.
///
/// `-` is the NILVALUE and yields `None`. Anything else must be a RFC 3339
/// timestamp with seconds and an explicit offset. Fractional seconds may be
/// of any length, digits past nanosecond precision are truncated.
pub fn parse_timestamp(token: &str) -> Result<Option<DateTime<FixedOffset>>, TimestampError> {
    if token == "-" {
        return Ok(None);
    }

    parse_rfc3339(token.as_bytes())
        .map(Some)
        .map_err(|reason| TimestampError::malformed(token, reason))
}

fn parse_rfc3339(buf: &[u8]) -> Result<DateTime<FixedOffset>, Reason> {
    let (year, month, day) = parse_date(buf)?;

    match buf.get(10) {
        Some(b'T') | Some(b't') => {}
        Some(_) => return Err(Reason::InvalidCharDateTimeSep),
        None => return Err(Reason::TooShort),
    }

    let (hour, minute, second, nanos, position) = parse_time(buf, 11)?;
    let (offset, position) = parse_offset(buf, position)?;
    if buf.len() > position {
        return Err(Reason::ExtraCharacters);
    }

    let offset = FixedOffset::east_opt(offset).ok_or(Reason::OutOfRangeTimezone)?;
    let datetime = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(Reason::OutOfRangeDay)?
        .and_hms_nano_opt(hour, minute, second, nanos)
        .ok_or(Reason::OutOfRangeSecond)?;

    datetime
        .and_local_timezone(offset)
        .single()
        .ok_or(Reason::OutOfRangeTimezone)
}

fn parse_date(buf: &[u8]) -> Result<(i32, u32, u32), Reason> {
    if buf.len() < 10 {
        return Err(Reason::TooShort);
    }

    let year = get_digit!(buf, 0, InvalidCharDate) * 1000
        + get_digit!(buf, 1, InvalidCharDate) * 100
        + get_digit!(buf, 2, InvalidCharDate) * 10
        + get_digit!(buf, 3, InvalidCharDate);
    if buf[4] != b'-' {
        return Err(Reason::InvalidCharDate);
    }

    let month = get_digit!(buf, 5, InvalidCharDate) * 10 + get_digit!(buf, 6, InvalidCharDate);
    if buf[7] != b'-' {
        return Err(Reason::InvalidCharDate);
    }

    let day = get_digit!(buf, 8, InvalidCharDate) * 10 + get_digit!(buf, 9, InvalidCharDate);

    let year = year as i32;
    // calculate the maximum number of days in the month, accounting for leap years in the
    // gregorian calendar
    let max_days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => return Err(Reason::OutOfRangeMonth),
    };

    if day < 1 || day > max_days {
        return Err(Reason::OutOfRangeDay);
    }

    Ok((year, month, day))
}

/// Parse `HH:MM:SS[.fraction]` starting at `offset`.
///
/// Returns hour, minute, second, nanosecond and the position of the cursor
/// after the time.
fn parse_time(buf: &[u8], offset: usize) -> Result<(u32, u32, u32, u32, usize), Reason> {
    if buf.len() < offset + 8 {
        return Err(Reason::TooShort);
    }

    let hour = get_digit!(buf, offset, InvalidCharTime) * 10
        + get_digit!(buf, offset + 1, InvalidCharTime);
    if hour > 23 {
        return Err(Reason::OutOfRangeHour);
    }
    if buf[offset + 2] != b':' {
        return Err(Reason::InvalidCharTime);
    }

    let minute = get_digit!(buf, offset + 3, InvalidCharTime) * 10
        + get_digit!(buf, offset + 4, InvalidCharTime);
    if minute > 59 {
        return Err(Reason::OutOfRangeMinute);
    }
    if buf[offset + 5] != b':' {
        return Err(Reason::InvalidCharTime);
    }

    let second = get_digit!(buf, offset + 6, InvalidCharTime) * 10
        + get_digit!(buf, offset + 7, InvalidCharTime);
    if second > 59 {
        return Err(Reason::OutOfRangeSecond);
    }

    let mut position = offset + 8;
    let mut nanos = 0u32;
    if buf.get(position) == Some(&b'.') {
        position += 1;
        let mut count = 0usize;
        while let Some(c) = buf.get(position + count).filter(|c| c.is_ascii_digit()) {
            // anything past nanosecond precision is truncated
            if count < 9 {
                nanos = nanos * 10 + (c - b'0') as u32;
            }
            count += 1;
        }

        if count == 0 {
            return Err(Reason::SecondFractionMissing);
        }
        if count < 9 {
            nanos *= 10u32.pow(9 - count as u32);
        }
        position += count;
    }

    Ok((hour, minute, second, nanos, position))
}

/// Parse `Z` or `±HH:MM`, returning the offset in seconds east of UTC and
/// the position after it.
fn parse_offset(buf: &[u8], position: usize) -> Result<(i32, usize), Reason> {
    let sign = match buf.get(position) {
        Some(b'Z') | Some(b'z') => return Ok((0, position + 1)),
        Some(b'+') => 1,
        Some(b'-') => -1,
        Some(_) => return Err(Reason::InvalidCharTzSign),
        None => return Err(Reason::MissingOffset),
    };

    let hours = get_digit!(buf, position + 1, InvalidCharTzHour) * 10
        + get_digit!(buf, position + 2, InvalidCharTzHour);
    if buf.get(position + 3) != Some(&b':') {
        return Err(Reason::InvalidCharTzMinute);
    }
    let minutes = get_digit!(buf, position + 4, InvalidCharTzMinute) * 10
        + get_digit!(buf, position + 5, InvalidCharTzMinute);

    if hours > 23 || minutes > 59 {
        return Err(Reason::OutOfRangeTimezone);
    }

    let seconds = (hours * 3600 + minutes * 60) as i32;
    Ok((sign * seconds, position + 6))
}
