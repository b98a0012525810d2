//! PDF date strings: `D:YYYYMMDDHHmmSSOHH'mm'` (ISO 32000-1 §7.9.4), used by
//! `/CreationDate` and `/ModDate` in the Info dictionary. Parsing is hand
//! rolled — the format is fixed-width and simple enough that pulling in a
//! calendar crate for it would be overkill — but conversion to the
//! project's optional date/time crates is provided for callers who already
//! use one of them.

use std::fmt;

/// A parsed PDF date. All fields are zero-indexed where the PDF format is
/// (it isn't, except that month/day keep their natural 1-based values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset from UTC in minutes; `None` means the producer omitted the
    /// relationship entirely (treat as local/unspecified, per spec note).
    pub utc_offset_minutes: Option<i32>,
}

impl PdfDate {
    /// Parses `D:YYYYMMDDHHmmSSOHH'mm'`. The `D:` prefix, and every field
    /// after the 4-digit year, is optional and defaults to the minimum
    /// valid value (month/day default to 1, everything else to 0) per the
    /// spec's note that producers may truncate the string at any point.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix("D:").unwrap_or(s);
        if s.len() < 4 {
            return None;
        }
        let year: i32 = s[0..4].parse().ok()?;
        let digit_field = |s: &str, range: std::ops::Range<usize>, default: u8| -> Option<u8> {
            if s.len() < range.end {
                Some(default)
            } else {
                s[range].parse().ok()
            }
        };
        let month = digit_field(s, 4..6, 1)?;
        let day = digit_field(s, 6..8, 1)?;
        let hour = digit_field(s, 8..10, 0)?;
        let minute = digit_field(s, 10..12, 0)?;
        let second = digit_field(s, 12..14, 0)?;

        let utc_offset_minutes = if s.len() <= 14 {
            None
        } else {
            match s.as_bytes()[14] {
                b'Z' => Some(0),
                sign @ (b'+' | b'-') => {
                    let oh: i32 = s.get(15..17)?.parse().ok()?;
                    let om: i32 = if s.len() >= 20 { s[18..20].parse().ok()? } else { 0 };
                    let magnitude = oh * 60 + om;
                    Some(if sign == b'-' { -magnitude } else { magnitude })
                }
                _ => None,
            }
        };

        Some(PdfDate {
            year,
            month,
            day,
            hour,
            minute,
            second,
            utc_offset_minutes,
        })
    }

    #[cfg(feature = "chrono")]
    pub fn to_chrono(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        use chrono::{FixedOffset, TimeZone};
        let offset = FixedOffset::east_opt(self.utc_offset_minutes.unwrap_or(0) * 60)?;
        offset
            .with_ymd_and_hms(
                self.year,
                self.month as u32,
                self.day as u32,
                self.hour as u32,
                self.minute as u32,
                self.second as u32,
            )
            .single()
    }

    #[cfg(feature = "time")]
    pub fn to_time(&self) -> Option<time::OffsetDateTime> {
        let month = time::Month::try_from(self.month).ok()?;
        let date = time::Date::from_calendar_date(self.year, month, self.day).ok()?;
        let time = time::Time::from_hms(self.hour, self.minute, self.second).ok()?;
        let offset = time::UtcOffset::from_whole_seconds(self.utc_offset_minutes.unwrap_or(0) * 60).ok()?;
        Some(time::PrimitiveDateTime::new(date, time).assume_offset(offset))
    }

    #[cfg(feature = "jiff")]
    pub fn to_jiff(&self) -> Option<jiff::Zoned> {
        let offset_secs = self.utc_offset_minutes.unwrap_or(0) * 60;
        let tz = jiff::tz::TimeZone::fixed(jiff::tz::Offset::from_seconds(offset_secs).ok()?);
        jiff::civil::Date::new(self.year as i16, self.month as i8, self.day as i8)
            .ok()?
            .at(self.hour as i8, self.minute as i8, self.second as i8, 0)
            .to_zoned(tz)
            .ok()
    }
}

impl fmt::Display for PdfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "D:{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        match self.utc_offset_minutes {
            None => Ok(()),
            Some(0) => write!(f, "Z"),
            Some(offset) => {
                let sign = if offset < 0 { '-' } else { '+' };
                let offset = offset.abs();
                write!(f, "{sign}{:02}'{:02}'", offset / 60, offset % 60)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_date_with_offset() {
        let date = PdfDate::parse("D:20231225143000+05'30'").unwrap();
        assert_eq!(date.year, 2023);
        assert_eq!(date.month, 12);
        assert_eq!(date.day, 25);
        assert_eq!(date.hour, 14);
        assert_eq!(date.minute, 30);
        assert_eq!(date.second, 0);
        assert_eq!(date.utc_offset_minutes, Some(5 * 60 + 30));
    }

    #[test]
    fn parses_truncated_date() {
        let date = PdfDate::parse("D:2023").unwrap();
        assert_eq!(date.year, 2023);
        assert_eq!(date.month, 1);
        assert_eq!(date.day, 1);
        assert_eq!(date.utc_offset_minutes, None);
    }

    #[test]
    fn round_trips_through_display() {
        let date = PdfDate::parse("D:20200101000000Z").unwrap();
        assert_eq!(date.to_string(), "D:20200101000000Z");
    }
}
