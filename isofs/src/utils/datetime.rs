//! Date/time parsing
//!
//! Three on-disk encodings exist: the 7-byte ISO 9660 directory record time,
//! the 17-byte ASCII volume descriptor time, and the 12-byte UDF timestamp.
//! Each decodes into its broken-down form first (so callers can ask whether
//! the recorded fields are in range), then normalises into a [`Timestamp`]
//! with out-of-range fields clamped.

/// Normalised point in time: UTC seconds since 1970 plus the recorded zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since 1970-01-01T00:00:00Z
    pub seconds: i64,

    /// Sub-second part
    pub nanoseconds: u32,

    /// Offset of the recording time zone from UTC, in minutes
    pub utc_offset_minutes: i16,
}

impl Timestamp {
    /// 1970-01-01T00:00:00Z
    pub const EPOCH: Self = Self {
        seconds: 0,
        nanoseconds: 0,
        utc_offset_minutes: 0,
    };

    /// Build from civil local time fields. Fields are clamped into range.
    #[allow(clippy::too_many_arguments)]
    pub fn from_civil(
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        nanoseconds: u32,
        utc_offset_minutes: i16,
    ) -> Self {
        let month = month.clamp(1, 12);
        let day = day.clamp(1, days_in_month(year, month));
        let hour = hour.min(23);
        let minute = minute.min(59);
        let second = second.min(59);

        let days = days_from_civil(year as i64, month as u32, day as u32);
        let local = days * 86_400 + hour as i64 * 3_600 + minute as i64 * 60 + second as i64;
        Self {
            seconds: local - utc_offset_minutes as i64 * 60,
            nanoseconds: nanoseconds.min(999_999_999),
            utc_offset_minutes,
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::EPOCH
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 of a proleptic Gregorian date
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let month_index = (month + 9) % 12;
    let day_of_year = (153 * month_index as i64 + 2) / 5 + day as i64 - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// 7-byte directory record datetime
#[derive(Debug, Clone, Copy)]
pub struct DateTime7 {
    /// Years since 1900
    pub year: u8,

    /// Month (1-12)
    pub month: u8,

    /// Day (1-31)
    pub day: u8,

    /// Hour (0-23)
    pub hour: u8,

    /// Minute (0-59)
    pub minute: u8,

    /// Second (0-59)
    pub second: u8,

    /// GMT offset in 15-minute intervals (-48 to +52)
    pub gmt_offset: i8,
}

impl DateTime7 {
    /// Parse from 7-byte array
    pub fn from_bytes(bytes: &[u8; 7]) -> Self {
        Self {
            year: bytes[0],
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
            gmt_offset: bytes[6] as i8,
        }
    }

    /// Get full year (1900 + year)
    pub fn full_year(&self) -> u16 {
        1900 + self.year as u16
    }

    /// Whether every recorded field is in range
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
            && (-48..=52).contains(&self.gmt_offset)
    }

    /// Normalise, clamping out-of-range fields
    pub fn to_timestamp(&self) -> Timestamp {
        let offset = self.gmt_offset.clamp(-48, 52) as i16 * 15;
        Timestamp::from_civil(
            self.full_year() as i32,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            0,
            offset,
        )
    }
}

/// 17-byte ASCII datetime (volume descriptors)
#[derive(Debug, Clone)]
pub struct DateTime17 {
    /// Year (4 ASCII digits)
    pub year: u16,

    /// Month (2 ASCII digits, 1-12)
    pub month: u8,

    /// Day (2 ASCII digits, 1-31)
    pub day: u8,

    /// Hour (2 ASCII digits, 0-23)
    pub hour: u8,

    /// Minute (2 ASCII digits, 0-59)
    pub minute: u8,

    /// Second (2 ASCII digits, 0-59)
    pub second: u8,

    /// Hundredths (2 ASCII digits)
    pub hundredths: u8,

    /// GMT offset in 15-minute intervals
    pub gmt_offset: i8,
}

impl DateTime17 {
    /// Parse from 17-byte ASCII string. `None` if a digit position holds
    /// something other than an ASCII digit.
    pub fn from_bytes(bytes: &[u8; 17]) -> Option<Self> {
        fn digits(s: &[u8]) -> Option<u16> {
            s.iter().try_fold(0u16, |acc, &c| {
                c.is_ascii_digit().then(|| acc * 10 + (c - b'0') as u16)
            })
        }

        Some(Self {
            year: digits(&bytes[0..4])?,
            month: digits(&bytes[4..6])? as u8,
            day: digits(&bytes[6..8])? as u8,
            hour: digits(&bytes[8..10])? as u8,
            minute: digits(&bytes[10..12])? as u8,
            second: digits(&bytes[12..14])? as u8,
            hundredths: digits(&bytes[14..16])? as u8,
            gmt_offset: bytes[16] as i8,
        })
    }

    /// Whether every recorded field is in range. An all-zero date
    /// ("not specified") is not valid.
    pub fn is_valid(&self) -> bool {
        (1..=9999).contains(&self.year)
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
            && self.hundredths < 100
            && (-48..=52).contains(&self.gmt_offset)
    }

    /// Normalise, clamping out-of-range fields
    pub fn to_timestamp(&self) -> Timestamp {
        Timestamp::from_civil(
            self.year as i32,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.hundredths.min(99) as u32 * 10_000_000,
            self.gmt_offset.clamp(-48, 52) as i16 * 15,
        )
    }
}

/// 12-byte UDF timestamp (ECMA-167 1/7.3)
#[derive(Debug, Clone, Copy)]
pub struct UdfTimestamp {
    /// Timestamp type (upper 4 bits of the first word)
    pub kind: u8,
    /// Zone offset in minutes, or [`UdfTimestamp::NO_TIME_ZONE`]
    pub utc_offset_minutes: i16,
    /// Year
    pub year: i16,
    /// Month (1-12)
    pub month: u8,
    /// Day (1-31)
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59, 60 allowed for leap seconds)
    pub second: u8,
    /// Centiseconds (0-99)
    pub centiseconds: u8,
    /// Hundreds of microseconds (0-99)
    pub hundreds_of_microseconds: u8,
    /// Microseconds (0-99)
    pub microseconds: u8,
}

impl UdfTimestamp {
    /// Zone offset value meaning "not specified"
    pub const NO_TIME_ZONE: i16 = -2047;

    /// Parse from 12 bytes
    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let type_and_zone = u16::from_le_bytes([bytes[0], bytes[1]]);
        // Sign-extend the 12-bit zone field.
        let zone = ((type_and_zone << 4) as i16) >> 4;
        Self {
            kind: (type_and_zone >> 12) as u8,
            utc_offset_minutes: zone,
            year: i16::from_le_bytes([bytes[2], bytes[3]]),
            month: bytes[4],
            day: bytes[5],
            hour: bytes[6],
            minute: bytes[7],
            second: bytes[8],
            centiseconds: bytes[9],
            hundreds_of_microseconds: bytes[10],
            microseconds: bytes[11],
        }
    }

    /// Whether every recorded field is in range
    pub fn is_valid(&self) -> bool {
        let zone_ok = self.utc_offset_minutes == Self::NO_TIME_ZONE
            || (-1440..=1440).contains(&self.utc_offset_minutes);
        zone_ok
            && (1..=9999).contains(&self.year)
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second <= 60
            && self.centiseconds < 100
            && self.hundreds_of_microseconds < 100
            && self.microseconds < 100
    }

    /// Normalise, clamping out-of-range fields
    pub fn to_timestamp(&self) -> Timestamp {
        let zone = if self.utc_offset_minutes == Self::NO_TIME_ZONE {
            0
        } else {
            self.utc_offset_minutes.clamp(-1440, 1440)
        };
        let nanoseconds = self.centiseconds.min(99) as u32 * 10_000_000
            + self.hundreds_of_microseconds.min(99) as u32 * 100_000
            + self.microseconds.min(99) as u32 * 1_000;
        Timestamp::from_civil(
            self.year.clamp(1, 9999) as i32,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            nanoseconds,
            zone,
        )
    }
}
