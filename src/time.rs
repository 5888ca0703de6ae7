#[cfg(feature = "chrono")]
use chrono::{NaiveDate, NaiveDateTime};

/// A DOS compatible date.
///
/// Values are decoded as stored, so a zeroed field yields day 0 of month 0 of 1980.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Date {
    /// Full year - [1980, 2107]
    pub year: u16,
    /// Month of the year - [1, 12] on a sane volume
    pub month: u16,
    /// Day of the month - [1, 31] on a sane volume
    pub day: u16,
}

impl Date {
    pub fn decode(dos_date: u16) -> Self {
        let (year, month, day) = ((dos_date >> 9) + 1980, (dos_date >> 5) & 0xF, dos_date & 0x1F);
        Date { year, month, day }
    }

    /// Packs the date; years outside [1980, 2107] are clamped to the nearest representable one.
    pub fn encode(&self) -> u16 {
        let year = self.year.clamp(1980, 2107) - 1980;
        (year << 9) | ((self.month & 0xF) << 5) | (self.day & 0x1F)
    }
}

/// A DOS compatible time with two second resolution.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Time {
    /// Hours after midnight - [0, 23]
    pub hour: u16,
    /// Minutes after the hour - [0, 59]
    pub min: u16,
    /// Seconds after the minute - [0, 58], always even
    pub sec: u16,
}

impl Time {
    pub fn decode(dos_time: u16) -> Self {
        let hour = dos_time >> 11;
        let min = (dos_time >> 5) & 0x3F;
        let sec = (dos_time & 0x1F) * 2;
        Time { hour, min, sec }
    }

    pub fn encode(&self) -> u16 {
        ((self.hour & 0x1F) << 11) | ((self.min & 0x3F) << 5) | ((self.sec / 2) & 0x1F)
    }
}

/// A DOS compatible date and time.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct DateTime {
    /// A date part
    pub date: Date,
    // A time part
    pub time: Time,
}

impl DateTime {
    pub fn decode(dos_date: u16, dos_time: u16) -> Self {
        DateTime { date: Date::decode(dos_date), time: Time::decode(dos_time) }
    }
}

#[cfg(feature = "chrono")]
impl Date {
    /// Converts to a calendar date, or `None` when the stored fields do not form one.
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))
    }
}

#[cfg(feature = "chrono")]
impl DateTime {
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        self.date.to_naive()?.and_hms_opt(
            u32::from(self.time.hour),
            u32::from(self.time.min),
            u32::from(self.time.sec),
        )
    }
}
