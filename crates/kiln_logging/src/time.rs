use core::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp (UTC) attached to each log message
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TimeStamp {
    pub year        : u16,
    pub month       : u8,
    pub day         : u8,
    pub hour        : u8,
    pub minute      : u8,
    pub second      : u8,
    pub millisecond : u16,
}

impl TimeStamp {
    /// Create a timestamp from the number of milliseconds since the unix epoch
    pub fn from_unix_millis(millis: u64) -> Self {
        let days = (millis / 86_400_000) as i64;
        let ms_of_day = millis % 86_400_000;

        // Civil-from-days conversion, valid for the whole range of a u64 millisecond count we care about
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

        Self {
            year: year as u16,
            month: month as u8,
            day: day as u8,
            hour: (ms_of_day / 3_600_000) as u8,
            minute: (ms_of_day / 60_000 % 60) as u8,
            second: (ms_of_day / 1000 % 60) as u8,
            millisecond: (ms_of_day % 1000) as u16,
        }
    }
}

// TODO: customizable formatter
impl Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}", self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond))
    }
}

/// Get the current timestamp
pub fn get_timestamp() -> TimeStamp {
    // A clock before the epoch just shows up as the epoch itself
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |dur| dur.as_millis() as u64);
    TimeStamp::from_unix_millis(millis)
}
