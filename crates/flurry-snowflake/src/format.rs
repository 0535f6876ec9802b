//! Small text helpers used when rendering serials.

use jiff::Timestamp;

/// Which side of the text receives the fill characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pad {
    Left,
    Right,
}

/// Formats the UTC calendar day of `timestamp` as `YYYYMMDD`.
pub fn calendar_day(timestamp: Timestamp) -> String {
    timestamp.strftime("%Y%m%d").to_string()
}

/// Fits `text` to exactly `width` characters.
///
/// Shorter text is filled with `fill` on the `side` given. Longer text keeps
/// its characters nearest to that side's opposite end, so left padding
/// truncates from the right and right padding truncates from the left.
pub fn fixed_width(text: &str, width: usize, side: Pad, fill: char) -> String {
    let len = text.chars().count();
    if len >= width {
        return match side {
            Pad::Left => text.chars().take(width).collect(),
            Pad::Right => text.chars().skip(len - width).collect(),
        };
    }

    let filler: String = std::iter::repeat(fill).take(width - len).collect();
    match side {
        Pad::Left => filler + text,
        Pad::Right => text.to_owned() + &filler,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_day_is_utc() {
        let ts: Timestamp = "2024-03-05T23:59:59Z".parse().unwrap();
        assert_eq!(calendar_day(ts), "20240305");

        let ts: Timestamp = "2024-03-05T23:30:00-02:00".parse().unwrap();
        assert_eq!(calendar_day(ts), "20240306");
    }

    #[test]
    fn pads_short_text() {
        assert_eq!(fixed_width("42", 5, Pad::Left, '0'), "00042");
        assert_eq!(fixed_width("42", 5, Pad::Right, '*'), "42***");
    }

    #[test]
    fn exact_width_is_untouched() {
        assert_eq!(fixed_width("12345", 5, Pad::Left, '0'), "12345");
    }

    #[test]
    fn truncates_long_text() {
        assert_eq!(fixed_width("123456", 4, Pad::Left, '0'), "1234");
        assert_eq!(fixed_width("123456", 4, Pad::Right, '0'), "3456");
    }
}
