//! Typed time-of-day input (`9:30 AM`, `12:05pm`, `7am`).
//!
//! Characters are fed one at a time so an editor can reject a keystroke as
//! soon as it makes the input invalid.

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("No time entered")]
    Empty,

    #[error("Hour {0} is out of range (1-12)")]
    InvalidHour(u32),

    #[error("Minute {0} is out of range (0-59)")]
    InvalidMinute(u32),

    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("Missing AM or PM")]
    MissingPeriod,

    #[error("Incomplete time")]
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Hour { value: u32, digits: u8 },
    HourColon { hour: u32 },
    HourColonMinute { hour: u32, minute: u32, digits: u8 },
    WithPeriod { hour: u32, minute: u32, pm: bool, saw_m: bool },
}

#[derive(Debug, Clone)]
pub struct TimeInputParser {
    state: State,
    // Whitespace is only allowed between the digits and the period
    after_space: bool,
}

impl Default for TimeInputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeInputParser {
    pub fn new() -> Self {
        TimeInputParser {
            state: State::Empty,
            after_space: false,
        }
    }

    /// Feed one character. On error the parser keeps its previous state.
    pub fn feed(&mut self, c: char) -> Result<(), TimeParseError> {
        if c.is_whitespace() {
            return match self.state {
                State::Empty | State::Hour { .. } | State::HourColonMinute { .. } => {
                    if !matches!(self.state, State::Empty) {
                        self.after_space = true;
                    }
                    Ok(())
                }
                _ => Err(TimeParseError::UnexpectedChar(c)),
            };
        }

        let period = period_of(c);
        let in_period = matches!(self.state, State::WithPeriod { .. });
        if self.after_space && period.is_none() && !in_period {
            return Err(TimeParseError::UnexpectedChar(c));
        }

        self.state = match (self.state, c.to_digit(10), period) {
            (State::Empty, Some(d), _) => State::Hour { value: d, digits: 1 },

            (State::Hour { value, digits: 1 }, Some(d), _) => {
                let value = value * 10 + d;
                if value > 12 {
                    return Err(TimeParseError::InvalidHour(value));
                }
                State::Hour { value, digits: 2 }
            }
            (State::Hour { value, .. }, None, None) if c == ':' => State::HourColon {
                hour: check_hour(value)?,
            },
            (State::Hour { value, .. }, None, Some(pm)) => State::WithPeriod {
                hour: check_hour(value)?,
                minute: 0,
                pm,
                saw_m: false,
            },

            (State::HourColon { hour }, Some(d), _) => State::HourColonMinute {
                hour,
                minute: d,
                digits: 1,
            },

            (State::HourColonMinute { hour, minute, digits: 1 }, Some(d), _) => {
                let minute = minute * 10 + d;
                if minute > 59 {
                    return Err(TimeParseError::InvalidMinute(minute));
                }
                State::HourColonMinute {
                    hour,
                    minute,
                    digits: 2,
                }
            }
            (State::HourColonMinute { digits: 1, .. }, None, Some(_)) => {
                return Err(TimeParseError::Incomplete);
            }
            (State::HourColonMinute { hour, minute, .. }, None, Some(pm)) => State::WithPeriod {
                hour,
                minute,
                pm,
                saw_m: false,
            },

            (
                State::WithPeriod {
                    hour,
                    minute,
                    pm,
                    saw_m: false,
                },
                None,
                None,
            ) if c.eq_ignore_ascii_case(&'m') => State::WithPeriod {
                hour,
                minute,
                pm,
                saw_m: true,
            },

            _ => return Err(TimeParseError::UnexpectedChar(c)),
        };
        Ok(())
    }

    pub fn finish(&self) -> Result<NaiveTime, TimeParseError> {
        match self.state {
            State::Empty => Err(TimeParseError::Empty),
            State::Hour { .. } => Err(TimeParseError::MissingPeriod),
            State::HourColon { .. } | State::HourColonMinute { digits: 1, .. } => {
                Err(TimeParseError::Incomplete)
            }
            State::HourColonMinute { .. } => Err(TimeParseError::MissingPeriod),
            State::WithPeriod {
                hour, minute, pm, ..
            } => {
                let hour24 = hour % 12 + if pm { 12 } else { 0 };
                NaiveTime::from_hms_opt(hour24, minute, 0).ok_or(TimeParseError::Incomplete)
            }
        }
    }
}

fn period_of(c: char) -> Option<bool> {
    match c.to_ascii_lowercase() {
        'a' => Some(false),
        'p' => Some(true),
        _ => None,
    }
}

fn check_hour(hour: u32) -> Result<u32, TimeParseError> {
    if (1..=12).contains(&hour) {
        Ok(hour)
    } else {
        Err(TimeParseError::InvalidHour(hour))
    }
}

/// Parse a whole typed time such as `9:30 AM`.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, TimeParseError> {
    let mut parser = TimeInputParser::new();
    for c in input.chars() {
        parser.feed(c)?;
    }
    parser.finish()
}

/// Display form used by editors, e.g. `9:05 AM`.
pub fn format_time_of_day(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        time.minute(),
        if pm { "PM" } else { "AM" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_common_forms() {
        assert_eq!(parse_time_of_day("9:30 AM"), Ok(t(9, 30)));
        assert_eq!(parse_time_of_day("9:30am"), Ok(t(9, 30)));
        assert_eq!(parse_time_of_day("12:05 pm"), Ok(t(12, 5)));
        assert_eq!(parse_time_of_day("12:00 AM"), Ok(t(0, 0)));
        assert_eq!(parse_time_of_day("7p"), Ok(t(19, 0)));
        assert_eq!(parse_time_of_day("  10:15 PM"), Ok(t(22, 15)));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert_eq!(parse_time_of_day("13:00 PM"), Err(TimeParseError::InvalidHour(13)));
        assert_eq!(parse_time_of_day("0:30 AM"), Err(TimeParseError::InvalidHour(0)));
        assert_eq!(parse_time_of_day("9:60 AM"), Err(TimeParseError::InvalidMinute(60)));
    }

    #[test]
    fn reports_incomplete_input() {
        assert_eq!(parse_time_of_day(""), Err(TimeParseError::Empty));
        assert_eq!(parse_time_of_day("9"), Err(TimeParseError::MissingPeriod));
        assert_eq!(parse_time_of_day("9:"), Err(TimeParseError::Incomplete));
        assert_eq!(parse_time_of_day("9:3"), Err(TimeParseError::Incomplete));
        assert_eq!(parse_time_of_day("9:3pm"), Err(TimeParseError::Incomplete));
        assert_eq!(parse_time_of_day("9:30"), Err(TimeParseError::MissingPeriod));
    }

    #[test]
    fn rejects_stray_characters() {
        assert_eq!(parse_time_of_day("9.30 AM"), Err(TimeParseError::UnexpectedChar('.')));
        assert_eq!(parse_time_of_day("1 2:00 PM"), Err(TimeParseError::UnexpectedChar('2')));
        assert_eq!(parse_time_of_day("9:30 AMM"), Err(TimeParseError::UnexpectedChar('M')));
        assert_eq!(parse_time_of_day("9:300"), Err(TimeParseError::UnexpectedChar('0')));
    }

    #[test]
    fn failed_keystroke_keeps_previous_state() {
        let mut parser = TimeInputParser::new();
        for c in "11:4".chars() {
            parser.feed(c).unwrap();
        }
        assert!(parser.feed('x').is_err());
        parser.feed('5').unwrap();
        parser.feed('P').unwrap();
        assert_eq!(parser.finish(), Ok(t(23, 45)));
    }

    #[test]
    fn display_form() {
        assert_eq!(format_time_of_day(t(9, 5)), "9:05 AM");
        assert_eq!(format_time_of_day(t(0, 0)), "12:00 AM");
        assert_eq!(format_time_of_day(t(13, 30)), "1:30 PM");
    }
}
