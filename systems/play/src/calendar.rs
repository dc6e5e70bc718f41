//! In-game date.

use std::fmt;

const MONTHS: [(&str, u32); 12] = [
    ("Jan", 31),
    ("Feb", 28),
    ("Mar", 31),
    ("Apr", 30),
    ("May", 31),
    ("Jun", 30),
    ("Jul", 31),
    ("Aug", 31),
    ("Sep", 30),
    ("Oct", 31),
    ("Nov", 30),
    ("Dec", 31),
];

/// Days in the in-game year.
pub const DAYS_PER_YEAR: u32 = 365;

/// Day counter starting on January 1st.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Calendar {
    day: u32,
}

impl Calendar {
    /// Calendar set to January 1st.
    #[must_use]
    pub const fn new() -> Self {
        Self { day: 0 }
    }

    /// Calendar set to the zero-based day of the year.
    #[must_use]
    pub const fn from_day(day: u32) -> Self {
        Self { day }
    }

    /// Zero-based day of the year; January 1st is day 0.
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// Moves to the next day.
    pub fn advance(&mut self) {
        self.day += 1;
    }

    /// Month abbreviation and one-based day of the month.
    #[must_use]
    pub fn month_day(&self) -> (&'static str, u32) {
        let mut remaining = self.day % DAYS_PER_YEAR;
        for (name, length) in MONTHS {
            if remaining < length {
                return (name, remaining + 1);
            }
            remaining -= length;
        }
        ("Dec", 31)
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (month, day) = self.month_day();
        write!(f, "{month} {day}")
    }
}
