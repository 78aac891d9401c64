use chrono::NaiveDateTime;
use std::fmt;

/// Date of a mailbox boundary line.
///
/// Records split without a date format keep the raw string. A single fetch
/// never mixes the two variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MailDate {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl fmt::Display for MailDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailDate::Parsed(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            MailDate::Raw(s) => f.write_str(s),
        }
    }
}

/// One message of a flat mailbox: the boundary date plus the raw bytes up to
/// the next boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct MailRecord {
    pub date: MailDate,
    pub content: Vec<u8>,
}
