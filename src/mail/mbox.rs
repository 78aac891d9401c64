use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use log::debug;
use regex::bytes::{CaptureMatches, Regex};

use crate::domain::mail::{MailDate, MailRecord};
use crate::error::{Error, Result};

/// Format of the date on a `From - ` line, e.g. `Mon Oct 10 16:40:28 2016`.
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

static BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^From - (.*?)\r?\n").expect("boundary pattern is valid"));

/// Splits a flat mailbox into [`MailRecord`]s.
///
/// Works on raw bytes so 8-bit bodies reach the MIME parser unchanged. The
/// boundary pattern must have exactly one capture group holding the date.
#[derive(Debug, Clone)]
pub struct MailboxSplitter {
    boundary: Regex,
    date_format: Option<String>,
}

impl Default for MailboxSplitter {
    fn default() -> Self {
        Self {
            boundary: BOUNDARY.clone(),
            date_format: Some(DATE_FORMAT.to_string()),
        }
    }
}

impl MailboxSplitter {
    pub fn new(boundary: Regex) -> Self {
        Self {
            boundary,
            ..Self::default()
        }
    }

    /// `None` (or an empty format) keeps boundary dates as raw strings.
    pub fn with_date_format(mut self, date_format: Option<&str>) -> Self {
        self.date_format = date_format.filter(|f| !f.is_empty()).map(str::to_string);
        self
    }

    /// Lazily split `text`. Anything before the first boundary is ignored.
    pub fn split<'s, 't, T>(&'s self, text: &'t T) -> Mails<'s, 't>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        let mut fragments = Fragments::new(&self.boundary, text.as_ref());
        fragments.next();
        Mails {
            fragments,
            date_format: self.date_format.as_deref(),
        }
    }

    /// Read the mailbox at `path` and return its mails sorted by date.
    pub fn fetch_mails(&self, path: &Path) -> Result<Vec<MailRecord>> {
        let raw = fs::read(path)?;
        let mut mails = self.split(&raw).collect::<Result<Vec<_>>>()?;
        mails.sort_by(|a, b| a.date.cmp(&b.date));
        debug!("read {} mails from {}", mails.len(), path.display());
        Ok(mails)
    }
}

/// Mails of the default mailbox layout at `path`, oldest first.
pub fn fetch_mails(path: &Path) -> Result<Vec<MailRecord>> {
    MailboxSplitter::default().fetch_mails(path)
}

/// Byte fragments as a regex split with one capture group produces them:
/// leading text, then alternating captured date and body.
pub struct Fragments<'r, 't> {
    text: &'t [u8],
    captures: CaptureMatches<'r, 't>,
    last: usize,
    pending: Option<&'t [u8]>,
    done: bool,
}

impl<'r, 't> Fragments<'r, 't> {
    pub fn new(boundary: &'r Regex, text: &'t [u8]) -> Self {
        Self {
            text,
            captures: boundary.captures_iter(text),
            last: 0,
            pending: None,
            done: false,
        }
    }
}

impl<'t> Iterator for Fragments<'_, 't> {
    type Item = &'t [u8];

    fn next(&mut self) -> Option<&'t [u8]> {
        if let Some(date) = self.pending.take() {
            return Some(date);
        }
        if self.done {
            return None;
        }
        match self.captures.next() {
            Some(caps) => {
                let whole = caps.get(0)?;
                let fragment = &self.text[self.last..whole.start()];
                self.last = whole.end();
                self.pending = Some(caps.get(1).map_or(&b""[..], |m| m.as_bytes()));
                Some(fragment)
            }
            None => {
                self.done = true;
                Some(&self.text[self.last..])
            }
        }
    }
}

/// Iterator over the mails of one mailbox.
pub struct Mails<'s, 't> {
    fragments: Fragments<'s, 't>,
    date_format: Option<&'s str>,
}

impl Iterator for Mails<'_, '_> {
    type Item = Result<MailRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        grab_one_mail(&mut self.fragments, self.date_format)
    }
}

/// Take a date fragment and a body fragment and build a [`MailRecord`].
///
/// Returns `None` unless two fragments are left; a lone trailing fragment is dropped.
pub fn grab_one_mail<I>(fragments: &mut I, date_format: Option<&str>) -> Option<Result<MailRecord>>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    let date = fragments.next()?;
    let content = fragments.next()?;
    Some(parse_date(date.as_ref(), date_format).map(|date| MailRecord {
        date,
        content: content.as_ref().to_vec(),
    }))
}

/// Boundary dates are ASCII in practice; a stray byte fails the parse or
/// shows up replaced in a raw date.
fn parse_date(value: &[u8], date_format: Option<&str>) -> Result<MailDate> {
    let value = String::from_utf8_lossy(value);
    match date_format.filter(|f| !f.is_empty()) {
        Some(format) => NaiveDateTime::parse_from_str(&value, format)
            .map(MailDate::Parsed)
            .map_err(|source| Error::Parse {
                value: value.to_string(),
                format: format.to_string(),
                source,
            }),
        None => Ok(MailDate::Raw(value.into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE_DATE: &str = "Mon Oct 10 16:40:28 2016";

    #[test]
    fn parses_sample_date() {
        let date = NaiveDateTime::parse_from_str(SAMPLE_DATE, DATE_FORMAT).unwrap();
        assert_eq!(date.year(), 2016);
        assert_eq!(date.month(), 10);
        assert_eq!(date.day(), 10);
        assert_eq!(date.hour(), 16);
        assert_eq!(date.minute(), 40);
        assert_eq!(date.second(), 28);
    }

    #[test]
    fn grabs_one_mail() {
        let mut fragments = [SAMPLE_DATE, "testcontent"].into_iter();
        let mail = grab_one_mail(&mut fragments, Some(DATE_FORMAT)).unwrap().unwrap();
        assert!(matches!(mail.date, MailDate::Parsed(_)));
        assert_eq!(mail.content, b"testcontent");
    }

    #[test]
    fn keeps_raw_date_without_format() {
        let mut fragments = ["notadate", "testcontent"].into_iter();
        let mail = grab_one_mail(&mut fragments, Some("")).unwrap().unwrap();
        assert_eq!(mail.date, MailDate::Raw("notadate".into()));
        assert_eq!(mail.content, b"testcontent");
    }

    #[test]
    fn rejects_malformed_date() {
        let mut fragments = ["notadate", "testcontent"].into_iter();
        let res = grab_one_mail(&mut fragments, Some(DATE_FORMAT)).unwrap();
        assert!(matches!(res, Err(Error::Parse { .. })));
    }

    #[test]
    fn splits_with_custom_pattern() {
        let splitter = MailboxSplitter::new(Regex::new("@([0-9]*)").unwrap()).with_date_format(None);
        let mails: Vec<_> = splitter
            .split("@2eins@3zwei")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].content, b"eins");
        assert_eq!(mails[0].date, MailDate::Raw("2".into()));
        assert_eq!(mails[1].content, b"zwei");
        assert_eq!(mails[1].date, MailDate::Raw("3".into()));
    }

    #[test]
    fn drops_trailing_unmatched_fragment() {
        let mut fragments = ["d1", "body1", "d2"].into_iter();
        assert!(grab_one_mail(&mut fragments, None).is_some());
        assert!(grab_one_mail(&mut fragments, None).is_none());
    }

    #[test]
    fn reproduces_bodies_in_file_order() {
        let bodies = [
            "Subject: one\n\nfirst\n",
            "Subject: two\n\nsecond\nFrom the desk of\n",
            "Subject: three\n\n",
        ];
        let dates = [
            "Tue Oct 11 09:00:00 2016",
            "Mon Oct 10 16:40:28 2016",
            "Wed Oct 12 10:15:00 2016",
        ];
        let text: String = dates
            .iter()
            .zip(bodies)
            .map(|(d, b)| format!("From - {d}\n{b}"))
            .collect();

        let mails = MailboxSplitter::default()
            .split(&text)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(mails.len(), 3);
        let contents: Vec<_> = mails.iter().map(|m| m.content.as_slice()).collect();
        assert_eq!(contents, bodies.map(str::as_bytes));
    }

    #[test]
    fn ignores_text_before_first_boundary() {
        let text = "garbage\nFrom - Mon Oct 10 16:40:28 2016\nbody\n";
        let mails = MailboxSplitter::default()
            .split(text)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].content, b"body\n");
    }

    #[test]
    fn fetch_sorts_by_date() {
        let path = std::env::temp_dir().join(format!("grademail-mbox-{}", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "From - Wed Oct 12 10:15:00 2016\nlater\nFrom - Mon Oct 10 16:40:28 2016\nearlier\n",
        )
        .unwrap();

        let mails = fetch_mails(&path).unwrap();
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].content, b"earlier\n");
        assert_eq!(mails[1].content, b"later\n");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn keeps_8bit_bytes_of_bodies() {
        let path = std::env::temp_dir().join(format!("grademail-mbox-{}", uuid::Uuid::new_v4()));
        let mut raw = b"From - Mon Oct 10 16:40:28 2016\nSubject: x\n\nGr".to_vec();
        raw.extend_from_slice(b"\xfc\xdfe\n");
        fs::write(&path, &raw).unwrap();

        let mails = fetch_mails(&path).unwrap();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].content, b"Subject: x\n\nGr\xfc\xdfe\n");

        let _ = fs::remove_file(path);
    }
}
