use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use mailparse::{MailHeaderMap, ParsedMail};

use crate::error::{Error, Result};
use crate::mail::decoders::nice_header;

/// Text encodings tried, in order, when an attachment is shown as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

pub const ENCODINGS: &[TextEncoding] = &[TextEncoding::Utf8, TextEncoding::Latin1];

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Decode `payload` with the first of [`ENCODINGS`] that accepts it.
pub fn attempt_decoding(payload: &[u8], filename: &str) -> Result<String> {
    ENCODINGS
        .iter()
        .find_map(|enc| enc.decode(payload))
        .ok_or_else(|| Error::Decode {
            filename: filename.to_string(),
            tried: ENCODINGS
                .iter()
                .map(|e| e.name())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// One mail parsed into its MIME tree.
pub struct Message<'a> {
    parsed: ParsedMail<'a>,
}

impl<'a> Message<'a> {
    /// Parse the raw bytes of one mail; 8-bit bodies are kept as they are.
    pub fn parse<T>(content: &'a T) -> Result<Self>
    where
        T: AsRef<[u8]> + ?Sized,
    {
        Ok(Self {
            parsed: mailparse::parse_mail(content.as_ref())?,
        })
    }

    /// Raw (still encoded) value of the first header called `name`.
    pub fn raw_header(&self, name: &str) -> Option<String> {
        self.parsed
            .headers
            .get_first_header(name)
            .map(|h| String::from_utf8_lossy(h.get_value_raw()).into_owned())
    }

    /// The full `From` value, every encoded word decoded, address included.
    pub fn sender(&self) -> String {
        self.parsed
            .headers
            .get_first_value("From")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| "<no sender>".to_string())
    }

    pub fn subject(&self) -> String {
        self.raw_header("Subject")
            .map(|v| nice_header(v.trim()))
            .unwrap_or_else(|| "<no subject>".to_string())
    }

    /// Parts carrying a filename, depth first.
    pub fn attachments(&self) -> impl Iterator<Item = AttachmentPart<'_, 'a>> {
        Walk {
            stack: vec![&self.parsed],
        }
        .filter_map(|part| {
            filename_of(part).map(|filename| AttachmentPart { part, filename })
        })
    }
}

/// Depth-first walk over a part and all of its subparts.
struct Walk<'p, 'a> {
    stack: Vec<&'p ParsedMail<'a>>,
}

impl<'p, 'a> Iterator for Walk<'p, 'a> {
    type Item = &'p ParsedMail<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.subparts.iter().rev());
        Some(part)
    }
}

fn filename_of(part: &ParsedMail<'_>) -> Option<String> {
    let disposition = part.get_content_disposition();
    disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| nice_header(name))
        .filter(|name| !name.is_empty())
}

/// A MIME part of a mail that carries a filename.
pub struct AttachmentPart<'p, 'a> {
    part: &'p ParsedMail<'a>,
    filename: String,
}

impl AttachmentPart<'_, '_> {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// `(maintype, subtype)`, e.g. `("text", "plain")`.
    pub fn content_type(&self) -> (&str, &str) {
        let mimetype = self.part.ctype.mimetype.as_str();
        mimetype.split_once('/').unwrap_or((mimetype, ""))
    }

    pub fn is_multipart(&self) -> bool {
        !self.part.subparts.is_empty()
    }

    /// Body with the transfer encoding (base64, quoted-printable) undone.
    pub fn payload(&self) -> Result<Vec<u8>> {
        Ok(self.part.get_body_raw()?)
    }

    pub fn decode_text(&self) -> Result<String> {
        attempt_decoding(&self.payload()?, &self.filename)
    }
}

/// Last component of `name`, split at both `/` and `\`. `None` if that
/// component cannot name a file.
fn last_component(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|n| !matches!(*n, "" | "." | ".."))
}

/// Write `attachment` into `dir`, creating it if needed.
///
/// Only the last path component of the attachment's filename is used.
pub fn save_attachment(
    attachment: &AttachmentPart<'_, '_>,
    dir: &Path,
    name_converter: Option<&dyn Fn(&str) -> String>,
) -> Result<PathBuf> {
    let invalid = || Error::InvalidFilename(attachment.filename().to_string());
    let mut filename = last_component(attachment.filename())
        .ok_or_else(invalid)?
        .to_string();
    if let Some(convert) = name_converter {
        filename = convert(&filename);
        if last_component(&filename) != Some(filename.as_str()) {
            return Err(invalid());
        }
    }
    fs::create_dir_all(dir)?;
    let full_path = dir.join(filename);

    info!("Writing to '{}'", full_path.display());
    fs::write(&full_path, attachment.payload()?)?;
    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMISSION: &str = "From: Alice <alice@example.org>\r
Subject: =?UTF-8?B?NC4gw5xidW5n?=\r
MIME-Version: 1.0\r
Content-Type: multipart/mixed; boundary=\"XYZ\"\r
\r
--XYZ\r
Content-Type: text/plain; charset=utf-8\r
\r
Hallo, anbei meine Abgabe.\r
--XYZ\r
Content-Type: text/x-java; name=\"Main.java\"\r
Content-Disposition: attachment; filename=\"Main.java\"\r
Content-Transfer-Encoding: base64\r
\r
Y2xhc3MgTWFpbiB7fQo=\r
--XYZ\r
Content-Type: text/plain; charset=iso-8859-1; name=\"notes.txt\"\r
Content-Transfer-Encoding: quoted-printable\r
\r
Gr=FC=DFe\r
--XYZ--\r
";

    #[test]
    fn yields_only_named_parts_in_order() {
        let message = Message::parse(SUBMISSION).unwrap();
        let names: Vec<String> = message
            .attachments()
            .map(|a| a.filename().to_string())
            .collect();
        assert_eq!(names, ["Main.java", "notes.txt"]);
    }

    #[test]
    fn decodes_transfer_encoding() {
        let message = Message::parse(SUBMISSION).unwrap();
        let main = message.attachments().next().unwrap();
        assert_eq!(main.content_type(), ("text", "x-java"));
        assert!(!main.is_multipart());
        assert_eq!(main.payload().unwrap(), b"class Main {}\n");
        assert_eq!(main.decode_text().unwrap(), "class Main {}\n");
    }

    #[test]
    fn falls_back_to_latin1() {
        let message = Message::parse(SUBMISSION).unwrap();
        let notes = message.attachments().nth(1).unwrap();
        assert!(notes.payload().unwrap().starts_with(b"Gr\xfc\xdfe"));
        assert_eq!(notes.decode_text().unwrap().trim_end(), "Grüße");
    }

    #[test]
    fn decodes_headers() {
        let message = Message::parse(SUBMISSION).unwrap();
        assert_eq!(message.subject(), "4. Übung");
        assert_eq!(message.sender(), "Alice <alice@example.org>");
    }

    #[test]
    fn sender_keeps_the_address() {
        let raw = "From: =?UTF-8?Q?J=C3=BCrgen_M=C3=BCller?= <jm@example.org>\r\n\r\nHallo\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.sender(), "Jürgen Müller <jm@example.org>");
    }

    #[test]
    fn keeps_8bit_attachment_bytes() {
        let mut raw = b"From: Alice <alice@example.org>\r
MIME-Version: 1.0\r
Content-Type: multipart/mixed; boundary=\"XYZ\"\r
\r
--XYZ\r
Content-Type: text/plain; charset=iso-8859-1\r
Content-Disposition: attachment; filename=\"a.txt\"\r
Content-Transfer-Encoding: 8bit\r
\r
Gr"
        .to_vec();
        raw.extend_from_slice(b"\xfc\xdfe\r\n--XYZ--\r\n");

        let message = Message::parse(&raw).unwrap();
        let part = message.attachments().next().unwrap();
        assert!(part.payload().unwrap().starts_with(b"Gr\xfc\xdfe"));
        assert_eq!(part.decode_text().unwrap().trim_end(), "Grüße");
    }

    #[test]
    fn rejects_filenames_without_a_file_component() {
        let dir = std::env::temp_dir().join(format!("grademail-save-{}", uuid::Uuid::new_v4()));
        for name in ["..", ".", "sub/..", "dir/"] {
            let raw = format!(
                "Content-Type: text/plain\r\nContent-Disposition: attachment; filename=\"{name}\"\r\n\r\nx\r\n"
            );
            let message = Message::parse(&raw).unwrap();
            let part = message.attachments().next().unwrap();
            assert!(matches!(
                save_attachment(&part, &dir, None),
                Err(Error::InvalidFilename(_))
            ));
        }

        let raw = "Content-Type: text/plain\r\nContent-Disposition: attachment; filename=\"a.txt\"\r\n\r\nx\r\n";
        let message = Message::parse(raw).unwrap();
        let part = message.attachments().next().unwrap();
        let escape = |_: &str| "..".to_string();
        assert!(save_attachment(&part, &dir, Some(&escape)).is_err());
        assert!(!dir.exists());
    }

    #[test]
    fn strips_directories_from_filenames() {
        assert_eq!(last_component("../../etc/passwd"), Some("passwd"));
        assert_eq!(last_component("C:\\Users\\bob\\Main.java"), Some("Main.java"));
        assert_eq!(last_component("Main.java"), Some("Main.java"));
    }

    #[test]
    fn saves_attachment_to_folder() {
        let dir = std::env::temp_dir()
            .join(format!("grademail-save-{}", uuid::Uuid::new_v4()))
            .join("alice")
            .join("r1");
        let message = Message::parse(SUBMISSION).unwrap();
        let main = message.attachments().next().unwrap();

        let upper = |name: &str| name.to_uppercase();
        let path = save_attachment(&main, &dir, Some(&upper)).unwrap();
        assert_eq!(path, dir.join("MAIN.JAVA"));
        assert_eq!(fs::read(&path).unwrap(), b"class Main {}\n");

        let _ = fs::remove_dir_all(dir);
    }
}
