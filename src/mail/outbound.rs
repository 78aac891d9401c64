use anyhow::{Context, Result, anyhow};
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SmtpSettings;
use crate::course::{GLOBAL_MAIL_NAME, GLOBAL_REMARKS_NAME, Course};
use crate::grade::report::PersonReport;

#[derive(Debug, Clone, PartialEq)]
struct XGradingRound(String);

impl Header for XGradingRound {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Grading-Round")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct XDeliveredBy;

impl Header for XDeliveredBy {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Delivered-By")
    }

    fn parse(_s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), "grading".to_string())
    }
}

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse()
        .with_context(|| format!("invalid mail address {addr:?}"))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Regular files of `dir` as attachments; editor backups (`~`) are skipped.
/// A missing directory yields no attachments.
pub fn folder_attachments(dir: &Path) -> Result<Vec<SinglePart>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && !p.to_string_lossy().ends_with('~'))
        .collect();
    paths.sort();

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("no file name in {}", path.display()))?;
        let guess = mime_guess::from_path(&path).first_or_octet_stream();
        let content_type = ContentType::parse(guess.essence_str())
            .with_context(|| format!("content type of {filename}"))?;
        let body = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        debug!("attaching {} as {}", path.display(), guess);
        parts.push(Attachment::new(filename).body(body, content_type));
    }
    Ok(parts)
}

/// The feedback mail of one round: the round's mail text, the person's
/// grading file, the global remarks and the files of the person's `fixed`
/// folder.
pub fn grading_mail(
    course: &Course,
    sender: &str,
    to: &str,
    person: &str,
    round: &str,
) -> Result<Message> {
    let global = course.global_dir(round);
    let mut body = MultiPart::mixed()
        .singlepart(SinglePart::plain(read_text(&global.join(GLOBAL_MAIL_NAME))?))
        .singlepart(SinglePart::plain(read_text(
            &course.grading_file(person, round),
        )?))
        .singlepart(SinglePart::plain(read_text(
            &global.join(GLOBAL_REMARKS_NAME),
        )?));
    for part in folder_attachments(&course.fixed_dir(person, round))? {
        body = body.singlepart(part);
    }

    Message::builder()
        .from(mailbox(sender)?)
        .cc(mailbox(sender)?)
        .to(mailbox(to)?)
        .subject(format!("Bewertung {round}"))
        .header(XDeliveredBy)
        .header(XGradingRound(round.to_string()))
        .multipart(body)
        .context("building grading mail")
}

/// The grade overview of one person as a plain text mail.
pub fn report_mail(sender: &str, to: &str, report: &PersonReport) -> Result<Message> {
    Message::builder()
        .from(mailbox(sender)?)
        .cc(mailbox(sender)?)
        .to(mailbox(to)?)
        .subject("Punktestand")
        .header(XDeliveredBy)
        .header(ContentType::TEXT_PLAIN)
        .body(report.to_string())
        .context("building report mail")
}

/// Send `message` through the configured server using STARTTLS.
pub fn send(smtp: &SmtpSettings, password: &str, message: &Message) -> Result<()> {
    let creds = Credentials::new(smtp.username.clone(), password.to_string());
    let transport = SmtpTransport::starttls_relay(&smtp.server)
        .with_context(|| format!("SMTP relay {}", smtp.server))?
        .port(smtp.port)
        .credentials(creds)
        .build();

    transport
        .send(message)
        .map_err(|e| anyhow!("sending mail failed: {e}"))?;
    info!("mail sent via {}", smtp.server);
    Ok(())
}
