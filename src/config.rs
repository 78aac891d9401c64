use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Course file kept in the course root.
pub const COURSE_FILENAME: &str = ".grade.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("more than one round is open: {}", .0.join(", "))]
    MultipleOpenRounds(Vec<String>),

    #[error("no round is open")]
    NoOpenRound,

    #[error("round {0} is still open, close it first")]
    RoundStillOpen(String),

    #[error("round {0} already exists")]
    DuplicateRound(String),

    #[error("unknown round {0}")]
    UnknownRound(String),

    #[error("unknown person {0}")]
    UnknownPerson(String),

    #[error("{0} has no mail address")]
    MissingEmail(String),

    #[error("course file {0} already exists")]
    AlreadyInitialized(PathBuf),

    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid course file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize course file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub name: String,
    pub opened: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<DateTime<Local>>,
}

impl Round {
    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }
}

/// Pass mark and minimum number of submissions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingPolicy {
    pub passing_score: f64,
    pub required_submissions: usize,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            passing_score: 50.0,
            required_submissions: 6,
        }
    }
}

/// Persons, rounds and grading policy of one course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseConfig {
    #[serde(default)]
    pub persons: BTreeMap<String, Person>,
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub grading: GradingPolicy,
}

impl CourseConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&s)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Config written to {}", path.display());
        Ok(())
    }

    /// Write an empty course file, refusing to overwrite an existing one.
    pub fn create_sample(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyInitialized(path.to_path_buf()));
        }
        let sample = Self::default();
        sample.save(path)?;
        Ok(sample)
    }

    /// Returns `false` if the person was already known.
    pub fn add_person(&mut self, name: &str) -> bool {
        if self.persons.contains_key(name) {
            return false;
        }
        self.persons.insert(name.to_string(), Person::default());
        true
    }

    pub fn delete_persons(&mut self) {
        self.persons.clear();
    }

    pub fn set_email(&mut self, person: &str, email: &str) -> Result<(), ConfigError> {
        let entry = self
            .persons
            .get_mut(person)
            .ok_or_else(|| ConfigError::UnknownPerson(person.to_string()))?;
        entry.email = Some(email.to_string());
        Ok(())
    }

    pub fn person_email(&self, person: &str) -> Result<&str, ConfigError> {
        self.persons
            .get(person)
            .ok_or_else(|| ConfigError::UnknownPerson(person.to_string()))?
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::MissingEmail(person.to_string()))
    }

    pub fn person_names(&self) -> impl Iterator<Item = &str> {
        self.persons.keys().map(String::as_str)
    }

    pub fn round_names(&self) -> impl Iterator<Item = &str> {
        self.rounds.iter().map(|r| r.name.as_str())
    }

    pub fn round(&self, name: &str) -> Result<&Round, ConfigError> {
        self.rounds
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ConfigError::UnknownRound(name.to_string()))
    }

    /// The single open round.
    pub fn current_round(&self) -> Result<&Round, ConfigError> {
        let open: Vec<&Round> = self.rounds.iter().filter(|r| r.is_open()).collect();
        match open.as_slice() {
            [] => Err(ConfigError::NoOpenRound),
            [round] => Ok(*round),
            many => Err(ConfigError::MultipleOpenRounds(
                many.iter().map(|r| r.name.clone()).collect(),
            )),
        }
    }

    /// Open a new round. Only one round may be open at a time.
    pub fn add_round(&mut self, name: &str, now: DateTime<Local>) -> Result<(), ConfigError> {
        if self.rounds.iter().any(|r| r.name == name) {
            return Err(ConfigError::DuplicateRound(name.to_string()));
        }
        match self.current_round() {
            Ok(open) => return Err(ConfigError::RoundStillOpen(open.name.clone())),
            Err(ConfigError::NoOpenRound) => {}
            Err(e) => return Err(e),
        }
        self.rounds.push(Round {
            name: name.to_string(),
            opened: now,
            closed: None,
        });
        Ok(())
    }

    /// Close the open round and return its name.
    pub fn close_round(&mut self, now: DateTime<Local>) -> Result<String, ConfigError> {
        let name = self.current_round()?.name.clone();
        if let Some(round) = self.rounds.iter_mut().find(|r| r.name == name) {
            round.closed = Some(now);
        }
        Ok(name)
    }
}

/// Per-user settings: where the mailbox lives and how to send mail.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub mailbox: MailboxSettings,
    pub smtp: SmtpSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MailboxSettings {
    /// Thunderbird profile directory name.
    pub profile: String,
    /// Mailbox file relative to `ImapMail` of the profile.
    pub folder: String,
    /// Explicit mailbox file, overriding profile and folder.
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    /// `From` and `CC` of outgoing mail, e.g. `Jane Doe <jane@example.org>`.
    pub sender: String,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("grademail"))
}

pub fn settings_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("settings.toml");
    Ok(p)
}

pub fn load_settings() -> Result<Settings> {
    let path = settings_path()?;
    if !path.exists() {
        // create a template for users to edit
        let sample = Settings {
            mailbox: MailboxSettings {
                profile: "xxxxxxxx.default".to_string(),
                folder: "imap.example.org/INBOX".to_string(),
                path: None,
            },
            smtp: SmtpSettings {
                server: "smtp.example.org".to_string(),
                port: 587,
                username: "you".to_string(),
                sender: "You <you@example.org>".to_string(),
            },
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template settings at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&s)?;
    Ok(settings)
}

/// The mailbox file: `mailbox.path` if set, else the Thunderbird profile's
/// `ImapMail/<folder>`.
pub fn mailbox_path(settings: &MailboxSettings) -> Result<PathBuf> {
    if let Some(p) = &settings.path {
        return Ok(PathBuf::from(p));
    }
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("no home dir available"))?
        .join(".thunderbird")
        .join(&settings.profile)
        .join("ImapMail")
        .join(&settings.folder))
}
