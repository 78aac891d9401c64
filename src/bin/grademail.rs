use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{Parser, Subcommand};

use grademail::auth::secret_store;
use grademail::config::{ConfigError, CourseConfig, load_settings, mailbox_path};
use grademail::course::Course;
use grademail::domain::mail::MailRecord;
use grademail::grade::aggregate::Gradebook;
use grademail::mail::attachments::{Message, save_attachment};
use grademail::mail::mbox::fetch_mails;
use grademail::mail::outbound;

#[derive(Parser)]
#[command(name = "grademail")]
#[command(about = "Collect submissions from the mailbox, sum up grades and mail feedback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty course file in the current directory
    Init,

    /// List all mails of the mailbox, oldest first
    List,

    /// Print the attachments of a mail
    ShowFiles {
        /// The mail to select (as shown by `list`)
        #[arg(short, long)]
        index: usize,
    },

    /// Save the attachments of a mail into a person's folder of the open round
    SaveFiles {
        #[arg(short, long)]
        index: usize,

        /// The person folder to use
        #[arg(short, long)]
        person: String,
    },

    /// Create folders for new persons and add them to the course
    AddPersons {
        #[arg(required = true)]
        persons: Vec<String>,
    },

    /// Remove all persons from the course file (folders are kept)
    DeletePersons,

    /// Set the mail address of a person
    SetEmail { person: String, email: String },

    /// Open a new round
    AddRound { name: String },

    /// Create the grading files of a round (default: the open round)
    PrepareRound { round: Option<String> },

    /// Close the open round
    CloseRound,

    /// Format the feedback mail of a round for a person and send it
    Format {
        person: String,
        round: String,

        /// Send to this address instead of the person's
        #[arg(long)]
        email: Option<String>,

        /// Print the mail instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Overview of the grades of everyone
    Grades,

    /// Grade report of one person
    Report {
        person: String,

        /// Mail the report to the person
        #[arg(long)]
        send: bool,

        /// With --send: print the mail instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Store the SMTP password in the keyring
    SetPassword,
}

fn load_course(course: &Course) -> Result<CourseConfig> {
    CourseConfig::load(&course.config_path()).map_err(|e| anyhow!("Configuration error: {e}"))
}

fn select_mail(index: usize) -> Result<MailRecord> {
    let settings = load_settings().map_err(|e| anyhow!("Configuration error: {e}"))?;
    let path = mailbox_path(&settings.mailbox)?;
    let mails = fetch_mails(&path).with_context(|| format!("reading mailbox {}", path.display()))?;
    let count = mails.len();
    mails
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow!("no mail with index {index} ({count} mails)"))
}

fn deliver(message: lettre::Message, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{}", String::from_utf8_lossy(&message.formatted()));
        return Ok(());
    }
    let settings = load_settings()?;
    let password = secret_store::smtp_password(&settings.smtp.username)?;
    outbound::send(&settings.smtp, &password, &message)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let course = Course::new(std::env::current_dir()?);

    match cli.cmd {
        Command::Init => {
            CourseConfig::create_sample(&course.config_path())?;
            println!("You can now start adding persons either manually or using this program.");
            Ok(())
        }

        Command::List => {
            let settings = load_settings().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let path = mailbox_path(&settings.mailbox)?;
            let mails =
                fetch_mails(&path).with_context(|| format!("reading mailbox {}", path.display()))?;
            for (i, mail) in mails.iter().enumerate() {
                let message = Message::parse(&mail.content)?;
                println!(
                    "{:2} {} {} »{}«",
                    i,
                    mail.date,
                    message.sender(),
                    message.subject()
                );
            }
            Ok(())
        }

        Command::ShowFiles { index } => {
            let mail = select_mail(index)?;
            let message = Message::parse(&mail.content)?;
            println!("Author: {}", message.sender());
            for attachment in message.attachments() {
                println!("{:=^80}", attachment.filename());
                println!(
                    "Is multipart: {}",
                    if attachment.is_multipart() { "yes" } else { "no" }
                );
                println!();
                let text = attachment.decode_text().with_context(|| {
                    format!("Attachment '{}' could not be decoded", attachment.filename())
                })?;
                println!("{text}");
            }
            Ok(())
        }

        Command::SaveFiles { index, person } => {
            let cfg = load_course(&course)?;
            if !cfg.persons.contains_key(&person) {
                return Err(ConfigError::UnknownPerson(person).into());
            }
            let round = cfg.current_round()?;
            let dir = course.round_dir(&person, &round.name);

            let mail = select_mail(index)?;
            let message = Message::parse(&mail.content)?;
            for attachment in message.attachments() {
                let path = save_attachment(&attachment, &dir, None)?;
                println!("Wrote {}", path.display());
            }
            Ok(())
        }

        Command::AddPersons { persons } => {
            let mut cfg = load_course(&course)?;
            for person in &persons {
                match course.create_person_dir(person) {
                    Ok(true) => {}
                    Ok(false) => println!("Folder for person {person} already exists"),
                    Err(e) => {
                        eprintln!("Error creating person '{person}': {e:#}");
                        continue;
                    }
                }
                if !cfg.add_person(person) {
                    println!("Person {person} already exists, skipping.");
                }
            }
            cfg.save(&course.config_path())?;
            Ok(())
        }

        Command::DeletePersons => {
            let mut cfg = load_course(&course)?;
            cfg.delete_persons();
            cfg.save(&course.config_path())?;
            Ok(())
        }

        Command::SetEmail { person, email } => {
            let mut cfg = load_course(&course)?;
            cfg.set_email(&person, &email)?;
            cfg.save(&course.config_path())?;
            Ok(())
        }

        Command::AddRound { name } => {
            let mut cfg = load_course(&course)?;
            cfg.add_round(&name, Local::now())?;
            cfg.save(&course.config_path())?;
            println!("Round {name} opened.");
            Ok(())
        }

        Command::PrepareRound { round } => {
            let cfg = load_course(&course)?;
            let round = match round {
                Some(name) => cfg.round(&name)?.name.clone(),
                None => cfg.current_round()?.name.clone(),
            };
            let written = course.prepare_round(&round, cfg.person_names())?;
            println!("Prepared {} grading files for {round}.", written.len());
            Ok(())
        }

        Command::CloseRound => {
            let mut cfg = load_course(&course)?;
            let name = cfg.close_round(Local::now())?;
            cfg.save(&course.config_path())?;
            println!("Round {name} closed.");
            Ok(())
        }

        Command::Format {
            person,
            round,
            email,
            dry_run,
        } => {
            let cfg = load_course(&course)?;
            cfg.round(&round)?;
            let email = match email {
                Some(e) => e,
                None => cfg.person_email(&person)?.to_string(),
            };
            println!("choosing mail: {email}");
            let settings = load_settings()?;
            let message =
                outbound::grading_mail(&course, &settings.smtp.sender, &email, &person, &round)?;
            deliver(message, dry_run)
        }

        Command::Grades => {
            let cfg = load_course(&course)?;
            let roster = Gradebook::new(&cfg, &course).roster_report()?;
            println!("{roster}");
            Ok(())
        }

        Command::Report {
            person,
            send,
            dry_run,
        } => {
            let cfg = load_course(&course)?;
            if !cfg.persons.contains_key(&person) {
                return Err(ConfigError::UnknownPerson(person).into());
            }
            let report = Gradebook::new(&cfg, &course).person_report(&person)?;
            if !send {
                print!("{report}");
                return Ok(());
            }
            let email = cfg.person_email(&person)?;
            let settings = load_settings()?;
            let message = outbound::report_mail(&settings.smtp.sender, email, &report)?;
            deliver(message, dry_run)
        }

        Command::SetPassword => {
            let settings = load_settings()?;
            eprintln!(
                "Paste SMTP password for {} (end with Ctrl-D):",
                settings.smtp.username
            );
            let mut password = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut password)?;
            let password = password.trim();
            secret_store::save_smtp_password(&settings.smtp.username, password)?;
            println!("Saved SMTP password for {}", settings.smtp.username);
            Ok(())
        }
    }
}
