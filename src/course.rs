//! Layout of the course directory tree.
//!
//! ```text
//! <root>/.grade.toml
//! <root>/global/<round>/{grading.org, mail.txt, remarks.org}
//! <root>/<person>/<round>/grading.org
//! <root>/<person>/<round>/fixed/...
//! ```

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::COURSE_FILENAME;

pub const GRADING_FILENAME: &str = "grading.org";
pub const GLOBAL_FOLDER_NAME: &str = "global";
pub const GLOBAL_MAIL_NAME: &str = "mail.txt";
pub const GLOBAL_REMARKS_NAME: &str = "remarks.org";
pub const FIXED_FOLDER_NAME: &str = "fixed";

/// Grading file written when the round has no template of its own.
pub const GRADING_TEMPLATE: &str = "\
* Bewertung

#+BEGIN_RESULT
/
#+END_RESULT
";

#[derive(Debug, Clone)]
pub struct Course {
    root: PathBuf,
}

impl Course {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(COURSE_FILENAME)
    }

    pub fn person_dir(&self, person: &str) -> PathBuf {
        self.root.join(person)
    }

    pub fn round_dir(&self, person: &str, round: &str) -> PathBuf {
        self.person_dir(person).join(round)
    }

    pub fn grading_file(&self, person: &str, round: &str) -> PathBuf {
        self.round_dir(person, round).join(GRADING_FILENAME)
    }

    pub fn fixed_dir(&self, person: &str, round: &str) -> PathBuf {
        self.round_dir(person, round).join(FIXED_FOLDER_NAME)
    }

    pub fn global_dir(&self, round: &str) -> PathBuf {
        self.root.join(GLOBAL_FOLDER_NAME).join(round)
    }

    /// Create the directory of `person`. Returns `false` if it already existed.
    pub fn create_person_dir(&self, person: &str) -> Result<bool> {
        let dir = self.person_dir(person);
        match fs::create_dir(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).with_context(|| format!("creating {}", dir.display())),
        }
    }

    /// Template for the grading files of `round`.
    pub fn grading_template(&self, round: &str) -> Result<String> {
        let path = self.global_dir(round).join(GRADING_FILENAME);
        match fs::read_to_string(&path) {
            Ok(t) => Ok(t),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(GRADING_TEMPLATE.to_string()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Create the round directories of all `persons` and give each a grading
    /// file. Existing grading files are left alone.
    ///
    /// Returns the grading files written.
    pub fn prepare_round<'p>(
        &self,
        round: &str,
        persons: impl IntoIterator<Item = &'p str>,
    ) -> Result<Vec<PathBuf>> {
        let global = self.global_dir(round);
        fs::create_dir_all(&global).with_context(|| format!("creating {}", global.display()))?;
        for name in [GLOBAL_MAIL_NAME, GLOBAL_REMARKS_NAME] {
            let path = global.join(name);
            if !path.exists() {
                fs::write(&path, "").with_context(|| format!("writing {}", path.display()))?;
            }
        }

        let template = self.grading_template(round)?;
        let mut written = Vec::new();
        for person in persons {
            let dir = self.round_dir(person, round);
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            let file = dir.join(GRADING_FILENAME);
            if file.exists() {
                warn!("{} already exists, skipping", file.display());
                continue;
            }
            fs::write(&file, &template).with_context(|| format!("writing {}", file.display()))?;
            info!("Wrote {}", file.display());
            written.push(file);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_course() -> Course {
        let root = std::env::temp_dir().join(format!("grademail-course-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).unwrap();
        Course::new(root)
    }

    #[test]
    fn person_dirs_are_created_once() {
        let course = temp_course();
        assert!(course.create_person_dir("alice").unwrap());
        assert!(!course.create_person_dir("alice").unwrap());
        let _ = fs::remove_dir_all(course.root());
    }

    #[test]
    fn prepares_grading_files_from_template() {
        let course = temp_course();
        fs::create_dir_all(course.global_dir("r1")).unwrap();
        fs::write(
            course.global_dir("r1").join(GRADING_FILENAME),
            "#+BEGIN_RESULT\n/10\n#+END_RESULT\n",
        )
        .unwrap();

        let written = course.prepare_round("r1", ["alice", "bob"]).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(course.grading_file("bob", "r1")).unwrap(),
            "#+BEGIN_RESULT\n/10\n#+END_RESULT\n"
        );
        assert!(course.global_dir("r1").join(GLOBAL_MAIL_NAME).exists());

        fs::write(course.grading_file("alice", "r1"), "edited").unwrap();
        let again = course.prepare_round("r1", ["alice"]).unwrap();
        assert!(again.is_empty());
        assert_eq!(
            fs::read_to_string(course.grading_file("alice", "r1")).unwrap(),
            "edited"
        );

        let _ = fs::remove_dir_all(course.root());
    }

    #[test]
    fn falls_back_to_builtin_template() {
        let course = temp_course();
        course.prepare_round("r2", ["carol"]).unwrap();
        assert_eq!(
            fs::read_to_string(course.grading_file("carol", "r2")).unwrap(),
            GRADING_TEMPLATE
        );
        let _ = fs::remove_dir_all(course.root());
    }
}
