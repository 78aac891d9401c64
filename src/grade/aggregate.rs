use log::debug;

use crate::config::CourseConfig;
use crate::course::Course;
use crate::domain::grade::{CombinedGrade, GradeRecord};
use crate::error::{Error, Result};
use crate::grade::parser::extract_grade_from_file;
use crate::grade::report::{PersonReport, RosterReport, RosterRow};

/// Collects the grades of the persons of a course from their grading files.
pub struct Gradebook<'a> {
    config: &'a CourseConfig,
    course: &'a Course,
}

impl<'a> Gradebook<'a> {
    pub fn new(config: &'a CourseConfig, course: &'a Course) -> Self {
        Self { config, course }
    }

    /// One record per round, in round order, for which `person` has a grading file.
    pub fn grades_of_person(&self, person: &str) -> Result<Vec<GradeRecord>> {
        let mut records = Vec::new();
        for round in self.config.round_names() {
            let path = self.course.grading_file(person, round);
            match extract_grade_from_file(&path) {
                Ok(block) => records.push(GradeRecord {
                    round: round.to_string(),
                    given: block.given,
                    total: block.total,
                }),
                Err(Error::GradeFileMissing(_)) => {
                    debug!("no grading file for {person} in {round}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    pub fn grades_of_everyone(&self) -> Result<Vec<(String, Vec<GradeRecord>)>> {
        let mut everyone = Vec::new();
        for person in self.config.person_names() {
            everyone.push((person.to_string(), self.grades_of_person(person)?));
        }
        Ok(everyone)
    }

    /// Given and total points of `person`, summed over all rounds.
    pub fn person_grade_sum(&self, person: &str) -> Result<(CombinedGrade, CombinedGrade)> {
        Ok(sum_records(&self.grades_of_person(person)?))
    }

    pub fn person_report(&self, person: &str) -> Result<PersonReport> {
        Ok(PersonReport::new(
            person,
            self.grades_of_person(person)?,
            self.config.grading,
        ))
    }

    pub fn roster_report(&self) -> Result<RosterReport> {
        let passing_score = self.config.grading.passing_score;
        let rows = self
            .grades_of_everyone()?
            .into_iter()
            .map(|(person, records)| {
                let (given, total) = sum_records(&records);
                RosterRow {
                    person,
                    given,
                    total,
                    missing: passing_score - given,
                }
            })
            .collect();
        Ok(RosterReport { rows })
    }
}

pub fn sum_records(records: &[GradeRecord]) -> (CombinedGrade, CombinedGrade) {
    let mut given = CombinedGrade::default();
    let mut total = CombinedGrade::default();
    for r in records {
        given += r.given;
        total += r.total;
    }
    (given, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::fs;

    fn write_grade(course: &Course, person: &str, round: &str, result: &str) {
        let path = course.grading_file(person, round);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            format!("* Feedback\nGut gemacht.\n\n#+BEGIN_RESULT\n{result}\n#+END_RESULT\n"),
        )
        .unwrap();
    }

    fn setup() -> (CourseConfig, Course) {
        let root = std::env::temp_dir().join(format!("grademail-agg-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).unwrap();
        let course = Course::new(root);

        let mut config = CourseConfig::default();
        config.add_person("alice");
        config.add_person("bob");
        for round in ["r2", "r1", "r3"] {
            config.add_round(round, Local::now()).unwrap();
            config.close_round(Local::now()).unwrap();
        }

        write_grade(&course, "alice", "r1", "5/10");
        write_grade(&course, "alice", "r2", "3/10");
        write_grade(&course, "bob", "r1", "9+2/10");
        (config, course)
    }

    #[test]
    fn skips_rounds_without_grading_file() {
        let (config, course) = setup();
        let book = Gradebook::new(&config, &course);

        let records = book.grades_of_person("alice").unwrap();
        let rounds: Vec<_> = records.iter().map(|r| r.round.as_str()).collect();
        assert_eq!(rounds, ["r2", "r1"]);

        let (given, total) = book.person_grade_sum("alice").unwrap();
        assert_eq!(given, CombinedGrade::new(8.0, 0.0));
        assert_eq!(total, CombinedGrade::new(20.0, 0.0));

        let _ = fs::remove_dir_all(course.root());
    }

    #[test]
    fn person_report_lists_found_rounds_sorted() {
        let (config, course) = setup();
        let report = Gradebook::new(&config, &course)
            .person_report("alice")
            .unwrap();

        let rounds: Vec<_> = report.records.iter().map(|r| r.round.as_str()).collect();
        assert_eq!(rounds, ["r1", "r2"]);
        assert_eq!(report.submissions(), 2);
        assert_eq!(report.missing_points(), 42.0);
        assert!(!report.passed());

        let text = report.to_string();
        assert!(text.contains("r1"));
        assert!(text.contains("r2"));
        assert!(!text.contains("r3"));
        assert!(text.contains("Total: 8 / 20"));

        let _ = fs::remove_dir_all(course.root());
    }

    #[test]
    fn roster_shows_shortfall() {
        let (mut config, course) = setup();
        config.grading.passing_score = 10.0;
        let roster = Gradebook::new(&config, &course).roster_report().unwrap();

        assert_eq!(roster.rows.len(), 2);
        assert_eq!(roster.rows[0].person, "alice");
        assert_eq!(roster.rows[0].missing, 2.0);
        assert_eq!(roster.rows[1].person, "bob");
        assert_eq!(roster.rows[1].given, CombinedGrade::new(9.0, 2.0));
        assert_eq!(roster.rows[1].missing, -1.0);

        let _ = fs::remove_dir_all(course.root());
    }

    #[test]
    fn broken_grading_file_aborts() {
        let (config, course) = setup();
        fs::write(course.grading_file("bob", "r1"), "no block").unwrap();
        let book = Gradebook::new(&config, &course);

        assert!(matches!(
            book.grades_of_person("bob"),
            Err(Error::ResultBlockMissing(_))
        ));
        assert!(book.roster_report().is_err());

        let _ = fs::remove_dir_all(course.root());
    }
}
