use std::fmt;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::GradingPolicy;
use crate::domain::grade::{CombinedGrade, GradeRecord};
use crate::grade::aggregate::sum_records;

#[derive(Tabled)]
struct RoundRow<'r> {
    #[tabled(rename = "Round")]
    round: &'r str,
    #[tabled(rename = "Given")]
    given: CombinedGrade,
    #[tabled(rename = "Total")]
    total: CombinedGrade,
}

/// Grades of one person, as mailed to them.
#[derive(Debug, Clone)]
pub struct PersonReport {
    pub person: String,
    /// Sorted by round name.
    pub records: Vec<GradeRecord>,
    pub given: CombinedGrade,
    pub total: CombinedGrade,
    pub policy: GradingPolicy,
}

impl PersonReport {
    pub fn new(person: &str, mut records: Vec<GradeRecord>, policy: GradingPolicy) -> Self {
        records.sort_by(|a, b| a.round.cmp(&b.round));
        let (given, total) = sum_records(&records);
        Self {
            person: person.to_string(),
            records,
            given,
            total,
            policy,
        }
    }

    /// Rounds in which any points were given.
    pub fn submissions(&self) -> usize {
        self.records.iter().filter(|r| !r.given.is_zero()).count()
    }

    /// Points still missing to pass; negative once passed.
    pub fn missing_points(&self) -> f64 {
        self.policy.passing_score - self.given
    }

    pub fn passed(&self) -> bool {
        !self.given.lt(self.policy.passing_score)
    }
}

impl fmt::Display for PersonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.records.iter().map(|r| RoundRow {
            round: &r.round,
            given: r.given,
            total: r.total,
        });
        writeln!(f, "Grades of {}", self.person)?;
        writeln!(f, "{}", Table::new(rows).with(Style::psql()))?;
        writeln!(f)?;
        writeln!(f, "Total: {} / {}", self.given, self.total)?;
        let missing = self.missing_points();
        if self.passed() {
            writeln!(
                f,
                "Passing score of {} reached, {} points to spare.",
                self.policy.passing_score, -missing
            )?;
        } else {
            writeln!(
                f,
                "{} points missing to the passing score of {}.",
                missing, self.policy.passing_score
            )?;
        }
        writeln!(
            f,
            "Submissions: {} of {} required.",
            self.submissions(),
            self.policy.required_submissions
        )
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct RosterRow {
    #[tabled(rename = "Person")]
    pub person: String,
    #[tabled(rename = "Given")]
    pub given: CombinedGrade,
    #[tabled(rename = "Total")]
    pub total: CombinedGrade,
    /// Passing score minus given points; negative means surplus.
    #[tabled(rename = "Missing")]
    pub missing: f64,
}

/// Overview of every person of the course.
#[derive(Debug, Clone)]
pub struct RosterReport {
    pub rows: Vec<RosterRow>,
}

impl fmt::Display for RosterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Table::new(&self.rows).with(Style::psql()))
    }
}
