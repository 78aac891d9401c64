use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use crate::error::Error;

/// A grade made of regular points plus extra credit.
///
/// Arithmetic between two grades is componentwise. Against a plain number a
/// grade stands for its [`total`](CombinedGrade::total).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CombinedGrade {
    pub normal: f64,
    pub extra: f64,
}

/// Right-hand side of a grade comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Grade(CombinedGrade),
    Scalar(f64),
}

impl From<CombinedGrade> for Operand {
    fn from(g: CombinedGrade) -> Self {
        Operand::Grade(g)
    }
}

impl From<&CombinedGrade> for Operand {
    fn from(g: &CombinedGrade) -> Self {
        Operand::Grade(*g)
    }
}

impl From<f64> for Operand {
    fn from(x: f64) -> Self {
        Operand::Scalar(x)
    }
}

impl CombinedGrade {
    pub const fn new(normal: f64, extra: f64) -> Self {
        Self { normal, extra }
    }

    /// Regular points plus extra credit.
    pub fn total(&self) -> f64 {
        self.normal + self.extra
    }

    pub fn is_zero(&self) -> bool {
        self.normal == 0.0 && self.extra == 0.0
    }

    /// Strictly below `rhs`: in both components for a grade, by total for a number.
    pub fn lt(&self, rhs: impl Into<Operand>) -> bool {
        match rhs.into() {
            Operand::Grade(o) => self.normal < o.normal && self.extra < o.extra,
            Operand::Scalar(x) => self.total() < x,
        }
    }

    /// At most `rhs`: in both components for a grade, by total for a number.
    pub fn le(&self, rhs: impl Into<Operand>) -> bool {
        match rhs.into() {
            Operand::Grade(o) => self.normal <= o.normal && self.extra <= o.extra,
            Operand::Scalar(x) => self.total() <= x,
        }
    }
}

fn parse_component(part: &str, input: &str) -> Result<f64, Error> {
    let part = part.trim();
    if part.is_empty() {
        return Ok(0.0);
    }
    part.parse::<f64>().map_err(|e| Error::Format {
        input: input.to_string(),
        reason: format!("{part:?} is not a number ({e})"),
    })
}

impl FromStr for CombinedGrade {
    type Err = Error;

    /// Parses `normal`, `normal+extra` or `normal+extra+`. Empty parts count as zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').collect();
        match parts.as_slice() {
            [normal] => Ok(Self::new(parse_component(normal, s)?, 0.0)),
            [normal, extra] | [normal, extra, ""] => Ok(Self::new(
                parse_component(normal, s)?,
                parse_component(extra, s)?,
            )),
            [_, _, rest] => Err(Error::Format {
                input: s.to_string(),
                reason: format!("unexpected trailing segment {rest:?}"),
            }),
            _ => Err(Error::Format {
                input: s.to_string(),
                reason: "more than two '+' separators".to_string(),
            }),
        }
    }
}

impl From<CombinedGrade> for f64 {
    fn from(g: CombinedGrade) -> Self {
        g.total()
    }
}

impl Add for CombinedGrade {
    type Output = CombinedGrade;

    fn add(self, rhs: CombinedGrade) -> CombinedGrade {
        CombinedGrade::new(self.normal + rhs.normal, self.extra + rhs.extra)
    }
}

impl AddAssign for CombinedGrade {
    fn add_assign(&mut self, rhs: CombinedGrade) {
        self.normal += rhs.normal;
        self.extra += rhs.extra;
    }
}

impl Sub for CombinedGrade {
    type Output = CombinedGrade;

    fn sub(self, rhs: CombinedGrade) -> CombinedGrade {
        CombinedGrade::new(self.normal - rhs.normal, self.extra - rhs.extra)
    }
}

impl Sub<f64> for CombinedGrade {
    type Output = f64;

    fn sub(self, rhs: f64) -> f64 {
        self.total() - rhs
    }
}

impl Sub<CombinedGrade> for f64 {
    type Output = f64;

    fn sub(self, rhs: CombinedGrade) -> f64 {
        self - rhs.total()
    }
}

impl Sum for CombinedGrade {
    fn sum<I: Iterator<Item = CombinedGrade>>(iter: I) -> Self {
        let mut acc = CombinedGrade::default();
        for g in iter {
            acc += g;
        }
        acc
    }
}

impl fmt::Display for CombinedGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = if self.extra == 0.0 {
            format!("{}", self.normal)
        } else {
            format!("{}+{}", self.normal, self.extra)
        };
        f.pad(&s)
    }
}

/// The grade a person received in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub round: String,
    pub given: CombinedGrade,
    pub total: CombinedGrade,
}
