use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::grade::CombinedGrade;
use crate::error::{Error, Result};

static RESULT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[ \t]*#\+BEGIN_RESULT\r?\n(?P<given>.*)/(?P<total>.*)\r?\n[ \t]*#\+END_RESULT",
    )
    .expect("result block pattern is valid")
});

/// The `given/total` pair of a grading file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultBlock {
    pub given: CombinedGrade,
    pub total: CombinedGrade,
}

/// Find the `#+BEGIN_RESULT` block and return its trimmed given and total strings.
pub fn find_result(content: &str) -> Option<(&str, &str)> {
    let caps = RESULT_BLOCK.captures(content)?;
    Some((caps.name("given")?.as_str().trim(), caps.name("total")?.as_str().trim()))
}

/// Parse the result block of `content`; `path` only names the file in errors.
pub fn parse_result(content: &str, path: &Path) -> Result<ResultBlock> {
    let (given, total) =
        find_result(content).ok_or_else(|| Error::ResultBlockMissing(path.to_path_buf()))?;
    Ok(ResultBlock {
        given: given.parse()?,
        total: total.parse()?,
    })
}

pub fn extract_grade_from_file(path: &Path) -> Result<ResultBlock> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::GradeFileMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parse_result(&content, path)
}
