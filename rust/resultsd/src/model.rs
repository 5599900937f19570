use crate::error::{ResultsError, ResultsResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// School classes in promotion order. A student in the last class graduates.
pub const CLASS_LADDER: [&str; 16] = [
    "Creche",
    "KG 1",
    "KG 2",
    "Nursery 1",
    "Nursery 2",
    "Primary 1",
    "Primary 2",
    "Primary 3",
    "Primary 4",
    "Primary 5",
    "JSS 1",
    "JSS 2",
    "JSS 3",
    "SS1",
    "SS2",
    "SS3",
];

/// Resolve a user-entered class name to its ladder spelling (case and surrounding
/// whitespace are ignored).
pub fn canonical_class(name: &str) -> Option<&'static str> {
    let t = name.trim();
    CLASS_LADDER
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(t))
}

pub fn require_class(name: &str) -> ResultsResult<&'static str> {
    canonical_class(name).ok_or_else(|| ResultsError::not_found(format!("class '{}'", name.trim())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Promote(&'static str),
    Graduate,
}

/// Where a student of `class_name` goes on promotion, or `None` for classes off the ladder.
pub fn next_step(class_name: &str) -> Option<NextStep> {
    let current = canonical_class(class_name)?;
    let idx = CLASS_LADDER.iter().position(|c| *c == current)?;
    Some(match CLASS_LADDER.get(idx + 1) {
        Some(next) => NextStep::Promote(next),
        None => NextStep::Graduate,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
}

impl Term {
    pub const ALL: [Term; 3] = [Term::First, Term::Second, Term::Third];

    pub fn parse(raw: &str) -> ResultsResult<Term> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1st" | "1" | "first" => Ok(Term::First),
            "2nd" | "2" | "second" => Ok(Term::Second),
            "3rd" | "3" | "third" => Ok(Term::Third),
            other => Err(ResultsError::validation_with(
                "term must be one of: 1st, 2nd, 3rd",
                json!({ "term": other }),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Term::First => "1st",
            Term::Second => "2nd",
            Term::Third => "3rd",
        }
    }

    /// Storage form (1..=3).
    pub fn index(self) -> i64 {
        match self {
            Term::First => 1,
            Term::Second => 2,
            Term::Third => 3,
        }
    }

    pub fn from_index(i: i64) -> Option<Term> {
        match i {
            1 => Some(Term::First),
            2 => Some(Term::Second),
            3 => Some(Term::Third),
            _ => None,
        }
    }

    /// Terms of the session up to and including this one.
    pub fn up_to(self) -> &'static [Term] {
        let n = self.index() as usize;
        &Self::ALL[..n]
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// School-year label such as `2024/2025`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Session(String);

impl Session {
    pub fn parse(raw: &str) -> ResultsResult<Session> {
        let t = raw.trim();
        let bad = || {
            ResultsError::validation_with(
                "session must look like YYYY/YYYY with consecutive years",
                json!({ "session": t }),
            )
        };
        let (start, end) = t.split_once('/').ok_or_else(bad)?;
        let four_digits = |half: &str| half.len() == 4 && half.bytes().all(|b| b.is_ascii_digit());
        if !four_digits(start) || !four_digits(end) {
            return Err(bad());
        }
        let start: i32 = start.parse().map_err(|_| bad())?;
        let end: i32 = end.parse().map_err(|_| bad())?;
        if end != start + 1 {
            return Err(bad());
        }
        Ok(Session(t.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillGrade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl SkillGrade {
    pub fn parse(raw: &str) -> ResultsResult<SkillGrade> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(SkillGrade::A),
            "B" => Ok(SkillGrade::B),
            "C" => Ok(SkillGrade::C),
            "D" => Ok(SkillGrade::D),
            "E" => Ok(SkillGrade::E),
            "F" => Ok(SkillGrade::F),
            other => Err(ResultsError::validation_with(
                "skill grade must be one of A..F",
                json!({ "grade": other }),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillGrade::A => "A",
            SkillGrade::B => "B",
            SkillGrade::C => "C",
            SkillGrade::D => "D",
            SkillGrade::E => "E",
            SkillGrade::F => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Graduated => "graduated",
        }
    }

    /// Unknown stored values read back as inactive.
    pub fn from_db(raw: &str) -> StudentStatus {
        match raw {
            "active" => StudentStatus::Active,
            "graduated" => StudentStatus::Graduated,
            _ => StudentStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub class_name: String,
    pub gender: Option<String>,
    pub picture: Option<String>,
    pub active: bool,
    pub status: StudentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub class_name: String,
}
