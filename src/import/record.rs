//! Candidate student records.
//!
//! A [`CandidateRecord`] can only be obtained by validating a
//! [`StudentFields`] value, so every record that reaches the pipeline already
//! satisfies the field constraints (non-empty name and major, well-formed
//! email, GPA within 0.0..=4.0, known academic level).

use crate::models::{AcademicLevel, NewStudent};
use regex::Regex;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

pub const MIN_GPA: f64 = 0.0;
pub const MAX_GPA: f64 = 4.0;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("name is required")]
    MissingName,
    #[error("major is required")]
    MissingMajor,
    #[error("invalid email address '{0}'")]
    InvalidEmail(String),
    #[error("GPA {0} is outside the range 0.0-4.0")]
    GpaOutOfRange(f64),
    #[error("{0}")]
    UnknownAcademicLevel(String),
}

/// Raw, unvalidated student fields as they arrive from a CSV row or a JSON
/// request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentFields {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub major: String,
    pub academic_level: String,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub career_interests: Vec<String>,
}

impl StudentFields {
    /// Validate the fields and attach the 1-based source row number.
    pub fn into_candidate(self, row_number: usize) -> Result<CandidateRecord, RecordError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(RecordError::MissingName);
        }

        let major = self.major.trim().to_string();
        if major.is_empty() {
            return Err(RecordError::MissingMajor);
        }

        let email = match self.email.map(|email| email.trim().to_string()) {
            Some(email) if email.is_empty() => None,
            Some(email) if EMAIL_PATTERN.is_match(&email) => Some(email),
            Some(email) => return Err(RecordError::InvalidEmail(email)),
            None => None,
        };

        let academic_level = self
            .academic_level
            .parse::<AcademicLevel>()
            .map_err(RecordError::UnknownAcademicLevel)?;

        if let Some(gpa) = self.gpa {
            if !gpa.is_finite() || !(MIN_GPA..=MAX_GPA).contains(&gpa) {
                return Err(RecordError::GpaOutOfRange(gpa));
            }
        }

        let career_interests = self
            .career_interests
            .into_iter()
            .map(|interest| interest.trim().to_string())
            .filter(|interest| !interest.is_empty())
            .collect();

        Ok(CandidateRecord {
            row_number,
            name,
            email,
            major,
            academic_level,
            gpa: self.gpa,
            career_interests,
        })
    }
}

/// One validated, not-yet-persisted student row.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    row_number: usize,
    name: String,
    email: Option<String>,
    major: String,
    academic_level: AcademicLevel,
    gpa: Option<f64>,
    career_interests: Vec<String>,
}

impl CandidateRecord {
    pub fn row_number(&self) -> usize {
        self.row_number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn major(&self) -> &str {
        &self.major
    }

    pub fn academic_level(&self) -> AcademicLevel {
        self.academic_level
    }

    pub fn gpa(&self) -> Option<f64> {
        self.gpa
    }

    pub fn career_interests(&self) -> &[String] {
        &self.career_interests
    }

    /// Convert into the insert payload. Absent optional fields stay absent.
    pub fn into_new_student(self) -> NewStudent {
        NewStudent {
            name: self.name,
            email: self.email,
            major: self.major,
            academic_level: self.academic_level,
            gpa: self.gpa,
            career_interests: self.career_interests,
            additional_info: None,
        }
    }
}
