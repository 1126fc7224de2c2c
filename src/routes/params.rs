//! Query parameter helpers shared by the list endpoints.
//!
//! The types follow Rocket's `FromForm` conventions and derive `JsonSchema`
//! so the generated OpenAPI document lists the available parameters.

use crate::models::{Difficulty, QuestionKind};
use rocket::form::{self, ValueField};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

const fn default_page() -> i64 {
    1
}

const fn default_page_size() -> i64 {
    50
}

const MAX_PAGE_SIZE: i64 = 100;

fn normalized(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Common pagination parameters applied to list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    /// One-based page index (defaults to the first page).
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page (clamped between 1 and 100, default 50).
    #[field(default = 50)]
    #[serde(default = "default_page_size")]
    pub size: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// Normalized 1-based page index.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Normalized page size capped at [`MAX_PAGE_SIZE`].
    pub fn size(&self) -> i64 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.size()
    }
}

/// Query parameters accepted by the student list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct StudentListParams {
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    #[field(default = 50)]
    #[serde(default = "default_page_size")]
    pub size: i64,
    /// Case-insensitive substring matched against name and email.
    #[serde(default)]
    pub search: Option<String>,
    /// Exact (case-insensitive) major filter.
    #[serde(default)]
    pub major: Option<String>,
    /// Include deactivated students (defaults to false).
    #[field(name = "includeInactive", default = false)]
    #[serde(default)]
    pub include_inactive: bool,
}

impl StudentListParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            size: self.size,
        }
    }

    /// Lower-cased search term with surrounding whitespace removed.
    pub fn search_term(&self) -> Option<String> {
        normalized(&self.search).map(|term| term.to_lowercase())
    }

    pub fn major(&self) -> Option<String> {
        normalized(&self.major)
    }
}

/// Query parameters accepted by the question list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct QuestionListParams {
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    #[field(default = 50)]
    #[serde(default = "default_page_size")]
    pub size: i64,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub kind: Option<QuestionKind>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl QuestionListParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            size: self.size,
        }
    }

    pub fn topic(&self) -> Option<String> {
        normalized(&self.topic)
    }
}

impl<'r> form::FromFormField<'r> for QuestionKind {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        match field.value.trim().to_ascii_lowercase().as_str() {
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "true_false" => Ok(QuestionKind::TrueFalse),
            "short_answer" => Ok(QuestionKind::ShortAnswer),
            "essay" => Ok(QuestionKind::Essay),
            other => {
                Err(form::Error::validation(format!("invalid question kind '{other}'")).into())
            }
        }
    }
}

impl<'r> form::FromFormField<'r> for Difficulty {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        match field.value.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(form::Error::validation(format!(
                "invalid difficulty '{other}'; expected 'easy', 'medium' or 'hard'"
            ))
            .into()),
        }
    }
}
