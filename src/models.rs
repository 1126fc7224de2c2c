use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, FromRow};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ===== Response Wrappers =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub page: i64,
    pub size: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: PageMetadata,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, size: i64, total: i64) -> Self {
        Self {
            data,
            page: PageMetadata { page, size, total },
        }
    }
}

// ===== Student Models =====

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, sqlx::Type, PartialEq, Eq, Hash,
)]
#[sqlx(type_name = "academic_level", rename_all = "lowercase")]
pub enum AcademicLevel {
    Freshman,
    Sophomore,
    Junior,
    Senior,
    Graduate,
}

impl AcademicLevel {
    pub const ALL: [AcademicLevel; 5] = [
        AcademicLevel::Freshman,
        AcademicLevel::Sophomore,
        AcademicLevel::Junior,
        AcademicLevel::Senior,
        AcademicLevel::Graduate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicLevel::Freshman => "Freshman",
            AcademicLevel::Sophomore => "Sophomore",
            AcademicLevel::Junior => "Junior",
            AcademicLevel::Senior => "Senior",
            AcademicLevel::Graduate => "Graduate",
        }
    }
}

impl fmt::Display for AcademicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcademicLevel {
    type Err = String;

    /// Case-insensitive match against the fixed set of levels.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        AcademicLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown academic level '{trimmed}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub teacher_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub major: String,
    pub academic_level: AcademicLevel,
    pub gpa: Option<f64>,
    pub career_interests: Vec<String>,
    pub additional_info: Option<Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field set for a student row about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub name: String,
    pub email: Option<String>,
    pub major: String,
    pub academic_level: AcademicLevel,
    pub gpa: Option<f64>,
    pub career_interests: Vec<String>,
    pub additional_info: Option<Value>,
}

// ===== Question Models =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub teacher_id: i32,
    pub prompt: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a question, also used for generated questions
/// before they are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl NewQuestion {
    /// Trim text fields and check the shape required by the question kind.
    pub fn normalized(self) -> Result<Self, String> {
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err("question prompt must not be empty".to_string());
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|option| option.trim().to_string())
            .filter(|option| !option.is_empty())
            .collect();

        let answer = self
            .answer
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty());

        match self.kind {
            QuestionKind::MultipleChoice if options.len() < 2 => {
                return Err("multiple choice questions need at least two options".to_string());
            }
            QuestionKind::TrueFalse => {
                if let Some(answer) = &answer {
                    if !answer.eq_ignore_ascii_case("true") && !answer.eq_ignore_ascii_case("false")
                    {
                        return Err("true/false answers must be 'true' or 'false'".to_string());
                    }
                }
            }
            _ => {}
        }

        if let Some(answer) = &answer {
            if !options.is_empty() && !options.iter().any(|option| option == answer) {
                return Err(format!("answer '{answer}' is not one of the options"));
            }
        }

        Ok(Self {
            prompt,
            kind: self.kind,
            options,
            answer,
            topic: self
                .topic
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty()),
            difficulty: self.difficulty,
        })
    }
}

// ===== Exam Models =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    pub teacher_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamWithQuestions {
    #[serde(flatten)]
    pub exam: Exam,
    pub questions: Vec<Question>,
}

// ===== Audit Log Models =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub teacher_id: i32,
    pub action: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind, options: &[&str], answer: Option<&str>) -> NewQuestion {
        NewQuestion {
            prompt: "  What is 2 + 2?  ".to_string(),
            kind,
            options: options.iter().map(|s| s.to_string()).collect(),
            answer: answer.map(str::to_string),
            topic: Some("  ".to_string()),
            difficulty: None,
        }
    }

    #[test]
    fn academic_level_parses_case_insensitively() {
        assert_eq!(
            "  sophomore ".parse::<AcademicLevel>(),
            Ok(AcademicLevel::Sophomore)
        );
        assert_eq!("GRADUATE".parse::<AcademicLevel>(), Ok(AcademicLevel::Graduate));
        assert!("postdoc".parse::<AcademicLevel>().is_err());
    }

    #[test]
    fn multiple_choice_requires_two_options() {
        let err = question(QuestionKind::MultipleChoice, &["4"], Some("4"))
            .normalized()
            .unwrap_err();
        assert!(err.contains("at least two options"));
    }

    #[test]
    fn answer_must_match_an_option() {
        let err = question(QuestionKind::MultipleChoice, &["3", "4"], Some("5"))
            .normalized()
            .unwrap_err();
        assert!(err.contains("not one of the options"));

        let ok = question(QuestionKind::MultipleChoice, &[" 3 ", "4", ""], Some("4"))
            .normalized()
            .expect("valid question");
        assert_eq!(ok.prompt, "What is 2 + 2?");
        assert_eq!(ok.options, vec!["3".to_string(), "4".to_string()]);
        assert_eq!(ok.topic, None);
    }

    #[test]
    fn true_false_answers_are_checked() {
        assert!(
            question(QuestionKind::TrueFalse, &[], Some("maybe"))
                .normalized()
                .is_err()
        );
        assert!(
            question(QuestionKind::TrueFalse, &[], Some("True"))
                .normalized()
                .is_ok()
        );
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let mut q = question(QuestionKind::Essay, &[], None);
        q.prompt = "   ".to_string();
        assert!(q.normalized().is_err());
    }
}
