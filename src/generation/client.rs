use super::config::GenerationConfig;
use super::error::GenerationError;
use crate::models::{Difficulty, NewQuestion, QuestionKind};
use crate::retry::with_retry;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the teacher asks the generator for.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub topic: String,
    pub count: usize,
    pub difficulty: Option<Difficulty>,
    pub kind: Option<QuestionKind>,
}

/// One question as returned by the generation API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedQuestion {
    pub prompt: String,
    #[serde(default)]
    pub kind: Option<QuestionKind>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

impl GeneratedQuestion {
    /// Fill in request-level defaults for fields the generator left out.
    pub fn into_new_question(self, request: &GenerationRequest) -> NewQuestion {
        let kind = self.kind.or(request.kind).unwrap_or(if self.options.is_empty() {
            QuestionKind::ShortAnswer
        } else {
            QuestionKind::MultipleChoice
        });

        NewQuestion {
            prompt: self.prompt,
            kind,
            options: self.options,
            answer: self.answer,
            topic: Some(request.topic.clone()),
            difficulty: request.difficulty,
        }
    }
}

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    topic: &'a str,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<QuestionKind>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Wrapped { questions: Vec<GeneratedQuestion> },
    Bare(Vec<GeneratedQuestion>),
}

impl GenerateResponse {
    fn into_questions(self) -> Vec<GeneratedQuestion> {
        match self {
            GenerateResponse::Wrapped { questions } => questions,
            GenerateResponse::Bare(questions) => questions,
        }
    }
}

#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or(GenerationError::NotConfigured)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("classroom-api/0.1")
            .build()?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Ask the generation API for questions, retrying with backoff.
    pub async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        let count = request.count.clamp(1, self.config.max_questions.max(1));
        let policy = self.config.retry;

        with_retry(
            || self.dispatch(request, count),
            policy.max_attempts,
            policy.base_delay,
        )
        .await
    }

    async fn dispatch(
        &self,
        request: &GenerationRequest,
        count: usize,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        let url = format!("{}/generate", self.base_url);
        let payload = GeneratePayload {
            topic: &request.topic,
            count,
            difficulty: request.difficulty,
            kind: request.kind,
            model: &self.config.model,
        };

        let mut builder = self.http.post(url).json(&payload);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        let questions = parsed.into_questions();
        if questions.is_empty() {
            return Err(GenerationError::Empty);
        }

        log::debug!(
            "generation: received {} questions for topic '{}'",
            questions.len(),
            request.topic
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            topic: "Photosynthesis".into(),
            count: 2,
            difficulty: Some(Difficulty::Easy),
            kind: None,
        }
    }

    #[test]
    fn accepts_wrapped_and_bare_responses() {
        let wrapped: GenerateResponse = serde_json::from_str(
            r#"{"questions":[{"prompt":"What gas do plants absorb?","options":["CO2","O2"],"answer":"CO2"}]}"#,
        )
        .expect("wrapped body");
        assert_eq!(wrapped.into_questions().len(), 1);

        let bare: GenerateResponse =
            serde_json::from_str(r#"[{"prompt":"Define chlorophyll."},{"prompt":"Why green?"}]"#)
                .expect("bare body");
        assert_eq!(bare.into_questions().len(), 2);
    }

    #[test]
    fn infers_kind_from_options() {
        let with_options = GeneratedQuestion {
            prompt: "Pick one".into(),
            kind: None,
            options: vec!["a".into(), "b".into()],
            answer: Some("a".into()),
        };
        let question = with_options.into_new_question(&request());
        assert_eq!(question.kind, QuestionKind::MultipleChoice);
        assert_eq!(question.topic.as_deref(), Some("Photosynthesis"));
        assert_eq!(question.difficulty, Some(Difficulty::Easy));

        let open = GeneratedQuestion {
            prompt: "Explain".into(),
            kind: None,
            options: Vec::new(),
            answer: None,
        };
        assert_eq!(open.into_new_question(&request()).kind, QuestionKind::ShortAnswer);
    }

    #[test]
    fn client_requires_base_url() {
        let config = GenerationConfig {
            base_url: None,
            api_key: None,
            model: "default".into(),
            request_timeout: Duration::from_secs(1),
            max_questions: 5,
            retry: crate::retry::RetryPolicy::default(),
        };
        assert!(matches!(
            GenerationClient::new(config),
            Err(GenerationError::NotConfigured)
        ));
    }
}
