//! HTTP generator backed by an OpenAI-compatible chat completions API
//!
//! Prompts the model for a JSON task breakdown and parses it, tolerating
//! markdown code fences around the payload. Transient HTTP errors are
//! retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::domain::{Task, TaskSeed};

use super::{GeneratedTasks, GeneratorError, SubtaskGenerator, TaskGenerator, check_depth};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

const TASKS_SYSTEM_PROMPT: &str = "You are an AI task planning assistant. Your role is to break down \
objectives into actionable, specific tasks.\n\
IMPORTANT RULES:\n\
1. Generate exactly 8-12 tasks\n\
2. Each task must be specific and actionable\n\
3. Order tasks logically (dependencies first)\n\
4. Assign priority 1-10 (1=highest, 10=lowest)\n\
5. Include diverse task types: research, planning, execution, testing, documentation\n\
6. Return ONLY valid JSON, no markdown formatting\n\
Return format:\n\
{\"tasks\": [{\"title\": \"...\", \"priority\": 1, \"category\": \"research\", \"estimatedTime\": \"15 minutes\"}], \"insights\": \"...\"}";

const SUBTASKS_SYSTEM_PROMPT: &str = "You are an AI subtask generator. Break down a specific task into \
3-5 micro-tasks.\n\
IMPORTANT RULES:\n\
1. Generate exactly 3-5 subtasks\n\
2. Each subtask should be very specific and granular\n\
3. Focus ONLY on the parent task - don't expand scope\n\
4. Order subtasks in logical execution order\n\
5. Return ONLY valid JSON, no markdown formatting\n\
Return format:\n\
{\"subtasks\": [{\"title\": \"...\", \"priority\": 1, \"estimatedTime\": \"5-15 minutes\"}]}";

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Strip a surrounding ```json ... ``` fence, if present
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// OpenAI-compatible chat completions generator
#[derive(Debug)]
pub struct HttpGenerator {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl HttpGenerator {
    /// Create a generator from configuration
    ///
    /// Fails when the configured API key environment variable is unset;
    /// callers treat that as "no generator" and use the fallback seeds.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        debug!(model = %config.model, base_url = %config.base_url, "HttpGenerator::from_config: called");
        let api_key = config
            .api_key()
            .ok_or_else(|| GeneratorError::MissingApiKey(config.api_key_env.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
        })
    }

    /// Send one chat completion request and return the message content
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, GeneratorError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": 0.7,
        });

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "complete: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "complete: network error");
                    last_error = Some(GeneratorError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "complete: retryable error");
                last_error = Some(GeneratorError::Api { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                debug!(%status, "complete: API error");
                let text = response.text().await.unwrap_or_default();
                return Err(GeneratorError::Api { status, message: text });
            }

            let api_response: ChatResponse = response.json().await?;
            let content = api_response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| GeneratorError::InvalidResponse("empty completion".to_string()))?;
            debug!(content_len = content.len(), "complete: success");
            return Ok(content);
        }

        Err(last_error.unwrap_or_else(|| GeneratorError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl TaskGenerator for HttpGenerator {
    async fn generate(
        &self,
        objective: &str,
        description: &str,
        context: Option<&str>,
    ) -> Result<GeneratedTasks, GeneratorError> {
        debug!(%objective, "HttpGenerator::generate tasks: called");

        let mut user_prompt = format!("Objective: {}\n", objective);
        if !description.is_empty() {
            user_prompt.push_str(&format!("Context: {}\n", description));
        }
        if let Some(context) = context {
            user_prompt.push_str(&format!("Additional context: {}\n", context));
        }
        user_prompt.push_str("\nGenerate a comprehensive task breakdown for this objective.");

        let content = self.complete(TASKS_SYSTEM_PROMPT, &user_prompt).await?;
        let payload: TasksPayload = serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| GeneratorError::InvalidResponse(format!("bad task JSON: {}", e)))?;

        if payload.tasks.is_empty() {
            return Err(GeneratorError::InvalidResponse("generator returned no tasks".to_string()));
        }

        Ok(GeneratedTasks {
            seeds: payload.tasks,
            insights: payload.insights,
        })
    }
}

#[async_trait]
impl SubtaskGenerator for HttpGenerator {
    async fn generate(&self, parent: &Task, objective: &str, depth: u8) -> Result<Vec<TaskSeed>, GeneratorError> {
        debug!(parent_id = %parent.id, depth, "HttpGenerator::generate subtasks: called");
        check_depth(depth)?;

        let user_prompt = format!(
            "Parent Task: {}\nOverall Objective: {}\nCurrent Depth: {}\n\n\
             Break this task into 3-5 concrete subtasks that will help complete it.",
            parent.title, objective, depth
        );

        let content = self.complete(SUBTASKS_SYSTEM_PROMPT, &user_prompt).await?;
        let payload: SubtasksPayload = serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| GeneratorError::InvalidResponse(format!("bad subtask JSON: {}", e)))?;

        if payload.subtasks.is_empty() {
            return Err(GeneratorError::InvalidResponse("generator returned no subtasks".to_string()));
        }

        Ok(payload.subtasks)
    }
}

// Chat completions response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

// Generator payload shapes

#[derive(Debug, Deserialize)]
struct TasksPayload {
    tasks: Vec<TaskSeed>,
    #[serde(default)]
    insights: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubtasksPayload {
    subtasks: Vec<TaskSeed>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_plain() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_bare_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_tasks_payload_parsing() {
        let content = r#"{
            "tasks": [
                {"title": "Research the market", "priority": 1, "category": "research", "estimatedTime": "15 minutes"},
                {"title": "Draft the plan", "priority": 2}
            ],
            "insights": "Straightforward objective"
        }"#;
        let payload: TasksPayload = serde_json::from_str(content).unwrap();
        assert_eq!(payload.tasks.len(), 2);
        assert_eq!(payload.tasks[0].estimated_time.as_deref(), Some("15 minutes"));
        assert_eq!(payload.insights.as_deref(), Some("Straightforward objective"));
    }

    #[test]
    fn test_subtasks_payload_parsing() {
        let content = r#"{"subtasks": [{"title": "Step one", "priority": 1, "estimatedTime": "5 minutes"}]}"#;
        let payload: SubtasksPayload = serde_json::from_str(content).unwrap();
        assert_eq!(payload.subtasks.len(), 1);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let mut config = GeneratorConfig::default();
        config.api_key_env = "GOALDAEMON_TEST_KEY_THAT_DOES_NOT_EXIST".to_string();

        let err = HttpGenerator::from_config(&config).unwrap_err();
        assert!(matches!(err, GeneratorError::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn test_subtask_depth_rejected_before_any_request() {
        // Depth guard fires before touching the network
        // SAFETY: test-only env mutation
        unsafe {
            std::env::set_var("GD_HTTP_TEST_KEY", "test-key");
        }
        let mut config = GeneratorConfig::default();
        config.api_key_env = "GD_HTTP_TEST_KEY".to_string();
        let generator = HttpGenerator::from_config(&config).unwrap();

        let parent = Task::with_id("t1", "Deep task", 1);
        let err = SubtaskGenerator::generate(&generator, &parent, "Goal", 3).await.unwrap_err();
        assert!(matches!(err, GeneratorError::DepthExceeded(3)));
    }
}
