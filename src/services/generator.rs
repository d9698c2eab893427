use crate::config::Config;
use crate::error::{NotionAssistantError, Result};
use crate::types::{EntryAnalysis, FetchedContent, LogEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Client for a locally hosted Ollama model.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Local models are slow; only the connect phase gets the short timeout.
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_base_url.as_str().trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("Sending {} byte prompt to {} ({})", prompt.len(), url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(NotionAssistantError::Generation {
                reason: format!("Ollama returned {}: {}", status.as_u16(), detail.trim()),
            });
        }

        let generated: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| NotionAssistantError::Generation {
                    reason: format!("Malformed Ollama response: {}", e),
                })?;

        Ok(generated.response)
    }

    /// Asks the model for a short summary and an importance score in [0, 1].
    pub async fn analyze_entry(&self, text: &str, date: NaiveDate) -> Result<EntryAnalysis> {
        info!("Analyzing log entry from {}", date);
        let response = self.generate(&Self::analysis_prompt(text, date)).await?;
        Ok(Self::parse_analysis(&response))
    }

    /// Runs `analyze_entry` over each entry in order and stores the results.
    pub async fn analyze_entries(&self, entries: &mut [LogEntry]) -> Result<()> {
        for entry in entries.iter_mut() {
            let analysis = self.analyze_entry(&entry.raw_text, entry.date).await?;
            entry.apply_analysis(analysis);
        }
        Ok(())
    }

    /// Answers a question using the fetched page as context.
    pub async fn answer(&self, content: &FetchedContent, question: &str) -> Result<String> {
        info!("Asking {} about '{}'", self.model, content.title);
        let answer = self.generate(&Self::question_prompt(content, question)).await?;
        Ok(answer.trim().to_string())
    }

    fn analysis_prompt(text: &str, date: NaiveDate) -> String {
        format!(
            "Analyze this log entry from {date} and provide:\n\
             1. A concise summary (max 2 sentences)\n\
             2. An importance score between 0 and 1 (where 1 is most important)\n\
             \n\
             Log entry:\n\
             {text}\n\
             \n\
             Format your response as:\n\
             SUMMARY: <your summary>\n\
             IMPORTANCE: <score>\n\
             \n\
             Focus on key events, decisions, and insights.",
            date = date.format("%Y-%m-%d"),
        )
    }

    fn question_prompt(content: &FetchedContent, question: &str) -> String {
        format!(
            "You are given the contents of the Notion {kind} \"{title}\".\n\
             \n\
             ---\n\
             {body}\n\
             ---\n\
             \n\
             Using only the content above, answer the question below.\n\
             Question: {question}",
            kind = content.kind,
            title = content.title,
            body = content.to_text(),
        )
    }

    fn parse_analysis(response: &str) -> EntryAnalysis {
        let mut summary = String::new();
        let mut importance = LogEntry::DEFAULT_IMPORTANCE;

        for line in response.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("SUMMARY:") {
                summary = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("IMPORTANCE:") {
                match rest.trim().parse::<f64>() {
                    Ok(score) if score.is_finite() => importance = score.clamp(0.0, 1.0),
                    _ => warn!("Unparseable importance score: {}", rest.trim()),
                }
            }
        }

        EntryAnalysis {
            summary,
            importance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis() {
        let analysis = OllamaClient::parse_analysis(
            "Sure!\nSUMMARY: Shipped the parser.\nIMPORTANCE: 0.8\n",
        );
        assert_eq!(analysis.summary, "Shipped the parser.");
        assert_eq!(analysis.importance, 0.8);
    }

    #[test]
    fn test_parse_analysis_clamps_and_defaults() {
        assert_eq!(OllamaClient::parse_analysis("IMPORTANCE: 7").importance, 1.0);
        assert_eq!(OllamaClient::parse_analysis("IMPORTANCE: -2").importance, 0.0);

        let fallback = OllamaClient::parse_analysis("IMPORTANCE: very high");
        assert_eq!(fallback.importance, LogEntry::DEFAULT_IMPORTANCE);
        assert!(fallback.summary.is_empty());
    }

    #[test]
    fn test_analysis_prompt_includes_date_and_text() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
        let prompt = OllamaClient::analysis_prompt("went hiking", date);
        assert!(prompt.contains("from 2024-03-28"));
        assert!(prompt.contains("went hiking"));
        assert!(prompt.contains("IMPORTANCE: <score>"));
    }

    #[test]
    fn test_with_model_overrides_config() {
        let client = OllamaClient::new(&Config::default()).unwrap().with_model("mistral");
        assert_eq!(client.model(), "mistral");
    }
}
