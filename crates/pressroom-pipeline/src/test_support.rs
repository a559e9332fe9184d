//! Shared fixtures for phase and runner tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use pressroom_ai::{AiError, GenerationRequest, TextGenerator};
use pressroom_core::SiteConfig;
use pressroom_db::DraftRow;

/// Scriptable in-memory provider. `ok`/`failing` repeat one response
/// forever; `sequence` plays responses in order. Prompts are recorded
/// for assertions.
pub(crate) struct StaticGenerator {
    queue: Mutex<VecDeque<Result<Value, String>>>,
    fallback: Option<Result<Value, String>>,
    prompts: Mutex<Vec<String>>,
}

impl StaticGenerator {
    pub(crate) fn ok(value: Value) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(Ok(value)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(Err(message.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sequence(items: Vec<Result<Value, String>>) -> Self {
        Self {
            queue: Mutex::new(items.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for StaticGenerator {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate_structured(
        &self,
        request: &GenerationRequest,
    ) -> Result<Value, AiError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(AiError::Api {
                status: 500,
                message,
            }),
            None => Err(AiError::Api {
                status: 500,
                message: "script exhausted".to_string(),
            }),
        }
    }
}

pub(crate) fn site() -> SiteConfig {
    let mut voice = BTreeMap::new();
    voice.insert("en".to_string(), "Warm, practical travel writing.".to_string());
    voice.insert("es".to_string(), "Escritura de viajes cálida y práctica.".to_string());
    SiteConfig {
        name: "Coastal Escapes".to_string(),
        destination: "coastalescapes.example".to_string(),
        primary_locale: "en".to_string(),
        alternate_locale: Some("es".to_string()),
        voice,
        keyword_templates: vec!["weekend coastal trips {month} {year}".to_string()],
        keywords: None,
        reservoir_capacity: Some(10),
    }
}

pub(crate) fn site_without_alternate() -> SiteConfig {
    let mut config = site();
    config.alternate_locale = None;
    config
}

pub(crate) fn draft_in_phase(phase: &str) -> DraftRow {
    let now = Utc::now();
    DraftRow {
        id: 1,
        public_id: Uuid::new_v4(),
        site_slug: "coastal-escapes".to_string(),
        keyword: "weekend coastal trips".to_string(),
        locale: "en".to_string(),
        phase: phase.to_string(),
        sections_total: 0,
        sections_completed: 0,
        research: None,
        outline: None,
        sections: None,
        body_html: None,
        body_html_alt: None,
        seo: None,
        score: None,
        readability: None,
        phase_attempts: 0,
        last_error: None,
        rejection_reason: None,
        paired_draft_id: None,
        topic_id: None,
        created_at: now,
        updated_at: now,
        phase_started_at: None,
        completed_at: None,
    }
}
