//! Lesson Generation Service
//!
//! This module breaks a topic into an ordered list of teaching steps and
//! produces the narration for each step and the answers to learners' doubts.
//! It also owns the deterministic fallback curriculum that both the backend
//! and the client substitute when step generation produces nothing usable.

use crate::llm_client::{CompletionOptions, LlmClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of steps requested for every lesson.
pub const STEP_COUNT: usize = 5;

const START_LIMITS: CompletionOptions = CompletionOptions::new(250);
const TEACH_LIMITS: CompletionOptions = CompletionOptions::new(700);
const DOUBT_LIMITS: CompletionOptions = CompletionOptions::new(650);

/// The deterministic, topic-derived curriculum.
pub fn fallback_steps(topic: &str) -> Vec<String> {
    vec![
        format!("Introduction to {topic}"),
        format!("Core Concepts of {topic}"),
        format!("Working of {topic}"),
        format!("Examples of {topic}"),
        format!("Summary of {topic}"),
    ]
}

/// Extracts a list of step titles from raw model output.
///
/// Markdown code fences are stripped and the outermost `[...]` span is parsed
/// as a JSON array of strings. Blank titles are dropped and the list is
/// truncated to [`STEP_COUNT`]. Returns `None` when nothing usable remains.
pub fn parse_step_list(text: &str) -> Option<Vec<String>> {
    let cleaned = strip_code_fences(text);
    let cleaned = cleaned.trim();

    let candidate = match (cleaned.find('['), cleaned.rfind(']')) {
        (Some(open), Some(close)) if open < close => &cleaned[open..=close],
        _ => cleaned,
    };

    let titles: Vec<String> = serde_json::from_str::<Vec<String>>(candidate)
        .ok()?
        .into_iter()
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .take(STEP_COUNT)
        .collect();

    (!titles.is_empty()).then_some(titles)
}

fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("```") {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 3..];
        if rest
            .get(..4)
            .is_some_and(|lang| lang.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out
}

/// The ordered steps of a lesson and whether they were substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub steps: Vec<String>,
    pub fallback: bool,
}

impl StepPlan {
    pub fn generated(steps: Vec<String>) -> Self {
        Self {
            steps,
            fallback: false,
        }
    }

    pub fn fallback(topic: &str) -> Self {
        Self {
            steps: fallback_steps(topic),
            fallback: true,
        }
    }
}

/// Defines the contract for any service that can generate lesson content.
///
/// This abstraction allows the backend to swap between an LLM-powered
/// planner and a static one while keeping the HTTP surface unchanged.
#[async_trait]
pub trait LessonPlanner: Send + Sync {
    /// Breaks `topic` into at most [`STEP_COUNT`] step titles.
    async fn plan_steps(&self, topic: &str) -> Result<StepPlan>;

    /// Explains a single step of the lesson.
    async fn teach_step(&self, topic: &str, step: &str) -> Result<String>;

    /// Answers a learner's doubt about the current step.
    async fn answer_doubt(&self, topic: &str, step: &str, question: &str) -> Result<String>;
}

/// An implementation of `LessonPlanner` that prompts an LLM.
///
/// Prompt templates are looked up by key (`start_lesson`, `teach_step`,
/// `answer_doubt`) and may reference `{topic}`, `{step}` and `{question}`.
pub struct LlmLessonPlanner {
    llm: Arc<dyn LlmClient>,
    prompts: HashMap<String, String>,
}

impl LlmLessonPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: HashMap<String, String>) -> Self {
        Self { llm, prompts }
    }

    fn render(&self, key: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .prompts
            .get(key)
            .with_context(|| format!("Missing prompt template: '{key}'"))?;
        Ok(vars.iter().fold(template.clone(), |prompt, (name, value)| {
            prompt.replace(&format!("{{{name}}}"), value)
        }))
    }
}

#[async_trait]
impl LessonPlanner for LlmLessonPlanner {
    async fn plan_steps(&self, topic: &str) -> Result<StepPlan> {
        let prompt = self.render("start_lesson", &[("topic", topic)])?;
        let answer = self.llm.complete(&prompt, START_LIMITS).await?;

        match parse_step_list(&answer) {
            Some(steps) => {
                debug!(%topic, count = steps.len(), "Parsed generated step list");
                Ok(StepPlan::generated(steps))
            }
            None => {
                warn!(%topic, "Step list was not a usable JSON array; using fallback curriculum");
                Ok(StepPlan::fallback(topic))
            }
        }
    }

    async fn teach_step(&self, topic: &str, step: &str) -> Result<String> {
        let prompt = self.render("teach_step", &[("topic", topic), ("step", step)])?;
        self.llm.complete(&prompt, TEACH_LIMITS).await
    }

    async fn answer_doubt(&self, topic: &str, step: &str, question: &str) -> Result<String> {
        let prompt = self.render(
            "answer_doubt",
            &[("topic", topic), ("step", step), ("question", question)],
        )?;
        self.llm.complete(&prompt, DOUBT_LIMITS).await
    }
}

/// A mock `LessonPlanner` for development and integration testing.
///
/// Produces the deterministic curriculum and canned narration, so lesson
/// flows can be exercised without a running model.
pub struct MockLessonPlanner;

#[async_trait]
impl LessonPlanner for MockLessonPlanner {
    async fn plan_steps(&self, topic: &str) -> Result<StepPlan> {
        Ok(StepPlan::generated(fallback_steps(topic)))
    }

    async fn teach_step(&self, topic: &str, step: &str) -> Result<String> {
        Ok(format!(
            "Let's look at {step}. This part of {topic} builds on what came before. Do you have any doubts?"
        ))
    }

    async fn answer_doubt(&self, _topic: &str, step: &str, question: &str) -> Result<String> {
        Ok(format!(
            "Good question about {step}: {question} Shall we continue?"
        ))
    }
}
