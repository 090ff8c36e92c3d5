//! Tutoring assistant: prompts built from the exercise descriptor and a
//! text-in/text-out model behind the [`Tutor`] trait.

use anyhow::Result;
use futures::future::BoxFuture;
use tracing::debug;

use crate::{
    cache::RequestCache,
    catalog::Exercise,
    config::Config,
    llm::{ChatMessage, ChatOptions, LlmClient, Role},
};

pub const NOT_CONFIGURED: &str =
    "The AI tutor is not configured. Set OPENAI_API_KEY (or add it to your .techcoachrc) to get hints and feedback.";

pub const FEEDBACK_REQUEST: &str = "Please provide feedback on my code submission.";

pub trait Tutor: Send + Sync {
    /// Answers a learner question in the context of an exercise and the
    /// earlier turns of the conversation.
    fn ask<'a>(
        &'a self,
        exercise: &'a Exercise,
        code: &'a str,
        question: &'a str,
        history: &'a [ChatMessage],
    ) -> BoxFuture<'a, Result<String>>;

    /// Reviews a graded submission.
    fn feedback<'a>(
        &'a self,
        exercise: &'a Exercise,
        code: &'a str,
        raw_output: &'a str,
        passed: bool,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Tutor backed by an OpenAI-compatible chat model.
pub struct LlmTutor {
    client: LlmClient,
    opts: ChatOptions,
    cache: Option<RequestCache>,
}

impl LlmTutor {
    pub fn from_config(cfg: &Config, model: &str) -> Result<Self> {
        Ok(Self {
            client: LlmClient::from_config(cfg)?,
            opts: ChatOptions::for_model(model),
            cache: Some(RequestCache::from_config(cfg)),
        })
    }
}

impl Tutor for LlmTutor {
    fn ask<'a>(
        &'a self,
        exercise: &'a Exercise,
        code: &'a str,
        question: &'a str,
        history: &'a [ChatMessage],
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if !self.client.has_api_key() {
                return Ok(NOT_CONFIGURED.to_string());
            }
            let messages = ask_messages(exercise, code, question, history);
            self.client.complete(messages, self.opts.clone()).await
        })
    }

    fn feedback<'a>(
        &'a self,
        exercise: &'a Exercise,
        code: &'a str,
        raw_output: &'a str,
        passed: bool,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if !self.client.has_api_key() {
                return Ok(NOT_CONFIGURED.to_string());
            }
            let messages = vec![
                ChatMessage::new(Role::System, feedback_prompt(exercise, code, raw_output, passed)),
                ChatMessage::new(Role::User, FEEDBACK_REQUEST),
            ];

            let key = self.cache.as_ref().map(|cache| {
                cache.key_for(self.client.base_url(), &self.opts.model, self.opts.temperature, self.opts.top_p, &messages)
            });
            if let (Some(cache), Some(key)) = (&self.cache, &key) {
                if let Some(text) = cache.get(key) {
                    debug!(%key, "feedback served from cache");
                    return Ok(text);
                }
            }

            let text = self.client.complete(messages, self.opts.clone()).await?;
            if let (Some(cache), Some(key)) = (&self.cache, &key) {
                if !text.is_empty() {
                    cache.set(key, &text)?;
                }
            }
            Ok(text)
        })
    }
}

/// System prompt, prior turns, then the question with the current code.
pub fn ask_messages(exercise: &Exercise, code: &str, question: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(Role::System, system_prompt(exercise)));
    messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
    let content = if code.trim().is_empty() {
        question.to_string()
    } else {
        format!("My code so far:\n```python\n{}\n```\n\nMy question: {}", code, question)
    };
    messages.push(ChatMessage::new(Role::User, content));
    messages
}

fn exercise_context(exercise: &Exercise, out: &mut String) {
    out.push_str(&format!(
        "EXERCISE: {}\nDIFFICULTY: {}\nDESCRIPTION: {}\n",
        exercise.title, exercise.difficulty, exercise.description
    ));
    if !exercise.examples.is_empty() {
        out.push_str("\nEXAMPLES:\n");
        for ex in &exercise.examples {
            out.push_str(&format!("Input: {}\nOutput: {}\n", ex.input, ex.output));
            if let Some(explanation) = &ex.explanation {
                out.push_str(&format!("Explanation: {}\n", explanation));
            }
            out.push('\n');
        }
    }
    if !exercise.constraints.is_empty() {
        out.push_str(&format!("\nCONSTRAINTS:\n{}\n", exercise.constraints.join("\n")));
    }
}

pub fn system_prompt(exercise: &Exercise) -> String {
    let mut out = String::from(
        "You are the learning assistant of TechCoach, a Python coding practice platform. \
         You are helping a learner with this exercise:\n\n",
    );
    exercise_context(exercise, &mut out);
    if !exercise.hints.is_empty() {
        out.push_str(&format!("\nHINTS:\n{}\n", exercise.hints.join("\n")));
    }
    out.push_str(&format!(
        "\nREFERENCE SOLUTION (guide the learner towards it, never reveal it in full):\n{}\nCode: {}\n",
        exercise.solution.explanation, exercise.solution.code
    ));
    out.push_str(
        "\nTeach rather than answer. Explain the next step, point at the part of the code that is \
         wrong, and show partial snippets in ```python blocks when they help. Never hand over the \
         complete solution, stay patient with frustrated learners and correct misconceptions \
         politely. Format replies in Markdown and keep them focused.",
    );
    out
}

pub fn feedback_prompt(exercise: &Exercise, code: &str, raw_output: &str, passed: bool) -> String {
    let mut out = String::from("You are a coding tutor reviewing a learner's Python solution.\n\n");
    exercise_context(exercise, &mut out);
    out.push_str(&format!(
        "\nREFERENCE SOLUTION (for your judgement only, do not reveal it):\n{}\n",
        exercise.solution.code
    ));
    out.push_str(&format!("\nLEARNER'S CODE:\n```python\n{}\n```\n", code));
    out.push_str(&format!("\nTEST RESULTS:\n{}\n", raw_output));
    out.push_str(&format!(
        "\nTHE SUBMISSION {} THE TESTS.\n\n",
        if passed { "PASSED" } else { "FAILED" }
    ));
    if passed {
        out.push_str(
            "Congratulate the learner briefly, then suggest two or three concrete improvements \
             (efficiency, readability, idioms). Mention a better approach if there is one without \
             writing it out. Stay under 250 words and use Markdown.",
        );
    } else {
        out.push_str(
            "Point out what in the code made the tests fail and how to fix it without giving the \
             complete solution. Briefly correct any conceptual misunderstanding. Stay under 250 \
             words, be encouraging and use Markdown.",
        );
    }
    out
}
