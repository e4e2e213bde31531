//! Sub-question decomposition, answering, and answer filtering

use super::compose;
use super::parsing::{keyed_values, kept_indices, ParseSource};
use super::{MethodParams, ReformulatedQuery, ReformulationMethod};
use crate::data::Query;
use crate::error::Result;
use crate::llm::{CompletionClient, PromptBank};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Three-stage expansion: decompose the query into sub-questions, answer
/// each, then ask the model which answers to keep. Retained answers are
/// folded in behind the repeated query.
///
/// Each stage parses its completion best-effort; a malformed stage degrades
/// (line-split questions or answers, keep-all filtering) instead of
/// failing, and degraded stages are recorded in the output metadata.
pub struct QaExpand {
    llm: Arc<dyn CompletionClient>,
    prompts: Arc<PromptBank>,
    params: MethodParams,
}

impl QaExpand {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        prompts: Arc<PromptBank>,
        params: MethodParams,
    ) -> Self {
        Self {
            llm,
            prompts,
            params,
        }
    }
}

#[async_trait]
impl ReformulationMethod for QaExpand {
    fn name(&self) -> &'static str {
        "qa_expand"
    }

    async fn reformulate(&self, query: &Query, _contexts: &[String]) -> Result<ReformulatedQuery> {
        let num_subq = self.params.num_subquestions.unwrap_or(3);
        let query_repeats = self.params.query_repeats.unwrap_or(3);

        // Stage 1: decompose into sub-questions
        let msgs = self
            .prompts
            .render("qa_expand_subq", &[("query", &query.text)])?;
        let raw_subq = self.llm.generate_one(&msgs).await?;
        let subquestions = keyed_values(&raw_subq, num_subq, "question");

        // Stage 2: answer each sub-question
        let questions_json = to_keyed_json("question", &subquestions.values);
        let msgs = self
            .prompts
            .render("qa_expand_answer", &[("questions", &questions_json)])?;
        let raw_answers = self.llm.generate_one(&msgs).await?;
        let answers = keyed_values(&raw_answers, num_subq, "answer");

        // Stage 3: keep only the answers the model marks relevant
        let answers_json = to_keyed_json("answer", &answers.values);
        let msgs = self.prompts.render(
            "qa_expand_refine",
            &[("query", &query.text), ("answers", &answers_json)],
        )?;
        let raw_refine = self.llm.generate_one(&msgs).await?;
        let kept = kept_indices(&raw_refine, num_subq, "answer");

        let selected: Vec<String> = kept
            .indices
            .iter()
            .filter_map(|&i| answers.values.get(i))
            .filter(|a| !a.trim().is_empty())
            .map(|a| compose::clean(a))
            .collect();
        let reformulated = compose::repeat(&query.text, &selected.join(" "), query_repeats);

        let mut fallback_stages = Vec::new();
        if subquestions.source == ParseSource::Fallback {
            fallback_stages.push("decompose");
        }
        if answers.source == ParseSource::Fallback {
            fallback_stages.push("answer");
        }
        if kept.source == ParseSource::Fallback {
            fallback_stages.push("refine");
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("subquestions".to_string(), json!(subquestions.values));
        metadata.insert("answers".to_string(), json!(answers.values));
        metadata.insert("kept_indices".to_string(), json!(kept.indices));
        if !fallback_stages.is_empty() {
            metadata.insert("fallback_stages".to_string(), json!(fallback_stages));
        }

        Ok(ReformulatedQuery {
            qid: query.qid.clone(),
            original: query.text.clone(),
            reformulated,
            metadata,
        })
    }
}

fn to_keyed_json(prefix: &str, values: &[String]) -> String {
    let mut map = serde_json::Map::new();
    for (i, value) in values.iter().enumerate() {
        map.insert(format!("{prefix}{}", i + 1), json!(value));
    }
    serde_json::Value::Object(map).to_string()
}
