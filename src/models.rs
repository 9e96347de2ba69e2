use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub system_prompt: String,
    pub evaluation_prompt: String,
}

/// `{id, title}` projection used by the listing endpoint.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonSummary {
    pub id: String,
    pub title: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Rubric {
    pub lesson_id: String,
    pub criterion: String,
    pub max_score: i32,
}

/// One user/assistant exchange as supplied by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatRequest {
    pub lesson_id: String,
    pub user_input: String,
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatResponse {
    pub response: String,
    /// Rubric ceilings keyed by criterion; a placeholder until the
    /// conversation is actually evaluated.
    pub scores: BTreeMap<String, i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScoreRequest {
    pub lesson_id: String,
    pub chat_history: Vec<ChatTurn>,
}

/// Per-criterion verdict in the evaluator's reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CriterionScore {
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub feedback: String,
}

/// The structure the evaluator model is asked to reply with: one entry per
/// criterion, plus overall suggestions and a strength summary. Criterion
/// entries sit at the top level of the JSON object next to the two named
/// fields, so the serialized form matches what gets logged and returned.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    #[serde(flatten)]
    pub criteria: BTreeMap<String, CriterionScore>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub strength: String,
}

impl ScoreBreakdown {
    /// Stand-in breakdown when the evaluator's reply cannot be parsed: every
    /// rubric criterion present with no score and empty feedback.
    pub fn fallback(rubrics: &[Rubric]) -> Self {
        Self {
            criteria: rubrics
                .iter()
                .map(|r| {
                    (
                        r.criterion.clone(),
                        CriterionScore {
                            score: None,
                            feedback: String::new(),
                        },
                    )
                })
                .collect(),
            suggestions: Vec::new(),
            strength: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScoreResponse {
    pub scores: ScoreBreakdown,
    pub rubric: Vec<Rubric>,
    pub suggestions: Vec<String>,
    pub strength: String,
}

/// Append-only record of one scoring interaction. Written by the scoring
/// endpoint, never read back.
#[derive(Debug, Clone)]
pub struct NewChatLog {
    pub lesson_id: String,
    pub chat_history: Vec<ChatTurn>,
    pub scores: ScoreBreakdown,
    pub timestamp: DateTime<Utc>,
    pub system_prompt: String,
    pub evaluation_prompt: String,
}
