use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::db::LessonStore;
use crate::error::ApiError;
use crate::llm::{CompletionClient, CompletionRequest, Message, CHAT_MODEL, EVAL_MODEL};
use crate::models::{
    ChatRequest, ChatResponse, ChatTurn, Lesson, LessonSummary, NewChatLog, Rubric,
    ScoreBreakdown, ScoreRequest, ScoreResponse,
};

/// Sampling temperature for the tutoring persona.
const CHAT_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for the evaluator.
const EVAL_TEMPERATURE: f32 = 0.2;

/// Injected collaborators shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LessonStore>,
    pub llm: Arc<dyn CompletionClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/lessons", get(list_lessons))
        .route("/lessons/:lesson_id", get(lesson_detail))
        .route("/chat", post(chat))
        .route("/score", post(score_conversation))
        .with_state(state)
}

async fn list_lessons(
    State(state): State<AppState>,
) -> Result<Json<Vec<LessonSummary>>, ApiError> {
    let lessons = state
        .store
        .list_lessons()
        .await
        .map_err(|e| ApiError::store("Could not load lessons.", e))?;
    Ok(Json(lessons))
}

async fn lesson_detail(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
) -> Result<Json<Lesson>, ApiError> {
    let lesson = state
        .store
        .fetch_lesson(&lesson_id)
        .await
        .map_err(|e| ApiError::store("Could not fetch lesson", e))?
        .ok_or(ApiError::LessonNotFound)?;
    Ok(Json(lesson))
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let lesson = state
        .store
        .fetch_lesson(&req.lesson_id)
        .await?
        .ok_or(ApiError::LessonNotFound)?;

    let rubrics = state.store.rubrics_for_lesson(&req.lesson_id).await?;

    let messages = build_chat_messages(&lesson.system_prompt, &req.chat_history, &req.user_input);
    let reply = state
        .llm
        .complete(CompletionRequest {
            model: CHAT_MODEL.to_owned(),
            messages,
            temperature: CHAT_TEMPERATURE,
        })
        .await?;

    // Rubric ceilings stand in until the conversation is actually evaluated.
    let scores = placeholder_scores(&rubrics);

    Ok(Json(ChatResponse {
        response: reply,
        scores,
    }))
}

async fn score_conversation(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let lesson = state
        .store
        .fetch_lesson(&req.lesson_id)
        .await?
        .ok_or(ApiError::LessonNotFound)?;

    let rubrics = state.store.rubrics_for_lesson(&req.lesson_id).await?;

    let transcript = render_transcript(&req.chat_history);
    // Rendered for the logs only; the outbound prompt carries the evaluation
    // prompt and the transcript, nothing else.
    let rubric_text = render_rubric_list(&rubrics);
    debug!(criteria = %rubric_text, "evaluating conversation");

    let prompt = format!(
        "{}\n\nConversation:\n{}\n\n",
        lesson.evaluation_prompt.trim(),
        transcript
    );

    let reply = state
        .llm
        .complete(CompletionRequest {
            model: EVAL_MODEL.to_owned(),
            messages: vec![Message::user(prompt)],
            temperature: EVAL_TEMPERATURE,
        })
        .await?;

    let scores = parse_score_reply(&reply, &rubrics);

    state
        .store
        .insert_chat_log(NewChatLog {
            lesson_id: req.lesson_id.clone(),
            chat_history: req.chat_history.clone(),
            scores: scores.clone(),
            timestamp: Utc::now(),
            system_prompt: lesson.system_prompt,
            evaluation_prompt: lesson.evaluation_prompt,
        })
        .await?;

    let suggestions = scores.suggestions.clone();
    let strength = scores.strength.clone();

    Ok(Json(ScoreResponse {
        scores,
        rubric: rubrics,
        suggestions,
        strength,
    }))
}

// --- prompt assembly ---

/// Expands the system prompt, prior turns, and the new input into the ordered
/// message sequence sent to the completion API: one system message, one
/// user/assistant pair per turn, then the new input as the final user message.
fn build_chat_messages(system_prompt: &str, history: &[ChatTurn], user_input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(Message::system(system_prompt));
    for turn in history {
        messages.push(Message::user(&turn.user));
        messages.push(Message::assistant(&turn.assistant));
    }
    messages.push(Message::user(user_input));
    messages
}

/// Flattens turns into alternating "User:" / "Assistant:" lines.
fn render_transcript(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|t| format!("User: {}\nAssistant: {}", t.user, t.assistant))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_rubric_list(rubrics: &[Rubric]) -> String {
    rubrics
        .iter()
        .map(|r| format!("- {} (1 to {})", r.criterion, r.max_score))
        .collect::<Vec<_>>()
        .join("\n")
}

fn placeholder_scores(rubrics: &[Rubric]) -> BTreeMap<String, i32> {
    rubrics
        .iter()
        .map(|r| (r.criterion.clone(), r.max_score))
        .collect()
}

/// Parses the evaluator's reply. Any malformed reply degrades to the
/// per-criterion fallback so the request still succeeds.
fn parse_score_reply(reply: &str, rubrics: &[Rubric]) -> ScoreBreakdown {
    match serde_json::from_str::<ScoreBreakdown>(reply.trim()) {
        Ok(scores) => scores,
        Err(e) => {
            warn!(error = %e, "unparsable evaluator reply, using fallback scores");
            ScoreBreakdown::fallback(rubrics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CriterionScore;

    fn rubric(criterion: &str, max_score: i32) -> Rubric {
        Rubric {
            lesson_id: "negotiation-101".into(),
            criterion: criterion.into(),
            max_score,
        }
    }

    #[test]
    fn chat_messages_flatten_history_in_order() {
        let history = vec![ChatTurn {
            user: "hi".into(),
            assistant: "hello".into(),
        }];
        let messages = build_chat_messages("You are a tutor.", &history, "what next?");

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[0].content, "You are a tutor.");
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].content, "hello");
        assert_eq!(messages[3].content, "what next?");
    }

    #[test]
    fn chat_messages_without_history_are_system_plus_input() {
        let messages = build_chat_messages("You are a tutor.", &[], "hello?");
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user"]);
    }

    #[test]
    fn transcript_renders_alternating_lines() {
        let history = vec![
            ChatTurn {
                user: "a".into(),
                assistant: "b".into(),
            },
            ChatTurn {
                user: "c".into(),
                assistant: "d".into(),
            },
        ];
        assert_eq!(
            render_transcript(&history),
            "User: a\nAssistant: b\nUser: c\nAssistant: d"
        );
    }

    #[test]
    fn rubric_list_renders_score_ranges() {
        let rubrics = vec![rubric("clarity", 5), rubric("empathy", 3)];
        assert_eq!(
            render_rubric_list(&rubrics),
            "- clarity (1 to 5)\n- empathy (1 to 3)"
        );
    }

    #[test]
    fn placeholder_scores_are_rubric_ceilings() {
        let scores = placeholder_scores(&[rubric("clarity", 5)]);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get("clarity"), Some(&5));
    }

    #[test]
    fn well_formed_reply_parses_per_criterion() {
        let reply = r#"{
            "clarity": {"score": 4, "feedback": "mostly clear"},
            "suggestions": ["slow down"],
            "strength": "good pacing"
        }"#;
        let scores = parse_score_reply(reply, &[rubric("clarity", 5)]);

        assert_eq!(
            scores.criteria["clarity"],
            CriterionScore {
                score: Some(4),
                feedback: "mostly clear".into()
            }
        );
        assert_eq!(scores.suggestions, ["slow down"]);
        assert_eq!(scores.strength, "good pacing");
    }

    #[test]
    fn unparsable_reply_falls_back_to_empty_scores() {
        let rubrics = vec![rubric("clarity", 5), rubric("empathy", 3)];
        let scores = parse_score_reply("Sorry, here is prose instead of JSON.", &rubrics);

        assert_eq!(scores.criteria.len(), 2);
        assert_eq!(
            scores.criteria["clarity"],
            CriterionScore {
                score: None,
                feedback: String::new()
            }
        );
        assert!(scores.suggestions.is_empty());
        assert!(scores.strength.is_empty());
    }

    #[test]
    fn breakdown_serializes_criteria_at_top_level() {
        let scores = parse_score_reply(r#"{"clarity": {"score": 2, "feedback": "terse"}}"#, &[]);
        let value = serde_json::to_value(&scores).unwrap();

        assert_eq!(value["clarity"]["score"], 2);
        assert_eq!(value["clarity"]["feedback"], "terse");
        assert_eq!(value["suggestions"], serde_json::json!([]));
        assert_eq!(value["strength"], "");
    }
}
