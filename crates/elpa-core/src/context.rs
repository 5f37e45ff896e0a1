//! Per-execution mutable state threaded through every node runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::student::StudentProfile;

/// Role of a conversation turn, matching the roles an AI chat collaborator
/// would recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the execution's append-only conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Mutable per-run state: student reference, scratch variables,
/// conversation history, accumulated content, the student's adaptive
/// proficiency level, and a log of adaptations applied so far.
///
/// Owned exclusively by the scheduler for the duration of a run; surfaced
/// read-only to observers/callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub student: StudentProfile,
    pub variables: Map<String, Value>,
    pub history: Vec<ConversationTurn>,
    pub accumulated_content: Vec<String>,
    /// 1..=5, initialised from the student's proficiency level.
    pub current_language_level: u8,
    pub adaptations: Vec<String>,
}

impl ExecutionContext {
    pub fn new(student: StudentProfile) -> Self {
        let current_language_level = student.proficiency_level.clamp(1, 5);
        Self {
            student,
            variables: Map::new(),
            history: Vec::new(),
            accumulated_content: Vec::new(),
            current_language_level,
            adaptations: Vec::new(),
        }
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn push_history(&mut self, role: Role, content: impl Into<String>, node_id: Option<String>) {
        self.history.push(ConversationTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            node_id,
        });
    }

    pub fn push_content(&mut self, fragment: impl Into<String>) {
        self.accumulated_content.push(fragment.into());
    }

    /// Adjust the current language level by `delta`, clamped to 1..=5.
    /// Runners propose adjustments; the scheduler is what calls this, so
    /// the range invariant lives in one place.
    pub fn adjust_language_level(&mut self, delta: i8) {
        let proposed = self.current_language_level as i16 + delta as i16;
        self.current_language_level = proposed.clamp(1, 5) as u8;
    }

    pub fn apply_adaptation(&mut self, name: impl Into<String>) {
        self.adaptations.push(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_language_level_matches_student() {
        let ctx = ExecutionContext::new(StudentProfile::new("s1", "5", 2));
        assert_eq!(ctx.current_language_level, 2);
        assert!(ctx.history.is_empty());
        assert!(ctx.adaptations.is_empty());
    }

    #[test]
    fn adjust_language_level_clamps_to_range() {
        let mut ctx = ExecutionContext::new(StudentProfile::new("s1", "5", 1));
        ctx.adjust_language_level(-3);
        assert_eq!(ctx.current_language_level, 1);
        ctx.adjust_language_level(10);
        assert_eq!(ctx.current_language_level, 5);
    }

    #[test]
    fn history_is_append_only_in_practice() {
        let mut ctx = ExecutionContext::new(StudentProfile::new("s1", "5", 3));
        ctx.push_history(Role::System, "hello", None);
        ctx.push_history(Role::User, "hi", Some("n1".to_string()));
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.history[1].node_id.as_deref(), Some("n1"));
    }

    #[test]
    fn variables_can_be_overwritten() {
        let mut ctx = ExecutionContext::new(StudentProfile::new("s1", "5", 3));
        ctx.set_variable("score", Value::from(1));
        ctx.set_variable("score", Value::from(2));
        assert_eq!(ctx.get_variable("score"), Some(&Value::from(2)));
    }
}
