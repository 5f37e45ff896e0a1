//! The persistence façade the engine treats as an external collaborator:
//! typed tables for workflows, students, learning sessions, progress
//! records, assessment results, and teacher alerts, each with CRUD-style
//! methods. `elpa-server` ships one in-memory implementation, sufficient
//! for tests and local runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use elpa_core::{StudentProfile, Workflow, WorkflowExecutionRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: String,
    pub student_id: String,
    pub workflow_id: String,
    pub questions_answered: u64,
    pub correct_answers: u64,
    pub time_spent_secs: u64,
    pub recorded_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn new(student_id: impl Into<String>, workflow_id: impl Into<String>, questions_answered: u64, correct_answers: u64, time_spent_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            workflow_id: workflow_id.into(),
            questions_answered,
            correct_answers,
            time_spent_secs,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub id: String,
    pub student_id: String,
    pub workflow_id: String,
    pub node_id: String,
    pub score: u64,
    pub passed: bool,
    pub recorded_at: DateTime<Utc>,
}

impl AssessmentResult {
    pub fn new(student_id: impl Into<String>, workflow_id: impl Into<String>, node_id: impl Into<String>, score: u64, passed: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            workflow_id: workflow_id.into(),
            node_id: node_id.into(),
            score,
            passed,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherAlert {
    pub id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TeacherAlert {
    pub fn new(teacher_id: impl Into<String>, student_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            teacher_id: teacher_id.into(),
            student_id: student_id.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// The six typed tables the engine's callers read and write. Every
/// method is CRUD-shaped; none of it is on the engine's hot path — the
/// scheduler itself never touches this trait.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn put_workflow(&self, workflow: Workflow) -> ApiResult<()>;
    async fn get_workflow(&self, id: &str) -> ApiResult<Workflow>;
    async fn list_workflows(&self) -> ApiResult<Vec<Workflow>>;

    async fn put_student(&self, student: StudentProfile) -> ApiResult<()>;
    async fn get_student(&self, id: &str) -> ApiResult<StudentProfile>;

    async fn put_learning_session(&self, record: WorkflowExecutionRecord) -> ApiResult<()>;
    async fn get_learning_session(&self, id: &str) -> ApiResult<WorkflowExecutionRecord>;
    async fn list_learning_sessions_for_student(&self, student_id: &str) -> ApiResult<Vec<WorkflowExecutionRecord>>;

    async fn put_progress_record(&self, record: ProgressRecord) -> ApiResult<()>;
    async fn list_progress_records_for_student(&self, student_id: &str) -> ApiResult<Vec<ProgressRecord>>;

    async fn put_assessment_result(&self, result: AssessmentResult) -> ApiResult<()>;
    async fn list_assessment_results_for_student(&self, student_id: &str) -> ApiResult<Vec<AssessmentResult>>;

    async fn put_teacher_alert(&self, alert: TeacherAlert) -> ApiResult<()>;
    async fn list_teacher_alerts(&self, teacher_id: &str) -> ApiResult<Vec<TeacherAlert>>;
}

/// In-memory implementation backed by `DashMap`, one per table — enough
/// for tests and local demo runs; not durable across restarts.
#[derive(Default)]
pub struct InMemoryPersistence {
    workflows: DashMap<String, Workflow>,
    students: DashMap<String, StudentProfile>,
    learning_sessions: DashMap<String, WorkflowExecutionRecord>,
    progress_records: DashMap<String, Vec<ProgressRecord>>,
    assessment_results: DashMap<String, Vec<AssessmentResult>>,
    teacher_alerts: DashMap<String, Vec<TeacherAlert>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn Persistence> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn put_workflow(&self, workflow: Workflow) -> ApiResult<()> {
        self.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn get_workflow(&self, id: &str) -> ApiResult<Workflow> {
        self.workflows.get(id).map(|w| w.clone()).ok_or_else(|| ApiError::NotFound(format!("workflow '{id}'")))
    }

    async fn list_workflows(&self) -> ApiResult<Vec<Workflow>> {
        Ok(self.workflows.iter().map(|e| e.value().clone()).collect())
    }

    async fn put_student(&self, student: StudentProfile) -> ApiResult<()> {
        self.students.insert(student.id.clone(), student);
        Ok(())
    }

    async fn get_student(&self, id: &str) -> ApiResult<StudentProfile> {
        self.students.get(id).map(|s| s.clone()).ok_or_else(|| ApiError::NotFound(format!("student '{id}'")))
    }

    async fn put_learning_session(&self, record: WorkflowExecutionRecord) -> ApiResult<()> {
        self.learning_sessions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_learning_session(&self, id: &str) -> ApiResult<WorkflowExecutionRecord> {
        self.learning_sessions.get(id).map(|r| r.clone()).ok_or_else(|| ApiError::NotFound(format!("learning session '{id}'")))
    }

    async fn list_learning_sessions_for_student(&self, student_id: &str) -> ApiResult<Vec<WorkflowExecutionRecord>> {
        Ok(self
            .learning_sessions
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.student_id == student_id)
            .collect())
    }

    async fn put_progress_record(&self, record: ProgressRecord) -> ApiResult<()> {
        self.progress_records.entry(record.student_id.clone()).or_default().push(record);
        Ok(())
    }

    async fn list_progress_records_for_student(&self, student_id: &str) -> ApiResult<Vec<ProgressRecord>> {
        Ok(self.progress_records.get(student_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn put_assessment_result(&self, result: AssessmentResult) -> ApiResult<()> {
        self.assessment_results.entry(result.student_id.clone()).or_default().push(result);
        Ok(())
    }

    async fn list_assessment_results_for_student(&self, student_id: &str) -> ApiResult<Vec<AssessmentResult>> {
        Ok(self.assessment_results.get(student_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn put_teacher_alert(&self, alert: TeacherAlert) -> ApiResult<()> {
        self.teacher_alerts.entry(alert.teacher_id.clone()).or_default().push(alert);
        Ok(())
    }

    async fn list_teacher_alerts(&self, teacher_id: &str) -> ApiResult<Vec<TeacherAlert>> {
        Ok(self.teacher_alerts.get(teacher_id).map(|v| v.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elpa_core::ExecutionContext;

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let store = InMemoryPersistence::new();
        let err = store.get_workflow("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn round_trips_a_workflow() {
        let store = InMemoryPersistence::new();
        let workflow = Workflow::new("wf1", "Reading practice");
        store.put_workflow(workflow.clone()).await.unwrap();
        let fetched = store.get_workflow("wf1").await.unwrap();
        assert_eq!(fetched.name, "Reading practice");
    }

    #[tokio::test]
    async fn progress_records_accumulate_per_student() {
        let store = InMemoryPersistence::new();
        store.put_progress_record(ProgressRecord::new("s1", "wf1", 10, 8, 120)).await.unwrap();
        store.put_progress_record(ProgressRecord::new("s1", "wf1", 5, 5, 60)).await.unwrap();
        let records = store.list_progress_records_for_student("s1").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn learning_sessions_filter_by_student() {
        let store = InMemoryPersistence::new();
        let ctx_a = ExecutionContext::new(StudentProfile::new("s1", "3", 2));
        let ctx_b = ExecutionContext::new(StudentProfile::new("s2", "3", 2));
        store.put_learning_session(WorkflowExecutionRecord::new("wf1", ctx_a)).await.unwrap();
        store.put_learning_session(WorkflowExecutionRecord::new("wf1", ctx_b)).await.unwrap();

        let sessions = store.list_learning_sessions_for_student("s1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].student_id, "s1");
    }
}
