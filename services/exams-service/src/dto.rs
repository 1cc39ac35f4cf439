//! Request and response bodies.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::pagination::Page;
use shared::validation::{self, Validate, ValidationErrors};
use strum_macros::{Display, EnumString};

use crate::model::{AnswerModel, ExamModel, QuestionExamModel, SubmissionModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExamStatus {
    #[default]
    Draft,
    Published,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
    Graded,
}

/* ---------------- exams ---------------- */

#[derive(Debug, Deserialize)]
pub struct QuestionInExamDto {
    pub question_id: i32,
    pub order: i32,
    pub points: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateExamDto {
    pub class_id: i32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes.
    pub total_time: i32,
    #[serde(default)]
    pub status: Option<ExamStatus>,
    pub created_by: i32,
    #[serde(default)]
    pub questions: Vec<QuestionInExamDto>,
}

impl Validate for CreateExamDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::positive(&mut errors, "class_id", self.class_id.into());
        validation::not_blank(&mut errors, "title", &self.title);
        validation::min_len(&mut errors, "title", self.title.trim(), 3);
        validation::positive(&mut errors, "total_time", self.total_time.into());
        validation::positive(&mut errors, "created_by", self.created_by.into());
        if self.end_time <= self.start_time {
            errors.push("end_time", "end_time must be after start_time");
        }
        check_questions(&mut errors, &self.questions);
        errors.into_result()
    }
}

/// Non-empty, positive ids and points, each order and question used once.
fn check_questions(errors: &mut ValidationErrors, questions: &[QuestionInExamDto]) {
    if questions.is_empty() {
        errors.push("questions", "questions should not be empty");
    }

    let mut orders = HashSet::new();
    let mut ids = HashSet::new();
    for (i, q) in questions.iter().enumerate() {
        validation::positive(errors, &format!("questions[{i}].question_id"), q.question_id.into());
        validation::positive(errors, &format!("questions[{i}].order"), q.order.into());
        if q.points <= 0.0 {
            errors.push(
                format!("questions[{i}].points"),
                format!("questions[{i}].points must be a positive number"),
            );
        }
        if !orders.insert(q.order) {
            errors.push("questions", format!("question order {} is used twice", q.order));
        }
        if !ids.insert(q.question_id) {
            errors.push("questions", format!("question {} is listed twice", q.question_id));
        }
    }
}

/// Partial update. An explicit `questions` list replaces every link.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExamDto {
    #[serde(default)]
    pub class_id: Option<i32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_time: Option<i32>,
    #[serde(default)]
    pub status: Option<ExamStatus>,
    #[serde(default)]
    pub questions: Option<Vec<QuestionInExamDto>>,
}

impl UpdateExamDto {
    /// True when any column of the exam row itself changes.
    pub fn touches_exam(&self) -> bool {
        self.class_id.is_some()
            || self.title.is_some()
            || self.description.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.total_time.is_some()
            || self.status.is_some()
    }
}

impl Validate for UpdateExamDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if !self.touches_exam() && self.questions.is_none() {
            errors.push("body", "at least one field must be provided");
        }
        if let Some(class_id) = self.class_id {
            validation::positive(&mut errors, "class_id", class_id.into());
        }
        if let Some(title) = &self.title {
            validation::not_blank(&mut errors, "title", title);
            validation::min_len(&mut errors, "title", title.trim(), 3);
        }
        if let Some(total_time) = self.total_time {
            validation::positive(&mut errors, "total_time", total_time.into());
        }
        if let Some(questions) = &self.questions {
            check_questions(&mut errors, questions);
        }
        errors.into_result()
    }
}

/// Raw `GET /exams` query.
#[derive(Debug, Default, Deserialize)]
pub struct ExamFilterQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub class_id: Option<String>,
    pub status: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ExamFilter {
    pub search: Option<String>,
    pub class_id: Option<i32>,
    pub status: Option<ExamStatus>,
    pub created_by: Option<i32>,
}

impl ExamFilterQuery {
    pub fn resolve(&self) -> Result<(Page, ExamFilter), AppError> {
        let page = Page::from_query(self.page.as_deref(), self.limit.as_deref())?;
        let mut errors = ValidationErrors::default();
        let class_id = validation::optional_positive(&mut errors, "class_id", self.class_id.as_deref());
        let created_by =
            validation::optional_positive(&mut errors, "created_by", self.created_by.as_deref());
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => match raw.parse::<ExamStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    validation::one_of(&mut errors, "status", raw, EXAM_STATUSES);
                    None
                }
            },
            None => None,
        };
        errors.into_result()?;
        Ok((
            page,
            ExamFilter {
                search: self
                    .search
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                class_id: class_id.map(|v| v as i32),
                status,
                created_by: created_by.map(|v| v as i32),
            },
        ))
    }
}

const EXAM_STATUSES: &[&str] = &["draft", "published", "in_progress", "completed", "cancelled"];

#[derive(Debug, Serialize)]
pub struct ExamQuestionData {
    pub question_id: i32,
    pub order: i32,
    pub points: f64,
}

impl From<QuestionExamModel> for ExamQuestionData {
    fn from(m: QuestionExamModel) -> Self {
        Self {
            question_id: m.question_id,
            order: m.order,
            points: m.points,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExamData {
    pub exam_id: i32,
    pub class_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_time: i32,
    pub status: String,
    pub created_by: i32,
    pub total_points: f64,
    pub questions: Vec<ExamQuestionData>,
}

impl ExamData {
    pub fn new(exam: ExamModel, mut links: Vec<QuestionExamModel>) -> Self {
        links.sort_by_key(|l| l.order);
        Self {
            total_points: links.iter().map(|l| l.points).sum(),
            exam_id: exam.exam_id,
            class_id: exam.class_id,
            title: exam.title,
            description: exam.description,
            start_time: exam.start_time,
            end_time: exam.end_time,
            total_time: exam.total_time,
            status: exam.status,
            created_by: exam.created_by,
            questions: links.into_iter().map(Into::into).collect(),
        }
    }
}

/* ---------------- submissions ---------------- */

#[derive(Debug, Deserialize)]
pub struct StartExamDto {
    pub exam_id: i32,
    pub student_id: i32,
}

impl Validate for StartExamDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::positive(&mut errors, "exam_id", self.exam_id.into());
        validation::positive(&mut errors, "student_id", self.student_id.into());
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerDto {
    pub question_id: i32,
    pub answer_content: String,
}

impl Validate for SubmitAnswerDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::positive(&mut errors, "question_id", self.question_id.into());
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeSubmissionDto {
    pub score: f64,
    #[serde(default)]
    pub teacher_feedback: Option<String>,
    pub graded_by: i32,
}

impl Validate for GradeSubmissionDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if !self.score.is_finite() || self.score < 0.0 {
            errors.push("score", "score must not be negative");
        }
        validation::positive(&mut errors, "graded_by", self.graded_by.into());
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTimeDto {
    /// Seconds.
    pub remaining_time: i32,
}

impl Validate for UpdateTimeDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.remaining_time < 0 {
            errors.push("remaining_time", "remaining_time must not be negative");
        }
        errors.into_result()
    }
}

/// Raw `GET /submissions` query; `student_id` is required.
#[derive(Debug, Default, Deserialize)]
pub struct StudentSubmissionsQuery {
    pub student_id: Option<String>,
    pub exam_id: Option<String>,
}

impl StudentSubmissionsQuery {
    pub fn resolve(&self) -> Result<(i32, Option<i32>), AppError> {
        let mut errors = ValidationErrors::default();
        let student_id =
            validation::optional_positive(&mut errors, "student_id", self.student_id.as_deref());
        let exam_id = validation::optional_positive(&mut errors, "exam_id", self.exam_id.as_deref());
        if student_id.is_none() && errors.is_empty() {
            errors.push("student_id", "student_id should not be empty");
        }
        errors.into_result()?;
        Ok((student_id.unwrap_or_default() as i32, exam_id.map(|v| v as i32)))
    }
}

/// Raw `GET /exams/:id/submissions` query.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CurrentQuestion {
    pub question_id: i32,
    pub order: i32,
    pub points: f64,
}

#[derive(Debug, Serialize)]
pub struct StartedExam {
    pub submission_id: i32,
    pub exam_id: i32,
    pub exam_title: String,
    pub student_id: i32,
    pub current_question_order: i32,
    pub remaining_time: i32,
    pub total_questions: usize,
    pub question: Option<CurrentQuestion>,
}

/// One question of a running submission, with the answer saved so far.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub submission_id: i32,
    pub current_question_order: i32,
    pub remaining_time: i32,
    pub total_questions: usize,
    pub question: CurrentQuestion,
    pub answer: Option<AnswerData>,
}

#[derive(Debug, Serialize)]
pub struct RemainingTime {
    pub submission_id: i32,
    pub remaining_time: i32,
}

#[derive(Debug, Serialize)]
pub struct DeletedExam {
    pub exam_id: i32,
}

#[derive(Debug, Serialize)]
pub struct AnswerData {
    pub answer_id: i32,
    pub question_id: i32,
    pub answer_content: String,
}

impl From<AnswerModel> for AnswerData {
    fn from(m: AnswerModel) -> Self {
        Self {
            answer_id: m.answer_id,
            question_id: m.question_id,
            answer_content: m.answer_content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionData {
    pub submission_id: i32,
    pub exam_id: i32,
    pub student_id: i32,
    pub status: String,
    pub current_question_order: i32,
    pub remaining_time: i32,
    pub score: Option<f64>,
    pub teacher_feedback: Option<String>,
    pub graded_by: Option<i32>,
    pub graded_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<AnswerData>,
}

impl SubmissionData {
    pub fn new(s: SubmissionModel, answers: Vec<AnswerModel>) -> Self {
        Self {
            submission_id: s.submission_id,
            exam_id: s.exam_id,
            student_id: s.student_id,
            status: s.status,
            current_question_order: s.current_question_order,
            remaining_time: s.remaining_time,
            score: s.score,
            teacher_feedback: s.teacher_feedback,
            graded_by: s.graded_by,
            graded_at: s.graded_at,
            submitted_at: s.submitted_at,
            started_at: s.started_at,
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<SubmissionModel> for SubmissionData {
    fn from(s: SubmissionModel) -> Self {
        Self::new(s, Vec::new())
    }
}
