//! Submission lifecycle rules, kept free of storage so they can be checked
//! in isolation.

use chrono::{DateTime, Utc};
use shared::error::AppError;
use shared::validation::ValidationErrors;

use crate::dto::SubmissionStatus;
use crate::model::QuestionExamModel;

pub fn parse_status(raw: &str) -> Result<SubmissionStatus, AppError> {
    raw.parse()
        .map_err(|_| AppError::Internal(format!("unknown submission status {raw:?}")))
}

/// Starting again is allowed only while the submission is open.
pub fn ensure_resumable(status: SubmissionStatus) -> Result<(), AppError> {
    match status {
        SubmissionStatus::InProgress => Ok(()),
        SubmissionStatus::Submitted | SubmissionStatus::Graded => Err(AppError::BadRequest(
            "Exam has already been submitted".into(),
        )),
    }
}

pub fn ensure_answerable(status: SubmissionStatus) -> Result<(), AppError> {
    if status == SubmissionStatus::InProgress {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Cannot submit answer: submission is not in progress".into(),
        ))
    }
}

pub fn ensure_time_updatable(status: SubmissionStatus) -> Result<(), AppError> {
    if status == SubmissionStatus::InProgress {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Cannot update time: submission is not in progress".into(),
        ))
    }
}

pub fn ensure_submittable(status: SubmissionStatus) -> Result<(), AppError> {
    ensure_resumable(status)
}

/// Only handed-in submissions can be graded, and only once.
pub fn ensure_gradable(status: SubmissionStatus) -> Result<(), AppError> {
    match status {
        SubmissionStatus::Submitted => Ok(()),
        SubmissionStatus::Graded => {
            Err(AppError::Conflict("Submission has already been graded".into()))
        }
        SubmissionStatus::InProgress => Err(AppError::BadRequest(
            "Only submitted submissions can be graded".into(),
        )),
    }
}

pub fn ensure_score_fits(score: f64, max_points: f64) -> Result<(), AppError> {
    if (0.0..=max_points).contains(&score) {
        return Ok(());
    }
    let mut errors = ValidationErrors::default();
    errors.push("score", format!("score must be between 0 and {max_points}"));
    Err(errors.into())
}

/// The schedule after an update must still end after it starts.
pub fn ensure_schedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end > start {
        return Ok(());
    }
    let mut errors = ValidationErrors::default();
    errors.push("end_time", "end_time must be after start_time");
    Err(errors.into())
}

pub fn max_points(links: &[QuestionExamModel]) -> f64 {
    links.iter().map(|l| l.points).sum()
}

/// Question shown for `order`, falling back to the first one.
pub fn question_at(links: &[QuestionExamModel], order: i32) -> Option<&QuestionExamModel> {
    links
        .iter()
        .find(|l| l.order == order)
        .or_else(|| links.iter().min_by_key(|l| l.order))
}

pub fn question_at_order(links: &[QuestionExamModel], order: i32) -> Result<&QuestionExamModel, AppError> {
    links
        .iter()
        .find(|l| l.order == order)
        .ok_or_else(|| AppError::NotFound(format!("Question with order {order} not found in this exam")))
}

pub fn belongs_to_exam(links: &[QuestionExamModel], question_id: i32) -> bool {
    links.iter().any(|l| l.question_id == question_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(question_id: i32, order: i32, points: f64) -> QuestionExamModel {
        QuestionExamModel {
            exam_id: 1,
            question_id,
            order,
            points,
        }
    }

    #[test]
    fn graded_submission_cannot_be_graded_again() {
        let err = ensure_gradable(SubmissionStatus::Graded).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), "Submission has already been graded");
    }

    #[test]
    fn open_submission_cannot_be_graded() {
        let err = ensure_gradable(SubmissionStatus::InProgress).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn score_must_fit_exam_points() {
        assert!(ensure_gradable(SubmissionStatus::Submitted).is_ok());
        assert!(ensure_score_fits(10.0, 10.0).is_ok());
        assert!(ensure_score_fits(0.0, 10.0).is_ok());
        let err = ensure_score_fits(10.5, 10.0).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.message().joined(), "score must be between 0 and 10");
    }

    #[test]
    fn lifecycle_guards() {
        assert!(ensure_resumable(SubmissionStatus::InProgress).is_ok());
        assert!(ensure_resumable(SubmissionStatus::Graded).is_err());
        assert!(ensure_answerable(SubmissionStatus::Submitted).is_err());
        assert!(ensure_submittable(SubmissionStatus::Submitted).is_err());
        assert!(ensure_submittable(SubmissionStatus::InProgress).is_ok());
    }

    #[test]
    fn question_lookup() {
        let links = vec![link(20, 2, 3.0), link(10, 1, 2.0)];
        assert_eq!(max_points(&links), 5.0);
        assert_eq!(question_at(&links, 2).map(|l| l.question_id), Some(20));
        assert_eq!(question_at(&links, 9).map(|l| l.question_id), Some(10));
        assert!(belongs_to_exam(&links, 10));
        assert!(!belongs_to_exam(&links, 30));
        assert!(question_at(&[], 1).is_none());
    }

    #[test]
    fn time_only_moves_while_open() {
        assert!(ensure_time_updatable(SubmissionStatus::InProgress).is_ok());
        let err = ensure_time_updatable(SubmissionStatus::Submitted).unwrap_err();
        assert_eq!(err.to_string(), "Cannot update time: submission is not in progress");
    }

    #[test]
    fn schedule_must_move_forward() {
        let start = Utc::now();
        assert!(ensure_schedule(start, start + Duration::hours(1)).is_ok());
        assert_eq!(ensure_schedule(start, start).unwrap_err().status_code(), 400);
    }

    #[test]
    fn exact_order_lookup_has_no_fallback() {
        let links = vec![link(20, 2, 3.0), link(10, 1, 2.0)];
        assert_eq!(question_at_order(&links, 2).unwrap().question_id, 20);
        let err = question_at_order(&links, 5).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Question with order 5 not found in this exam");
    }

    #[test]
    fn unknown_status_is_internal() {
        assert_eq!(parse_status("paused").unwrap_err().status_code(), 500);
    }
}
