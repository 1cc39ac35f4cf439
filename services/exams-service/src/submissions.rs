//! Exam taking: start or resume, move between questions, answer, hand in
//! and grade.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use shared::error::AppError;
use shared::http::{db_err, ok, parse_id, Reply};
use shared::pagination::{Page, Paginated};
use shared::transaction::TransactionOptions;
use shared::validation::parse_json;
use tracing::info;

use crate::dto::{
    AnswerData, CurrentQuestion, GradeSubmissionDto, PageQuery, QuestionView, RemainingTime,
    StartExamDto, StartedExam, StudentSubmissionsQuery, SubmissionData, SubmissionStatus,
    SubmitAnswerDto, UpdateTimeDto,
};
use crate::exams::load_links;
use crate::model::{
    submission, submission_answer, AnswerActiveModel, Exam, Submission, SubmissionActiveModel,
    SubmissionAnswer, SubmissionModel,
};
use crate::rules;
use crate::AppState;

async fn find_submission<C: ConnectionTrait>(conn: &C, id: i32) -> Result<SubmissionModel, AppError> {
    Submission::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::NotFound(format!("Submission with ID {id} not found")))
}

/// Starts the exam for a student, or resumes the open submission.
pub async fn start_exam(State(state): State<AppState>, body: Bytes) -> Reply<StartedExam> {
    let dto: StartExamDto = parse_json(&body)?;
    let db = state.db();

    let Some(exam) = Exam::find_by_id(dto.exam_id).one(db).await.map_err(db_err)? else {
        return Err(AppError::NotFound(format!("Exam with ID {} not found", dto.exam_id)).into());
    };
    let links = load_links(db, exam.exam_id).await?;
    if links.is_empty() {
        return Err(AppError::BadRequest("Exam has no questions".into()).into());
    }

    let remaining = exam.total_time.saturating_mul(60);
    let (exam_id, student_id) = (exam.exam_id, dto.student_id);
    let submission = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let existing = Submission::find()
                    .filter(submission::Column::ExamId.eq(exam_id))
                    .filter(submission::Column::StudentId.eq(student_id))
                    .one(conn)
                    .await
                    .map_err(db_err)?;
                if let Some(found) = existing {
                    return Ok(found);
                }
                let fresh = SubmissionActiveModel {
                    exam_id: Set(exam_id),
                    student_id: Set(student_id),
                    status: Set(SubmissionStatus::InProgress.to_string()),
                    current_question_order: Set(1),
                    remaining_time: Set(remaining),
                    started_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(conn)
                .await
                .map_err(db_err)?;
                info!(submission_id = fresh.submission_id, exam_id, student_id, "submission started");
                Ok::<_, AppError>(fresh)
            })
        })
        .await?;

    rules::ensure_resumable(rules::parse_status(&submission.status)?)?;

    let question = rules::question_at(&links, submission.current_question_order).map(|l| {
        CurrentQuestion {
            question_id: l.question_id,
            order: l.order,
            points: l.points,
        }
    });
    ok(
        StartedExam {
            submission_id: submission.submission_id,
            exam_id: exam.exam_id,
            exam_title: exam.title,
            student_id: submission.student_id,
            current_question_order: submission.current_question_order,
            remaining_time: submission.remaining_time,
            total_questions: links.len(),
            question,
        },
        "Exam started successfully",
    )
}

/// Shows the question at `order` and records it as the student's position.
pub async fn question_by_order(
    State(state): State<AppState>,
    Path((raw_id, raw_order)): Path<(String, String)>,
) -> Reply<QuestionView> {
    let id = parse_id(&raw_id)?;
    let order = parse_id(&raw_order)?;

    let view = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_submission(conn, id).await?;
                let links = load_links(conn, found.exam_id).await?;
                let link = rules::question_at_order(&links, order)?;
                let question = CurrentQuestion {
                    question_id: link.question_id,
                    order: link.order,
                    points: link.points,
                };
                let answer = SubmissionAnswer::find()
                    .filter(submission_answer::Column::SubmissionId.eq(id))
                    .filter(submission_answer::Column::QuestionId.eq(question.question_id))
                    .one(conn)
                    .await
                    .map_err(db_err)?;

                // a closed submission can be reviewed but keeps its position
                let open = rules::parse_status(&found.status)? == SubmissionStatus::InProgress;
                let position = if open && found.current_question_order != order {
                    let mut model: SubmissionActiveModel = found.into();
                    model.current_question_order = Set(order);
                    model.update(conn).await.map_err(db_err)?
                } else {
                    found
                };

                Ok::<_, AppError>(QuestionView {
                    submission_id: position.submission_id,
                    current_question_order: position.current_question_order,
                    remaining_time: position.remaining_time,
                    total_questions: links.len(),
                    question,
                    answer: answer.map(AnswerData::from),
                })
            })
        })
        .await?;

    ok(view, "Question retrieved successfully")
}

/// Stores the countdown reported by the client.
pub async fn update_time(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Reply<RemainingTime> {
    let id = parse_id(&raw)?;
    let dto: UpdateTimeDto = parse_json(&body)?;

    let updated = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_submission(conn, id).await?;
                rules::ensure_time_updatable(rules::parse_status(&found.status)?)?;

                let mut model: SubmissionActiveModel = found.into();
                model.remaining_time = Set(dto.remaining_time);
                let updated = model.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await?;

    ok(
        RemainingTime {
            submission_id: updated.submission_id,
            remaining_time: updated.remaining_time,
        },
        "Remaining time updated successfully",
    )
}

/// Saves or replaces the answer to one question.
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Reply<AnswerData> {
    let id = parse_id(&raw)?;
    let dto: SubmitAnswerDto = parse_json(&body)?;

    let (answer, replaced) = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_submission(conn, id).await?;
                rules::ensure_answerable(rules::parse_status(&found.status)?)?;

                let links = load_links(conn, found.exam_id).await?;
                if !rules::belongs_to_exam(&links, dto.question_id) {
                    return Err(AppError::BadRequest(
                        "Question does not belong to this exam".into(),
                    ));
                }

                let existing = SubmissionAnswer::find()
                    .filter(submission_answer::Column::SubmissionId.eq(id))
                    .filter(submission_answer::Column::QuestionId.eq(dto.question_id))
                    .one(conn)
                    .await
                    .map_err(db_err)?;
                let saved = match existing {
                    Some(previous) => {
                        let mut model: AnswerActiveModel = previous.into();
                        model.answer_content = Set(dto.answer_content);
                        (model.update(conn).await.map_err(db_err)?, true)
                    }
                    None => {
                        let model = AnswerActiveModel {
                            submission_id: Set(id),
                            question_id: Set(dto.question_id),
                            answer_content: Set(dto.answer_content),
                            ..Default::default()
                        };
                        (model.insert(conn).await.map_err(db_err)?, false)
                    }
                };
                Ok::<_, AppError>(saved)
            })
        })
        .await?;

    let message = if replaced {
        "Answer updated successfully"
    } else {
        "Answer submitted successfully"
    };
    ok(AnswerData::from(answer), message)
}

/// Hands the submission in.
pub async fn submit_exam(State(state): State<AppState>, Path(raw): Path<String>) -> Reply<SubmissionData> {
    let id = parse_id(&raw)?;

    let submitted = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_submission(conn, id).await?;
                rules::ensure_submittable(rules::parse_status(&found.status)?)?;

                let mut model: SubmissionActiveModel = found.into();
                model.status = Set(SubmissionStatus::Submitted.to_string());
                model.submitted_at = Set(Some(Utc::now()));
                let updated = model.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await?;

    info!(submission_id = id, "submission handed in");
    ok(SubmissionData::from(submitted), "Exam submitted successfully")
}

/// Records the teacher's score. Grading is one-shot.
pub async fn grade_submission(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Reply<SubmissionData> {
    let id = parse_id(&raw)?;
    let dto: GradeSubmissionDto = parse_json(&body)?;

    let graded = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_submission(conn, id).await?;
                rules::ensure_gradable(rules::parse_status(&found.status)?)?;
                let links = load_links(conn, found.exam_id).await?;
                rules::ensure_score_fits(dto.score, rules::max_points(&links))?;

                let mut model: SubmissionActiveModel = found.into();
                model.score = Set(Some(dto.score));
                model.teacher_feedback = Set(dto.teacher_feedback);
                model.graded_by = Set(Some(dto.graded_by));
                model.graded_at = Set(Some(Utc::now()));
                model.status = Set(SubmissionStatus::Graded.to_string());
                let updated = model.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await?;

    info!(submission_id = id, score = ?graded.score, "submission graded");
    ok(SubmissionData::from(graded), "Submission graded successfully")
}

pub async fn get_submission(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Reply<SubmissionData> {
    let id = parse_id(&raw)?;
    let db = state.db();
    let found = find_submission(db, id).await?;
    let answers = SubmissionAnswer::find()
        .filter(submission_answer::Column::SubmissionId.eq(id))
        .all(db)
        .await
        .map_err(db_err)?;
    ok(SubmissionData::new(found, answers), "Submission retrieved successfully")
}

/// Submissions made against one exam, oldest first.
pub async fn list_by_exam(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<PageQuery>,
) -> Reply<Paginated<SubmissionData>> {
    let exam_id = parse_id(&raw)?;
    let page = Page::from_query(query.page.as_deref(), query.limit.as_deref())?;
    let db = state.db();

    let select = Submission::find().filter(submission::Column::ExamId.eq(exam_id));
    let found = select
        .clone()
        .order_by_asc(submission::Column::SubmissionId)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_err)?;
    let total = select.count(db).await.map_err(db_err)?;

    let data = found.into_iter().map(SubmissionData::from).collect();
    ok(Paginated::new(data, page, total), "Submissions retrieved successfully")
}

/// `GET /submissions?student_id=..[&exam_id=..]`
pub async fn list_by_student(
    State(state): State<AppState>,
    Query(query): Query<StudentSubmissionsQuery>,
) -> Reply<Vec<SubmissionData>> {
    let (student_id, exam_id) = query.resolve()?;

    let mut select = Submission::find().filter(submission::Column::StudentId.eq(student_id));
    if let Some(exam_id) = exam_id {
        select = select.filter(submission::Column::ExamId.eq(exam_id));
    }
    let found = select
        .order_by_desc(submission::Column::StartedAt)
        .all(state.db())
        .await
        .map_err(db_err)?;

    ok(
        found.into_iter().map(SubmissionData::from).collect(),
        "Submissions retrieved successfully",
    )
}
