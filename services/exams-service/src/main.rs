//! REST API for exams and the submissions students make against them.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use shared::config::Settings;
use shared::db::{self, SeaOrmStore};
use shared::transaction::TransactionRunner;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod dto;
mod exams;
mod model;
mod rules;
mod submissions;

#[derive(Clone)]
pub struct AppState {
    pub runner: TransactionRunner<SeaOrmStore>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, settings: &Settings) -> Self {
        let store = Arc::new(SeaOrmStore::new(db, settings.max_transactions));
        Self {
            runner: TransactionRunner::with_defaults(store, settings.transaction),
        }
    }

    /// Connection for reads that need no transaction.
    pub fn db(&self) -> &DatabaseConnection {
        self.runner.store().conn()
    }
}

/// Simple liveness endpoint for orchestration.
async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/exams", post(exams::create_exam).get(exams::list_exams))
        .route(
            "/exams/:id",
            get(exams::get_exam)
                .patch(exams::update_exam)
                .delete(exams::delete_exam),
        )
        .route("/exams/:id/submissions", get(submissions::list_by_exam))
        .route("/submissions", get(submissions::list_by_student))
        .route("/submissions/start", post(submissions::start_exam))
        .route("/submissions/:id", get(submissions::get_submission))
        .route(
            "/submissions/:id/questions/:order",
            get(submissions::question_by_order),
        )
        .route("/submissions/:id/time", put(submissions::update_time))
        .route("/submissions/:id/answers", post(submissions::submit_answer))
        .route("/submissions/:id/submit", post(submissions::submit_exam))
        .route("/submissions/:id/grade", post(submissions::grade_submission))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/* ---------------- Bootstrap: schema ---------------- */

async fn ensure_schema(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    let be = db.get_database_backend();

    db.execute(Statement::from_string(be, r#"
        CREATE TABLE IF NOT EXISTS exams (
          exam_id      SERIAL PRIMARY KEY,
          class_id     INTEGER NOT NULL,
          title        TEXT NOT NULL,
          description  TEXT,
          start_time   TIMESTAMPTZ NOT NULL,
          end_time     TIMESTAMPTZ NOT NULL,
          total_time   INTEGER NOT NULL CHECK (total_time > 0),
          status       TEXT NOT NULL DEFAULT 'draft' CHECK (status IN
                           ('draft','published','in_progress','completed','cancelled')),
          created_by   INTEGER NOT NULL,
          created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
          CHECK (end_time > start_time)
        )
    "#.to_string())).await?;

    db.execute(Statement::from_string(be, r#"
        CREATE TABLE IF NOT EXISTS question_exams (
          exam_id         INTEGER NOT NULL REFERENCES exams(exam_id) ON DELETE CASCADE,
          question_id     INTEGER NOT NULL,
          question_order  INTEGER NOT NULL,
          points          DOUBLE PRECISION NOT NULL CHECK (points > 0),
          PRIMARY KEY (exam_id, question_id),
          UNIQUE (exam_id, question_order)
        )
    "#.to_string())).await?;

    db.execute(Statement::from_string(be, r#"
        CREATE TABLE IF NOT EXISTS submissions (
          submission_id           SERIAL PRIMARY KEY,
          exam_id                 INTEGER NOT NULL REFERENCES exams(exam_id) ON DELETE CASCADE,
          student_id              INTEGER NOT NULL,
          status                  TEXT NOT NULL DEFAULT 'in_progress' CHECK (status IN
                                      ('in_progress','submitted','graded')),
          current_question_order  INTEGER NOT NULL DEFAULT 1,
          remaining_time          INTEGER NOT NULL,
          score                   DOUBLE PRECISION,
          teacher_feedback        TEXT,
          graded_by               INTEGER,
          graded_at               TIMESTAMPTZ,
          submitted_at            TIMESTAMPTZ,
          started_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
          UNIQUE (exam_id, student_id)
        )
    "#.to_string())).await?;

    db.execute(Statement::from_string(be, r#"
        CREATE TABLE IF NOT EXISTS submission_answers (
          answer_id       SERIAL PRIMARY KEY,
          submission_id   INTEGER NOT NULL REFERENCES submissions(submission_id) ON DELETE CASCADE,
          question_id     INTEGER NOT NULL,
          answer_content  TEXT NOT NULL,
          UNIQUE (submission_id, question_id)
        )
    "#.to_string())).await?;

    Ok(())
}

/* ---------------- main ---------------- */

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::new()?;
    let db = db::connect(&settings).await?;
    ensure_schema(&db).await?;

    let app = router(AppState::new(db, &settings));

    let addr = settings.bind_addr_or("0.0.0.0:8091");
    info!(%addr, "starting exams-service");
    axum::Server::bind(&addr.parse::<std::net::SocketAddr>()?)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value as DbValue};
    use serde_json::{json, Value};
    use shared::config::Settings;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    use crate::model::{AnswerModel, ExamModel, QuestionExamModel, SubmissionModel};

    fn state(db: MockDatabase) -> AppState {
        AppState::new(db.into_connection(), &Settings::default())
    }

    async fn send(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Statements the mock connection saw, BEGIN/COMMIT/ROLLBACK included.
    fn statement_log(state: &AppState) -> String {
        let conn = match state.db() {
            DatabaseConnection::MockDatabaseConnection(mock) => {
                DatabaseConnection::MockDatabaseConnection(mock.clone())
            }
            _ => panic!("not a mock connection"),
        };
        let log = conn.into_transaction_log();
        format!("{log:?}")
    }

    fn count(n: i64) -> Vec<BTreeMap<&'static str, DbValue>> {
        vec![BTreeMap::from([("num_items", DbValue::from(n))])]
    }

    fn exam() -> ExamModel {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        ExamModel {
            exam_id: 1,
            class_id: 3,
            title: "Algebra".into(),
            description: None,
            start_time: at,
            end_time: at + chrono::Duration::hours(2),
            total_time: 90,
            status: "published".into(),
            created_by: 7,
            created_at: at,
        }
    }

    fn links() -> Vec<QuestionExamModel> {
        vec![
            QuestionExamModel { exam_id: 1, question_id: 11, order: 1, points: 2.0 },
            QuestionExamModel { exam_id: 1, question_id: 12, order: 2, points: 3.0 },
        ]
    }

    fn submission(status: &str) -> SubmissionModel {
        SubmissionModel {
            submission_id: 4,
            exam_id: 1,
            student_id: 9,
            status: status.into(),
            current_question_order: 1,
            remaining_time: 5400,
            score: None,
            teacher_feedback: None,
            graded_by: None,
            graded_at: None,
            submitted_at: None,
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        }
    }

    fn exam_body() -> Value {
        json!({
            "class_id": 3,
            "title": "Algebra",
            "start_time": "2024-05-01T08:00:00Z",
            "end_time": "2024-05-01T10:00:00Z",
            "total_time": 90,
            "created_by": 7,
            "questions": [
                {"question_id": 11, "order": 1, "points": 2.0},
                {"question_id": 12, "order": 2, "points": 3.0}
            ]
        })
    }

    #[tokio::test]
    async fn health_ok() {
        let app = Router::new().route("/health", get(health));
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(res.status().is_success());
    }

    #[tokio::test]
    async fn invalid_exam_is_rejected_before_touching_the_store() {
        let state = state(MockDatabase::new(DatabaseBackend::Postgres));
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/exams",
            json!({
                "class_id": 0,
                "title": "Al",
                "start_time": "2024-05-01T08:00:00Z",
                "end_time": "2024-05-01T10:00:00Z",
                "total_time": 60,
                "created_by": 1,
                "questions": []
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], json!(400));
        let messages = body["message"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(body["timestamp"].is_string());
        assert_eq!(statement_log(&state), "[]");
    }

    #[tokio::test]
    async fn exam_and_links_are_created_in_one_transaction() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([vec![links()[0].clone()]])
            .append_query_results([vec![links()[1].clone()]]);
        let state = state(db);
        let (status, body) = send(router(state.clone()), "POST", "/exams", exam_body()).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Exam created successfully"));
        assert_eq!(body["data"]["exam_id"], json!(1));
        assert_eq!(body["data"]["total_points"], json!(5.0));
        assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 2);
        assert!(body.get("error").is_none());

        let log = statement_log(&state);
        assert!(log.contains("BEGIN"));
        assert!(log.contains("question_exams"));
        assert!(log.contains("COMMIT"));
        assert!(!log.contains("ROLLBACK"));
    }

    #[tokio::test]
    async fn missing_exam_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<ExamModel>::new()]);
        let (status, body) = send(router(state(db)), "GET", "/exams/42", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Exam with ID 42 not found"));
        assert_eq!(body["error"], json!("NotFound"));
    }

    #[tokio::test]
    async fn exam_is_returned_inside_an_envelope() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([links()]);
        let (status, body) = send(router(state(db)), "GET", "/exams/1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Exam retrieved successfully"));
        assert_eq!(body["data"]["total_points"], json!(5.0));
        assert_eq!(body["data"]["questions"][1]["question_id"], json!(12));
    }

    #[tokio::test]
    async fn exams_are_listed_with_pagination() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([count(11)])
            .append_query_results([links()]);
        let (status, body) = send(
            router(state(db)),
            "GET",
            "/exams?page=2&limit=10&status=published",
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["data"][0]["total_points"], json!(5.0));
        assert_eq!(
            body["data"]["pagination"],
            json!({"total": 11, "page": 2, "limit": 10, "totalPages": 2})
        );
    }

    #[tokio::test]
    async fn bad_listing_filter_is_a_validation_error() {
        let (status, body) = send(
            router(state(MockDatabase::new(DatabaseBackend::Postgres))),
            "GET",
            "/exams?page=0",
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!(["page must be a positive number"]));
    }

    #[tokio::test]
    async fn update_replaces_links_atomically() {
        let mut renamed = exam();
        renamed.title = "Algebra final".into();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([vec![renamed]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            .append_query_results([vec![QuestionExamModel {
                exam_id: 1,
                question_id: 13,
                order: 1,
                points: 10.0,
            }]]);
        let state = state(db);
        let (status, body) = send(
            router(state.clone()),
            "PATCH",
            "/exams/1",
            json!({
                "title": "Algebra final",
                "questions": [{"question_id": 13, "order": 1, "points": 10.0}]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Exam updated successfully"));
        assert_eq!(body["data"]["title"], json!("Algebra final"));
        assert_eq!(body["data"]["total_points"], json!(10.0));

        let log = statement_log(&state);
        assert!(log.contains("DELETE FROM"));
        assert!(log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn update_cannot_end_before_start() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![exam()]]);
        let state = state(db);
        let (status, body) = send(
            router(state.clone()),
            "PATCH",
            "/exams/1",
            json!({"end_time": "2024-05-01T07:00:00Z"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!(["end_time must be after start_time"]));
        assert!(statement_log(&state).contains("ROLLBACK"));
    }

    #[tokio::test]
    async fn deleting_a_missing_exam_rolls_back() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }]);
        let state = state(db);
        let (status, body) = send(router(state.clone()), "DELETE", "/exams/5", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Exam with ID 5 not found"));
        assert!(statement_log(&state).contains("ROLLBACK"));
    }

    #[tokio::test]
    async fn deleting_an_exam_commits() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }]);
        let (status, body) = send(router(state(db)), "DELETE", "/exams/1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"exam_id": 1}));
    }

    #[tokio::test]
    async fn starting_creates_a_submission_on_the_first_question() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([links()])
            .append_query_results([Vec::<SubmissionModel>::new()])
            .append_query_results([vec![submission("in_progress")]]);
        let state = state(db);
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/submissions/start",
            json!({"exam_id": 1, "student_id": 9}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Exam started successfully"));
        assert_eq!(body["data"]["submission_id"], json!(4));
        assert_eq!(body["data"]["remaining_time"], json!(5400));
        assert_eq!(body["data"]["total_questions"], json!(2));
        assert_eq!(body["data"]["question"]["question_id"], json!(11));

        let log = statement_log(&state);
        assert!(log.contains("INSERT INTO"));
        assert!(log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn starting_again_resumes_where_the_student_was() {
        let mut open = submission("in_progress");
        open.current_question_order = 2;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([links()])
            .append_query_results([vec![open]]);
        let state = state(db);
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/submissions/start",
            json!({"exam_id": 1, "student_id": 9}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["current_question_order"], json!(2));
        assert_eq!(body["data"]["question"]["question_id"], json!(12));
        assert!(!statement_log(&state).contains("INSERT INTO"));
    }

    #[tokio::test]
    async fn starting_a_handed_in_exam_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![exam()]])
            .append_query_results([links()])
            .append_query_results([vec![submission("submitted")]]);
        let (status, body) = send(
            router(state(db)),
            "POST",
            "/submissions/start",
            json!({"exam_id": 1, "student_id": 9}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Exam has already been submitted"));
    }

    #[tokio::test]
    async fn moving_to_a_question_records_the_position() {
        let mut moved = submission("in_progress");
        moved.current_question_order = 2;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("in_progress")]])
            .append_query_results([links()])
            .append_query_results([vec![AnswerModel {
                answer_id: 8,
                submission_id: 4,
                question_id: 12,
                answer_content: "x = 2".into(),
            }]])
            .append_query_results([vec![moved]]);
        let state = state(db);
        let (status, body) =
            send(router(state.clone()), "GET", "/submissions/4/questions/2", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["current_question_order"], json!(2));
        assert_eq!(body["data"]["question"]["question_id"], json!(12));
        assert_eq!(body["data"]["answer"]["answer_content"], json!("x = 2"));
        assert!(statement_log(&state).contains("UPDATE"));
    }

    #[tokio::test]
    async fn unknown_question_order_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("in_progress")]])
            .append_query_results([links()]);
        let (status, body) =
            send(router(state(db)), "GET", "/submissions/4/questions/7", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Question with order 7 not found in this exam"));
    }

    #[tokio::test]
    async fn remaining_time_is_stored_while_open() {
        let mut ticked = submission("in_progress");
        ticked.remaining_time = 1200;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("in_progress")]])
            .append_query_results([vec![ticked]]);
        let (status, body) = send(
            router(state(db)),
            "PUT",
            "/submissions/4/time",
            json!({"remaining_time": 1200}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"submission_id": 4, "remaining_time": 1200}));
    }

    #[tokio::test]
    async fn remaining_time_is_frozen_after_hand_in() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("submitted")]]);
        let (status, body) = send(
            router(state(db)),
            "PUT",
            "/submissions/4/time",
            json!({"remaining_time": 10}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            json!("Cannot update time: submission is not in progress")
        );
    }

    #[tokio::test]
    async fn handing_in_marks_the_submission_submitted() {
        let mut handed_in = submission("submitted");
        handed_in.submitted_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("in_progress")]])
            .append_query_results([vec![handed_in]]);
        let state = state(db);
        let (status, body) =
            send(router(state.clone()), "POST", "/submissions/4/submit", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Exam submitted successfully"));
        assert_eq!(body["data"]["status"], json!("submitted"));
        assert!(body["data"]["submitted_at"].is_string());
        assert!(statement_log(&state).contains("COMMIT"));
    }

    #[tokio::test]
    async fn grading_within_the_exam_points_succeeds() {
        let mut graded = submission("graded");
        graded.score = Some(4.5);
        graded.graded_by = Some(2);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("submitted")]])
            .append_query_results([links()])
            .append_query_results([vec![graded]]);
        let (status, body) = send(
            router(state(db)),
            "POST",
            "/submissions/4/grade",
            json!({"score": 4.5, "graded_by": 2, "teacher_feedback": "good"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("Submission graded successfully"));
        assert_eq!(body["data"]["status"], json!("graded"));
        assert_eq!(body["data"]["score"], json!(4.5));
    }

    #[tokio::test]
    async fn grading_above_the_exam_points_rolls_back() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("submitted")]])
            .append_query_results([links()]);
        let state = state(db);
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/submissions/4/grade",
            json!({"score": 6, "graded_by": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!(["score must be between 0 and 5"]));
        let log = statement_log(&state);
        assert!(log.contains("ROLLBACK"));
        assert!(!log.contains("UPDATE"));
    }

    #[tokio::test]
    async fn grading_twice_is_a_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("graded")]]);
        let (status, body) = send(
            router(state(db)),
            "POST",
            "/submissions/4/grade",
            json!({"score": 8, "graded_by": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], json!("Submission has already been graded"));
    }

    #[tokio::test]
    async fn answering_a_handed_in_submission_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("submitted")]]);
        let (status, body) = send(
            router(state(db)),
            "POST",
            "/submissions/4/answers",
            json!({"question_id": 11, "answer_content": "x = 2"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            json!("Cannot submit answer: submission is not in progress")
        );
    }

    #[tokio::test]
    async fn submissions_are_listed_per_exam_and_per_student() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission("submitted")]])
            .append_query_results([count(1)])
            .append_query_results([vec![submission("submitted")]]);
        let app = router(state(db));

        let (status, body) = send(app.clone(), "GET", "/exams/1/submissions", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["data"][0]["submission_id"], json!(4));
        assert_eq!(body["data"]["pagination"]["total"], json!(1));

        let (status, body) =
            send(app.clone(), "GET", "/submissions?student_id=9&exam_id=1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["student_id"], json!(9));

        let (status, body) = send(app, "GET", "/submissions", Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!(["student_id should not be empty"]));
    }

    #[tokio::test]
    async fn non_numeric_ids_get_an_error_body() {
        let app = router(state(MockDatabase::new(DatabaseBackend::Postgres)));
        let (status, body) = send(app, "GET", "/submissions/abc", Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], json!(400));
    }
}
