use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use shared::error::AppError;
use shared::http::{created, db_err, ok, parse_id, Reply};
use shared::pagination::Paginated;
use shared::transaction::TransactionOptions;
use shared::validation::parse_json;
use tracing::info;

use crate::dto::{
    CreateExamDto, DeletedExam, ExamData, ExamFilter, ExamFilterQuery, QuestionInExamDto,
    UpdateExamDto,
};
use crate::model::{
    exam, question_exam, Exam, ExamActiveModel, QuestionExam, QuestionExamActiveModel,
    QuestionExamModel,
};
use crate::rules;
use crate::AppState;

fn exam_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Exam with ID {id} not found"))
}

/// Question links of an exam in display order.
pub(crate) async fn load_links<C: ConnectionTrait>(
    conn: &C,
    exam_id: i32,
) -> Result<Vec<QuestionExamModel>, AppError> {
    QuestionExam::find()
        .filter(question_exam::Column::ExamId.eq(exam_id))
        .order_by_asc(question_exam::Column::Order)
        .all(conn)
        .await
        .map_err(db_err)
}

async fn insert_links<C: ConnectionTrait>(
    conn: &C,
    exam_id: i32,
    questions: &[QuestionInExamDto],
) -> Result<Vec<QuestionExamModel>, AppError> {
    let mut links = Vec::with_capacity(questions.len());
    for q in questions {
        let link = QuestionExamActiveModel {
            exam_id: Set(exam_id),
            question_id: Set(q.question_id),
            order: Set(q.order),
            points: Set(q.points),
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
        links.push(link);
    }
    Ok(links)
}

/// Creates the exam and all of its question links atomically.
pub async fn create_exam(State(state): State<AppState>, body: Bytes) -> Reply<ExamData> {
    let dto: CreateExamDto = parse_json(&body)?;

    let exam = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let exam = ExamActiveModel {
                    class_id: Set(dto.class_id),
                    title: Set(dto.title.trim().to_string()),
                    description: Set(dto.description),
                    start_time: Set(dto.start_time),
                    end_time: Set(dto.end_time),
                    total_time: Set(dto.total_time),
                    status: Set(dto.status.unwrap_or_default().to_string()),
                    created_by: Set(dto.created_by),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(conn)
                .await
                .map_err(db_err)?;

                let links = insert_links(conn, exam.exam_id, &dto.questions).await?;
                Ok::<_, AppError>(ExamData::new(exam, links))
            })
        })
        .await?;

    info!(exam_id = exam.exam_id, questions = exam.questions.len(), "exam created");
    created(exam, "Exam created successfully")
}

pub async fn get_exam(State(state): State<AppState>, Path(raw): Path<String>) -> Reply<ExamData> {
    let id = parse_id(&raw)?;
    let db = state.db();
    let Some(exam) = Exam::find_by_id(id).one(db).await.map_err(db_err)? else {
        return Err(exam_not_found(id).into());
    };
    let links = load_links(db, id).await?;
    ok(ExamData::new(exam, links), "Exam retrieved successfully")
}

fn filtered(filter: &ExamFilter) -> sea_orm::Select<Exam> {
    let mut select = Exam::find();
    if let Some(class_id) = filter.class_id {
        select = select.filter(exam::Column::ClassId.eq(class_id));
    }
    if let Some(status) = filter.status {
        select = select.filter(exam::Column::Status.eq(status.to_string()));
    }
    if let Some(created_by) = filter.created_by {
        select = select.filter(exam::Column::CreatedBy.eq(created_by));
    }
    if let Some(search) = &filter.search {
        // case-insensitive match on title or description
        let pattern = format!("%{}%", search.to_lowercase());
        select = select.filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(exam::Column::Title))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(exam::Column::Description))).like(pattern)),
        );
    }
    select
}

/// Newest exams first, with their question links.
pub async fn list_exams(
    State(state): State<AppState>,
    Query(query): Query<ExamFilterQuery>,
) -> Reply<Paginated<ExamData>> {
    let (page, filter) = query.resolve()?;
    let db = state.db();
    let select = filtered(&filter);

    let exams = select
        .clone()
        .order_by_desc(exam::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_err)?;
    let total = select.count(db).await.map_err(db_err)?;

    let mut links: HashMap<i32, Vec<QuestionExamModel>> = HashMap::new();
    if !exams.is_empty() {
        let ids: Vec<i32> = exams.iter().map(|e| e.exam_id).collect();
        for link in QuestionExam::find()
            .filter(question_exam::Column::ExamId.is_in(ids))
            .all(db)
            .await
            .map_err(db_err)?
        {
            links.entry(link.exam_id).or_default().push(link);
        }
    }

    let data = exams
        .into_iter()
        .map(|e| {
            let own = links.remove(&e.exam_id).unwrap_or_default();
            ExamData::new(e, own)
        })
        .collect();
    ok(Paginated::new(data, page, total), "Exams retrieved successfully")
}

/// Applies a partial update; a `questions` list replaces the links in the
/// same transaction.
pub async fn update_exam(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Reply<ExamData> {
    let id = parse_id(&raw)?;
    let dto: UpdateExamDto = parse_json(&body)?;

    let exam = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = Exam::find_by_id(id)
                    .one(conn)
                    .await
                    .map_err(db_err)?
                    .ok_or_else(|| exam_not_found(id))?;
                rules::ensure_schedule(
                    dto.start_time.unwrap_or(found.start_time),
                    dto.end_time.unwrap_or(found.end_time),
                )?;

                let exam = if dto.touches_exam() {
                    let mut model: ExamActiveModel = found.into();
                    if let Some(class_id) = dto.class_id {
                        model.class_id = Set(class_id);
                    }
                    if let Some(title) = dto.title {
                        model.title = Set(title.trim().to_string());
                    }
                    if dto.description.is_some() {
                        model.description = Set(dto.description);
                    }
                    if let Some(start_time) = dto.start_time {
                        model.start_time = Set(start_time);
                    }
                    if let Some(end_time) = dto.end_time {
                        model.end_time = Set(end_time);
                    }
                    if let Some(total_time) = dto.total_time {
                        model.total_time = Set(total_time);
                    }
                    if let Some(status) = dto.status {
                        model.status = Set(status.to_string());
                    }
                    model.update(conn).await.map_err(db_err)?
                } else {
                    found
                };

                let links = match dto.questions {
                    Some(questions) => {
                        QuestionExam::delete_many()
                            .filter(question_exam::Column::ExamId.eq(id))
                            .exec(conn)
                            .await
                            .map_err(db_err)?;
                        insert_links(conn, id, &questions).await?
                    }
                    None => load_links(conn, id).await?,
                };
                Ok::<_, AppError>(ExamData::new(exam, links))
            })
        })
        .await?;

    info!(exam_id = id, "exam updated");
    ok(exam, "Exam updated successfully")
}

/// Links and submissions go with the exam (`ON DELETE CASCADE`).
pub async fn delete_exam(State(state): State<AppState>, Path(raw): Path<String>) -> Reply<DeletedExam> {
    let id = parse_id(&raw)?;

    state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let deleted = Exam::delete_by_id(id)
                    .exec(tx.conn())
                    .await
                    .map_err(db_err)?;
                if deleted.rows_affected == 0 {
                    return Err(exam_not_found(id));
                }
                Ok::<_, AppError>(())
            })
        })
        .await?;

    info!(exam_id = id, "exam deleted");
    ok(DeletedExam { exam_id: id }, "Exam deleted successfully")
}
