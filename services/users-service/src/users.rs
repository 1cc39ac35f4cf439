//! Accounts: registration, lookup, listing, profile, password change and
//! blocking.

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
    ChangePasswordDto, CreateUserDto, StatusChange, UpdateProfileDto, UserData, UserFilter,
    UserSearchQuery, UserStatus,
};
use crate::model::{user, User, UserActiveModel, UserModel};
use crate::password;
use crate::AppState;

fn user_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("User with ID {id} not found"))
}

async fn find_user<C: ConnectionTrait>(conn: &C, id: i32) -> Result<UserModel, AppError> {
    User::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| user_not_found(id))
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) async fn find_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<UserModel>, AppError> {
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(conn)
        .await
        .map_err(db_err)
}

pub async fn create_user(State(state): State<AppState>, body: Bytes) -> Reply<UserData> {
    let dto: CreateUserDto = parse_json(&body)?;
    let email = normalize_email(&dto.email);
    let hash = password::hash_password(&dto.password)?;
    let (role, status) = (dto.role(), dto.status());
    let full_name = dto.full_name.trim().to_string();

    let user = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                if find_by_email(conn, &email).await?.is_some() {
                    return Err(AppError::Conflict(format!(
                        "Email {email} is already registered"
                    )));
                }
                let created = UserActiveModel {
                    full_name: Set(full_name),
                    email: Set(email),
                    password: Set(hash),
                    role: Set(role.to_string()),
                    status: Set(status.to_string()),
                    created_at: Set(Utc::now()),
                    updated_at: Set(None),
                    ..Default::default()
                }
                .insert(conn)
                .await
                .map_err(db_err)?;
                Ok::<_, AppError>(created)
            })
        })
        .await?;

    info!(user_id = user.user_id, role = %user.role, "user created");
    created(UserData::from(user), "User created successfully")
}

pub async fn get_user(State(state): State<AppState>, Path(raw): Path<String>) -> Reply<UserData> {
    let id = parse_id(&raw)?;
    let found = find_user(state.db(), id).await?;
    ok(UserData::from(found), "User retrieved successfully")
}

fn filtered(filter: &UserFilter) -> sea_orm::Select<User> {
    let mut select = User::find();
    if let Some(role) = filter.role {
        select = select.filter(user::Column::Role.eq(role.to_string()));
    }
    if let Some(status) = filter.status {
        select = select.filter(user::Column::Status.eq(status.to_string()));
    }
    if let Some(text) = &filter.text {
        let pattern = format!("%{text}%");
        select = select.filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(user::Column::FullName))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(user::Column::Email))).like(pattern)),
        );
    }
    select
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Reply<Paginated<UserData>> {
    let (page, filter) = query.resolve()?;
    let db = state.db();
    let select = filtered(&filter);

    let users = select
        .clone()
        .order_by_asc(user::Column::UserId)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_err)?;
    let total = select.count(db).await.map_err(db_err)?;

    let data = users.into_iter().map(UserData::from).collect();
    ok(Paginated::new(data, page, total), "Users retrieved successfully")
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Reply<UserData> {
    let id = parse_id(&raw)?;
    let dto: UpdateProfileDto = parse_json(&body)?;
    let full_name = dto.full_name.trim().to_string();

    let updated = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let mut account: UserActiveModel = find_user(conn, id).await?.into();
                account.full_name = Set(full_name);
                account.updated_at = Set(Some(Utc::now()));
                let updated = account.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await?;

    ok(UserData::from(updated), "Profile updated successfully")
}

/// Replaces the password after checking the current one.
pub async fn change_password(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> Reply<UserData> {
    let id = parse_id(&raw)?;
    let dto: ChangePasswordDto = parse_json(&body)?;
    let hash = password::hash_password(&dto.new_password)?;
    let current = dto.current_password;

    let updated = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_user(conn, id).await?;
                if !password::verify_password(&current, &found.password) {
                    return Err(AppError::Unauthorized("Current password is incorrect".into()));
                }
                let mut account: UserActiveModel = found.into();
                account.password = Set(hash);
                account.updated_at = Set(Some(Utc::now()));
                let updated = account.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await?;

    info!(user_id = id, "password changed");
    ok(UserData::from(updated), "Password changed successfully")
}

async fn set_status(state: &AppState, id: i32, status: UserStatus) -> Result<UserModel, AppError> {
    state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let found = find_user(conn, id).await?;
                if found.status == status.to_string() {
                    return Ok(found);
                }
                let mut account: UserActiveModel = found.into();
                account.status = Set(status.to_string());
                account.updated_at = Set(Some(Utc::now()));
                let updated = account.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await
}

pub async fn block_user(State(state): State<AppState>, Path(raw): Path<String>) -> Reply<StatusChange> {
    let id = parse_id(&raw)?;
    set_status(&state, id, UserStatus::Blocked).await?;
    info!(user_id = id, "user blocked");
    ok(
        StatusChange {
            user_id: id,
            status: UserStatus::Blocked,
        },
        "User blocked successfully",
    )
}

pub async fn unblock_user(State(state): State<AppState>, Path(raw): Path<String>) -> Reply<StatusChange> {
    let id = parse_id(&raw)?;
    set_status(&state, id, UserStatus::Active).await?;
    info!(user_id = id, "user unblocked");
    ok(
        StatusChange {
            user_id: id,
            status: UserStatus::Active,
        },
        "User unblocked successfully",
    )
}
