//! Password recovery: request a code, check it, and reset with it.

use axum::body::Bytes;
use axum::extract::State;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use shared::email::Email;
use shared::error::AppError;
use shared::http::{db_err, ok, Reply};
use shared::transaction::TransactionOptions;
use shared::validation::parse_json;
use tracing::{error, info};

use crate::dto::{
    CodeCheck, ForgotPasswordDto, ResetPasswordDto, ResetRequested, UserData, VerifyCodeDto,
};
use crate::model::{password_reset, PasswordReset, ResetActiveModel, ResetModel, UserActiveModel};
use crate::password;
use crate::users::{find_by_email, normalize_email};
use crate::AppState;

const INVALID_CODE: &str = "Invalid or expired verification code";

/// Newest code issued for `email` that has not been used yet.
async fn latest_reset<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<ResetModel>, AppError> {
    PasswordReset::find()
        .filter(password_reset::Column::Email.eq(email))
        .filter(password_reset::Column::Used.eq(false))
        .order_by_desc(password_reset::Column::CreatedAt)
        .one(conn)
        .await
        .map_err(db_err)
}

pub async fn forgot_password(State(state): State<AppState>, body: Bytes) -> Reply<ResetRequested> {
    let dto: ForgotPasswordDto = parse_json(&body)?;
    let email = normalize_email(&dto.email);
    if find_by_email(state.db(), &email).await?.is_none() {
        return Err(AppError::NotFound("User with this email does not exist".into()).into());
    }

    let code = password::generate_code();
    let now = Utc::now();
    let expires_at = password::code_expiry(now);
    let (stored_email, stored_code) = (email.clone(), code.clone());

    state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                // older codes stop working once a new one is issued
                PasswordReset::update_many()
                    .col_expr(password_reset::Column::Used, Expr::value(true))
                    .filter(password_reset::Column::Email.eq(stored_email.as_str()))
                    .filter(password_reset::Column::Used.eq(false))
                    .exec(conn)
                    .await
                    .map_err(db_err)?;
                ResetActiveModel {
                    email: Set(stored_email),
                    code: Set(stored_code),
                    expires_at: Set(expires_at),
                    used: Set(false),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(conn)
                .await
                .map_err(db_err)?;
                Ok::<_, AppError>(())
            })
        })
        .await?;

    let mail = Email {
        from: state.mail_from.clone(),
        to: email.clone(),
        subject: "Password reset code".into(),
        body: format!(
            "Your password reset code is {code}. It expires in {} minutes.",
            password::CODE_TTL_MINUTES
        ),
    };
    if let Err(e) = state.mailer.send(&mail).await {
        error!(to = %email, %e, "could not deliver reset code");
        return Err(AppError::Internal(e.to_string()).into());
    }

    info!(to = %email, "password reset code issued");
    ok(
        ResetRequested { email, expires_at },
        "Verification code sent to your email",
    )
}

pub async fn verify_code(State(state): State<AppState>, body: Bytes) -> Reply<CodeCheck> {
    let dto: VerifyCodeDto = parse_json(&body)?;
    let email = normalize_email(&dto.email);
    let is_valid = latest_reset(state.db(), &email)
        .await?
        .is_some_and(|reset| password::is_usable(&reset, &dto.code, Utc::now()));

    let message = if is_valid {
        "Verification code is valid"
    } else {
        INVALID_CODE
    };
    ok(CodeCheck { is_valid }, message)
}

/// Sets the new password and burns the code in one transaction.
pub async fn reset_password(State(state): State<AppState>, body: Bytes) -> Reply<UserData> {
    let dto: ResetPasswordDto = parse_json(&body)?;
    let email = normalize_email(&dto.email);
    let hash = password::hash_password(&dto.password)?;
    let code = dto.code;

    let user = state
        .runner
        .run(TransactionOptions::default(), move |tx| {
            Box::pin(async move {
                let conn = tx.conn();
                let reset = latest_reset(conn, &email)
                    .await?
                    .filter(|r| password::is_usable(r, &code, Utc::now()))
                    .ok_or_else(|| AppError::BadRequest(INVALID_CODE.into()))?;
                let Some(found) = find_by_email(conn, &email).await? else {
                    return Err(AppError::NotFound(
                        "User with this email does not exist".into(),
                    ));
                };

                let mut account: UserActiveModel = found.into();
                account.password = Set(hash);
                account.updated_at = Set(Some(Utc::now()));
                let updated = account.update(conn).await.map_err(db_err)?;

                let mut consumed: ResetActiveModel = reset.into();
                consumed.used = Set(true);
                consumed.update(conn).await.map_err(db_err)?;
                Ok::<_, AppError>(updated)
            })
        })
        .await?;

    info!(user_id = user.user_id, "password reset");
    ok(UserData::from(user), "Password reset successfully")
}
