//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::pagination::Page;
use shared::validation::{self, Validate, ValidationErrors};
use strum_macros::{Display, EnumString, VariantNames};
use strum::VariantNames as _;

use crate::model::UserModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, VariantNames)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Teacher,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
}

pub const MIN_PASSWORD_LEN: usize = 6;
pub const CODE_LEN: usize = 6;

/// Role and status stay plain strings here so a bad value is reported as a
/// field error instead of a decoder failure.
#[derive(Debug, Deserialize)]
pub struct CreateUserDto {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl Validate for CreateUserDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::not_blank(&mut errors, "full_name", &self.full_name);
        validation::email(&mut errors, "email", &self.email);
        validation::min_len(&mut errors, "password", &self.password, MIN_PASSWORD_LEN);
        validation::one_of(&mut errors, "role", &self.role, UserRole::VARIANTS);
        if let Some(status) = &self.status {
            validation::one_of(&mut errors, "status", status, UserStatus::VARIANTS);
        }
        errors.into_result()
    }
}

impl CreateUserDto {
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::User)
    }

    pub fn status(&self) -> UserStatus {
        self.status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordDto {
    pub email: String,
}

impl Validate for ForgotPasswordDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::email(&mut errors, "email", &self.email);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeDto {
    pub email: String,
    pub code: String,
}

impl Validate for VerifyCodeDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::email(&mut errors, "email", &self.email);
        validation::exact_len(&mut errors, "code", &self.code, CODE_LEN);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordDto {
    pub email: String,
    pub code: String,
    pub password: String,
    pub confirm_password: String,
}

impl Validate for ResetPasswordDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::email(&mut errors, "email", &self.email);
        validation::exact_len(&mut errors, "code", &self.code, CODE_LEN);
        validation::min_len(&mut errors, "password", &self.password, MIN_PASSWORD_LEN);
        validation::min_len(
            &mut errors,
            "confirmPassword",
            &self.confirm_password,
            MIN_PASSWORD_LEN,
        );
        if self.password != self.confirm_password {
            errors.push("confirmPassword", "confirmPassword must match password");
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordDto {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl Validate for ChangePasswordDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::not_blank(&mut errors, "currentPassword", &self.current_password);
        validation::min_len(&mut errors, "newPassword", &self.new_password, MIN_PASSWORD_LEN);
        if self.new_password != self.confirm_password {
            errors.push("confirmPassword", "confirmPassword must match newPassword");
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileDto {
    pub full_name: String,
}

impl Validate for UpdateProfileDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        validation::not_blank(&mut errors, "full_name", &self.full_name);
        errors.into_result()
    }
}

/// Raw `GET /users` query.
#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    /// Matches name or e-mail.
    pub text: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct UserFilter {
    pub text: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl UserSearchQuery {
    pub fn resolve(&self) -> Result<(Page, UserFilter), AppError> {
        let page = Page::from_query(self.page.as_deref(), self.limit.as_deref())?;
        let mut errors = ValidationErrors::default();
        let role = non_empty(&self.role).and_then(|raw| {
            validation::one_of(&mut errors, "role", raw, UserRole::VARIANTS);
            raw.parse().ok()
        });
        let status = non_empty(&self.status).and_then(|raw| {
            validation::one_of(&mut errors, "status", raw, UserStatus::VARIANTS);
            raw.parse().ok()
        });
        errors.into_result()?;
        Ok((
            page,
            UserFilter {
                text: non_empty(&self.text).map(str::to_lowercase),
                role,
                status,
            },
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user_id: i32,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UserModel> for UserData {
    fn from(m: UserModel) -> Self {
        Self {
            user_id: m.user_id,
            full_name: m.full_name,
            email: m.email,
            role: m.role,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Result of blocking or unblocking an account.
#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub user_id: i32,
    pub status: UserStatus,
}

#[derive(Debug, Serialize)]
pub struct ResetRequested {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCheck {
    pub is_valid: bool,
}
