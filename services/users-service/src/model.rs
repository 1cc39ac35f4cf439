//! SeaORM entity definitions for accounts and password reset codes.

use sea_orm::entity::prelude::*;

/* ---------- USERS ---------- */

pub mod user {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub user_id: i32,
        pub full_name: String,
        #[sea_orm(unique)]
        pub email: String,
        /// Argon2 PHC string, never the plain password.
        pub password: String,
        pub role: String,
        pub status: String,
        pub created_at: DateTimeUtc,
        pub updated_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/* ---------- PASSWORD RESETS ---------- */

pub mod password_reset {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "password_resets")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub reset_id: i32,
        pub email: String,
        pub code: String,
        pub expires_at: DateTimeUtc,
        pub used: bool,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub use password_reset::{
    ActiveModel as ResetActiveModel, Entity as PasswordReset, Model as ResetModel,
};
pub use user::{ActiveModel as UserActiveModel, Entity as User, Model as UserModel};
