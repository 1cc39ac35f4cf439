//! SeaORM entity definitions for exams, their questions and submissions.

use sea_orm::entity::prelude::*;

/* ---------- EXAMS ---------- */

pub mod exam {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "exams")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub exam_id: i32,
        pub class_id: i32,
        pub title: String,
        pub description: Option<String>,
        pub start_time: DateTimeUtc,
        pub end_time: DateTimeUtc,
        /// Allowed working time in minutes.
        pub total_time: i32,
        pub status: String,
        pub created_by: i32,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod question_exam {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "question_exams")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub exam_id: i32,
        #[sea_orm(primary_key, auto_increment = false)]
        pub question_id: i32,
        #[sea_orm(column_name = "question_order")]
        pub order: i32,
        pub points: f64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/* ---------- SUBMISSIONS ---------- */

pub mod submission {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "submissions")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub submission_id: i32,
        pub exam_id: i32,
        pub student_id: i32,
        pub status: String,
        pub current_question_order: i32,
        /// Seconds left for the student.
        pub remaining_time: i32,
        pub score: Option<f64>,
        pub teacher_feedback: Option<String>,
        pub graded_by: Option<i32>,
        pub graded_at: Option<DateTimeUtc>,
        pub submitted_at: Option<DateTimeUtc>,
        pub started_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod submission_answer {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "submission_answers")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub answer_id: i32,
        pub submission_id: i32,
        pub question_id: i32,
        pub answer_content: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub use exam::{ActiveModel as ExamActiveModel, Entity as Exam, Model as ExamModel};
pub use question_exam::{
    ActiveModel as QuestionExamActiveModel, Entity as QuestionExam, Model as QuestionExamModel,
};
pub use submission::{
    ActiveModel as SubmissionActiveModel, Entity as Submission, Model as SubmissionModel,
};
pub use submission_answer::{
    ActiveModel as AnswerActiveModel, Entity as SubmissionAnswer, Model as AnswerModel,
};
