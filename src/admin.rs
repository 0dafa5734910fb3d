use axum::extract::Path;
use axum::Extension;
use sqlx::PgPool;

use crate::guard::AdminStudent;
use crate::models::{Attendance, Student, StudentResponse};
use crate::{proceeds, Error, Payload};

pub async fn list_students(
    AdminStudent(_admin): AdminStudent,
    Extension(pg): Extension<PgPool>,
) -> Payload<Vec<StudentResponse>> {
    let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY id")
        .fetch_all(&pg)
        .await?;
    proceeds(students.into_iter().map(StudentResponse::from).collect())
}

pub async fn list_attendance(
    AdminStudent(_admin): AdminStudent,
    Extension(pg): Extension<PgPool>,
) -> Payload<Vec<Attendance>> {
    let records =
        sqlx::query_as::<_, Attendance>("SELECT * FROM attendance ORDER BY login_time DESC")
            .fetch_all(&pg)
            .await?;
    proceeds(records)
}

pub async fn student_attendance(
    AdminStudent(_admin): AdminStudent,
    Path(student_id): Path<i64>,
    Extension(pg): Extension<PgPool>,
) -> Payload<Vec<Attendance>> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
        .bind(student_id)
        .fetch_optional(&pg)
        .await?;
    if student.is_none() {
        return Err(Error::not_found("Student not found"));
    }

    let records = sqlx::query_as::<_, Attendance>(
        "SELECT * FROM attendance WHERE student_id = $1 ORDER BY login_time DESC",
    )
    .bind(student_id)
    .fetch_all(&pg)
    .await?;
    proceeds(records)
}
