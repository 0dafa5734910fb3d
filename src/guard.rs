use axum::async_trait;
use axum::extract::rejection::ExtensionRejection;
use axum::extract::{FromRequest, RequestParts, TypedHeader};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::Extension;
use sqlx::PgPool;

use crate::models::Student;
use crate::token::Tokens;
use crate::Error;

/// Any student presenting a valid bearer token.
pub struct AuthStudent(pub Student);

/// A student presenting a valid bearer token who is also an admin.
pub struct AdminStudent(pub Student);

pub async fn authenticate(pg: &PgPool, tokens: &Tokens, token: &str) -> Result<Student, Error> {
    let email = tokens
        .verify(token)
        .ok_or_else(|| Error::unauthorized("Could not validate credentials"))?;

    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = $1 LIMIT 1")
        .bind(&email)
        .fetch_optional(pg)
        .await?
        .ok_or_else(|| Error::unauthorized("User not found"))
}

pub fn require_admin(student: Student) -> Result<Student, Error> {
    if student.is_admin {
        Ok(student)
    } else {
        Err(Error::forbidden("Not enough permissions"))
    }
}

fn missing_extension(err: ExtensionRejection) -> Error {
    Error::InternalError {
        kind: "ConfigurationError",
        message: err.to_string(),
    }
}

#[async_trait]
impl<B> FromRequest<B> for AuthStudent
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| Error::unauthorized("Not authenticated"))?;
        let Extension(tokens) = Extension::<Tokens>::from_request(req)
            .await
            .map_err(missing_extension)?;
        let Extension(pg) = Extension::<PgPool>::from_request(req)
            .await
            .map_err(missing_extension)?;

        authenticate(&pg, &tokens, bearer.token()).await.map(AuthStudent)
    }
}

#[async_trait]
impl<B> FromRequest<B> for AdminStudent
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let AuthStudent(student) = AuthStudent::from_request(req).await?;
        require_admin(student).map(AdminStudent)
    }
}
