use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Local;
use serde::Deserialize;
use sqlx::PgPool;

use crate::attendance;
use crate::models::{Student, StudentResponse, TokenResponse};
use crate::password;
use crate::token::Tokens;
use crate::{proceeds, Error, Payload};

pub async fn register_student(
    Extension(pg): Extension<PgPool>,
    Json(student): Json<CreateStudent>,
) -> Result<(StatusCode, Json<StudentResponse>), Error> {
    let student = student.validated()?;
    let password_hash = password::hash(&student.password)?;

    let mut tx = pg.begin().await?;
    // serialises registrations so only one can see an empty table
    sqlx::query("LOCK TABLE students IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut tx)
        .await?;

    let existing = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = $1 LIMIT 1")
        .bind(&student.email)
        .fetch_optional(&mut tx)
        .await?;
    if existing.is_some() {
        return Err(email_taken());
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
        .fetch_one(&mut tx)
        .await?;
    let is_admin = first_registrant(count);

    let created = sqlx::query_as::<_, Student>(
        "INSERT INTO students (name, email, password_hash, is_admin)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&student.name)
    .bind(&student.email)
    .bind(&password_hash)
    .bind(is_admin)
    .fetch_one(&mut tx)
    .await
    .map_err(|err| match Error::from(err) {
        Error::Conflict { .. } => email_taken(),
        other => other,
    })?;
    tx.commit().await?;

    log::info!(
        "Registered student {} (id {}, admin: {})",
        created.email,
        created.id,
        created.is_admin
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn login_student(
    Extension(pg): Extension<PgPool>,
    Extension(tokens): Extension<Tokens>,
    Json(login): Json<LoginStudent>,
) -> Payload<TokenResponse> {
    let login = login.validated()?;

    let user = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = $1 LIMIT 1")
        .bind(&login.email)
        .fetch_optional(&pg)
        .await?;

    let student = match user {
        Some(user) if password::verify(&login.password, &user.password_hash) => user,
        Some(_) => return Err(bad_credentials()),
        None => {
            password::verify_dummy(&login.password);
            return Err(bad_credentials());
        }
    };

    let today = Local::now().date_naive();
    let mut tx = pg.begin().await?;
    let record = match attendance::record_login(&mut tx, &student, today).await {
        Ok(record) => record,
        Err(err) => {
            if let Error::BadRequest { .. } = err {
                log::warn!("Rejected second login today for {}", student.email);
            }
            return Err(err);
        }
    };
    let access_token = tokens.issue(&student.email)?;
    tx.commit().await?;

    log::info!(
        "Student {} logged in (login count {})",
        student.email,
        record.login_count
    );
    proceeds(TokenResponse::bearer(access_token))
}

fn first_registrant(existing_students: i64) -> bool {
    existing_students == 0
}

fn email_taken() -> Error {
    Error::conflict("Email already registered")
}

fn bad_credentials() -> Error {
    Error::unauthorized("Incorrect email or password")
}

/// `local@domain.tld` with no whitespace; deliberately loose.
fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}

/// Trims and lowercases the domain; the local part keeps its case.
fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudent {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl CreateStudent {
    fn validated(self) -> Result<Self, Error> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::invalid_payload("`name` parameter was empty"));
        }
        let email = normalize_email(&self.email);
        if !valid_email(&email) {
            return Err(Error::invalid_payload("`email` is not a valid email address"));
        }
        if self.password.is_empty() {
            return Err(Error::invalid_payload("Provided password was empty!"));
        }
        Ok(Self {
            name,
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginStudent {
    pub email: String,
    pub password: String,
}

impl LoginStudent {
    fn validated(self) -> Result<Self, Error> {
        let email = normalize_email(&self.email);
        if !valid_email(&email) {
            return Err(Error::invalid_payload("`email` is not a valid email address"));
        }
        // empty passwords fall through to verification
        Ok(Self {
            email,
            password: self.password,
        })
    }
}
