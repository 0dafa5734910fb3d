use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS students (
        id            BIGSERIAL PRIMARY KEY,
        name          TEXT NOT NULL,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_admin      BOOLEAN NOT NULL DEFAULT FALSE,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at    TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS attendance (
        id              BIGSERIAL PRIMARY KEY,
        student_id      BIGINT NOT NULL UNIQUE REFERENCES students(id),
        login_time      TIMESTAMPTZ NOT NULL DEFAULT now(),
        login_count     INTEGER NOT NULL DEFAULT 1 CHECK (login_count >= 1),
        last_login_date DATE
    )",
    "CREATE INDEX IF NOT EXISTS idx_attendance_login_time ON attendance (login_time DESC)",
];

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let pg = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pg)
}

pub async fn prepare_db(pg: &PgPool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pg).await?;
    }
    log::info!("Database schema is ready");
    Ok(())
}
