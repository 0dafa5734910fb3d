//! Daily attendance bookkeeping driven by successful logins.
//!
//! Each student owns at most one [`Attendance`] row. The first login
//! opens it, later logins advance its counter, and a non-admin who
//! already logged in today is turned away without touching it. Admins
//! are never turned away.

use chrono::NaiveDate;
use sqlx::{Postgres, Transaction};

use crate::models::{Attendance, Student};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No row yet: create one with a count of 1.
    Open,
    /// Bump the existing row to `login_count`.
    Advance { login_count: i32 },
    /// Non-admin already logged in on this date.
    Duplicate,
}

impl Transition {
    pub fn decide(
        is_admin: bool,
        today: NaiveDate,
        record: Option<&Attendance>,
    ) -> Result<Self, Error> {
        match record {
            None => Ok(Transition::Open),
            Some(record) if !is_admin && record.last_login_date == Some(today) => {
                Ok(Transition::Duplicate)
            }
            Some(record) => match record.login_count.checked_add(1) {
                Some(login_count) => Ok(Transition::Advance { login_count }),
                None => Err(Error::InternalError {
                    kind: "CounterOverflow",
                    message: format!("login_count of student {} is saturated", record.student_id),
                }),
            },
        }
    }
}

/// Applies today's login to `student`'s row inside `tx`.
///
/// The owning student row is locked first, so concurrent logins by the
/// same student serialise even before an attendance row exists. Nothing
/// is written on [`Transition::Duplicate`].
pub async fn record_login(
    tx: &mut Transaction<'_, Postgres>,
    student: &Student,
    today: NaiveDate,
) -> Result<Attendance, Error> {
    sqlx::query("SELECT id FROM students WHERE id = $1 FOR UPDATE")
        .bind(student.id)
        .execute(&mut *tx)
        .await?;

    let existing = sqlx::query_as::<_, Attendance>(
        "SELECT * FROM attendance WHERE student_id = $1",
    )
    .bind(student.id)
    .fetch_optional(&mut *tx)
    .await?;

    match Transition::decide(student.is_admin, today, existing.as_ref())? {
        Transition::Duplicate => Err(Error::bad_request(
            "Student has already logged in today. Only one login per day is allowed.",
        )),
        Transition::Open => Ok(sqlx::query_as::<_, Attendance>(
            "INSERT INTO attendance (student_id, login_count, last_login_date)
             VALUES ($1, 1, $2) RETURNING *",
        )
        .bind(student.id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?),
        Transition::Advance { login_count } => Ok(sqlx::query_as::<_, Attendance>(
            "UPDATE attendance SET login_count = $2, last_login_date = $3
             WHERE student_id = $1 RETURNING *",
        )
        .bind(student.id)
        .bind(login_count)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{fresh_pool, insert_student};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn record(login_count: i32, last: NaiveDate) -> Attendance {
        Attendance {
            id: 1,
            student_id: 7,
            login_time: Utc::now() - Duration::days(3),
            login_count,
            last_login_date: Some(last),
        }
    }

    // Mirrors what record_login writes for each transition.
    fn login(is_admin: bool, today: NaiveDate, row: &mut Option<Attendance>) -> bool {
        match Transition::decide(is_admin, today, row.as_ref()).unwrap() {
            Transition::Duplicate => false,
            Transition::Open => {
                *row = Some(Attendance {
                    id: 1,
                    student_id: 7,
                    login_time: Utc::now(),
                    login_count: 1,
                    last_login_date: Some(today),
                });
                true
            }
            Transition::Advance { login_count } => {
                let existing = row.as_mut().unwrap();
                existing.login_count = login_count;
                existing.last_login_date = Some(today);
                true
            }
        }
    }

    #[test]
    fn first_login_opens_record_for_any_role() {
        assert_eq!(Transition::decide(false, day(1), None).unwrap(), Transition::Open);
        assert_eq!(Transition::decide(true, day(1), None).unwrap(), Transition::Open);
    }

    #[test]
    fn student_same_day_is_duplicate() {
        let existing = record(4, day(2));
        assert_eq!(
            Transition::decide(false, day(2), Some(&existing)).unwrap(),
            Transition::Duplicate
        );
    }

    #[test]
    fn student_new_day_advances() {
        let existing = record(4, day(1));
        assert_eq!(
            Transition::decide(false, day(2), Some(&existing)).unwrap(),
            Transition::Advance { login_count: 5 }
        );
    }

    #[test]
    fn admin_same_day_still_advances() {
        let existing = record(2, day(2));
        assert_eq!(
            Transition::decide(true, day(2), Some(&existing)).unwrap(),
            Transition::Advance { login_count: 3 }
        );
    }

    #[test]
    fn record_without_date_advances() {
        let mut existing = record(1, day(1));
        existing.last_login_date = None;
        assert_eq!(
            Transition::decide(false, day(1), Some(&existing)).unwrap(),
            Transition::Advance { login_count: 2 }
        );
    }

    #[test]
    fn repeated_same_day_attempts_change_nothing() {
        let mut row = None;
        assert!(login(false, day(5), &mut row));
        let snapshot = row.clone();
        for _ in 0..5 {
            assert!(!login(false, day(5), &mut row));
        }
        assert_eq!(row, snapshot);
    }

    #[test]
    fn count_grows_by_one_per_accepted_login() {
        let mut row = None;
        let mut accepted = 0;
        for (is_admin, d) in [
            (false, 1),
            (false, 1),
            (false, 2),
            (true, 2),
            (true, 2),
            (false, 3),
            (false, 3),
        ] {
            let before = row.as_ref().map(|r: &Attendance| r.login_count).unwrap_or(0);
            if login(is_admin, day(d), &mut row) {
                accepted += 1;
                assert_eq!(row.as_ref().unwrap().login_count, before + 1);
                assert_eq!(row.as_ref().unwrap().last_login_date, Some(day(d)));
            } else {
                assert_eq!(row.as_ref().unwrap().login_count, before);
            }
        }
        assert_eq!(row.unwrap().login_count, accepted);
    }

    #[test]
    fn admin_scenario_same_day() {
        // first registrant is admin: 1, then 2 and 3 on the same day
        let mut row = None;
        assert!(login(true, day(9), &mut row));
        assert_eq!(row.as_ref().unwrap().login_count, 1);
        assert!(login(true, day(9), &mut row));
        assert_eq!(row.as_ref().unwrap().login_count, 2);
        assert!(login(true, day(9), &mut row));
        assert_eq!(row.as_ref().unwrap().login_count, 3);
    }

    #[test]
    fn saturated_counter_is_an_error_not_a_panic() {
        let existing = record(i32::MAX, day(1));
        let err = Transition::decide(true, day(2), Some(&existing)).unwrap_err();
        assert!(matches!(err, Error::InternalError { kind: "CounterOverflow", .. }));
    }

    async fn login_in_own_tx(
        pg: PgPool,
        student: Student,
        today: NaiveDate,
    ) -> Result<Attendance, Error> {
        let mut tx = pg.begin().await?;
        let record = record_login(&mut tx, &student, today).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn stored(pg: &PgPool, student_id: i64) -> Option<Attendance> {
        sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE student_id = $1")
            .bind(student_id)
            .fetch_optional(pg)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn stored_rows_follow_each_transition() {
        let (_lock, pg) = fresh_pool().await;
        let bob = insert_student(&pg, "bob@x.com", false).await;

        let opened = login_in_own_tx(pg.clone(), bob.clone(), day(1)).await.unwrap();
        assert_eq!(opened.login_count, 1);
        assert_eq!(opened.last_login_date, Some(day(1)));

        for _ in 0..3 {
            let err = login_in_own_tx(pg.clone(), bob.clone(), day(1)).await.unwrap_err();
            assert!(matches!(err, Error::BadRequest { .. }));
        }
        assert_eq!(stored(&pg, bob.id).await, Some(opened.clone()));

        let advanced = login_in_own_tx(pg.clone(), bob.clone(), day(2)).await.unwrap();
        assert_eq!(advanced.id, opened.id);
        assert_eq!(advanced.login_time, opened.login_time);
        assert_eq!(advanced.login_count, 2);
        assert_eq!(advanced.last_login_date, Some(day(2)));
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn concurrent_first_logins_by_an_admin_both_count() {
        let (_lock, pg) = fresh_pool().await;
        let ann = insert_student(&pg, "ann@x.com", true).await;

        let mut first = pg.begin().await.unwrap();
        let opened = record_login(&mut first, &ann, day(4)).await.unwrap();
        assert_eq!(opened.login_count, 1);

        let second = tokio::spawn(login_in_own_tx(pg.clone(), ann.clone(), day(4)));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        first.commit().await.unwrap();

        let advanced = second.await.unwrap().unwrap();
        assert_eq!(advanced.login_count, 2);
        assert_eq!(stored(&pg, ann.id).await.unwrap().login_count, 2);
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn concurrent_first_logins_by_a_student_reject_the_second() {
        let (_lock, pg) = fresh_pool().await;
        let bob = insert_student(&pg, "bob@x.com", false).await;

        let mut first = pg.begin().await.unwrap();
        record_login(&mut first, &bob, day(4)).await.unwrap();

        let second = tokio::spawn(login_in_own_tx(pg.clone(), bob.clone(), day(4)));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        first.commit().await.unwrap();

        let err = second.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert_eq!(stored(&pg, bob.id).await.unwrap().login_count, 1);
    }
}
