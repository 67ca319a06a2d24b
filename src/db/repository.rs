use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::grid::EntryFilter;
use crate::models::{
    Assignment, DayOfWeek, EntityRef, EntryPosition, PlanSettings, PositionOperation, SlotContent,
    Timetable, TimetableEntry,
};

const ENTRY_COLUMNS: &str = "id, day_of_week, period, period_type, \
    subject_id, subject_code, subject_name, \
    teacher_id, teacher_code, teacher_name, \
    room_id, room_code, room_name, \
    class_id, class_code, class_name, \
    is_locked, is_empty, start_time, end_time";

pub async fn insert_timetable(db: &SqlitePool, timetable: &Timetable) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO timetables (uuid, days_per_week, periods_per_day, generated_date, modified_date) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(timetable.uuid.to_string())
    .bind(timetable.plan_settings.map(|p| p.days_per_week as i64))
    .bind(timetable.plan_settings.map(|p| p.periods_per_day as i64))
    .bind(timetable.generated_date.map(|d| d.to_rfc3339()))
    .bind(timetable.modified_date.map(|d| d.to_rfc3339()))
    .execute(&mut *tx)
    .await?;

    for entry in &timetable.entries {
        insert_entry(&mut tx, timetable.uuid, entry).await?;
    }

    tx.commit().await
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    timetable_uuid: Uuid,
    entry: &TimetableEntry,
) -> Result<(), sqlx::Error> {
    let assignment = entry.assignment();
    let subject = ref_columns(assignment.and_then(|a| a.subject.as_ref()));
    let teacher = ref_columns(assignment.and_then(|a| a.teacher.as_ref()));
    let room = ref_columns(assignment.and_then(|a| a.room.as_ref()));
    let class = ref_columns(assignment.and_then(|a| a.class.as_ref()));

    sqlx::query(
        "INSERT INTO timetable_entries (id, timetable_uuid, day_of_week, period, period_type, \
         subject_id, subject_code, subject_name, teacher_id, teacher_code, teacher_name, \
         room_id, room_code, room_name, class_id, class_code, class_name, \
         is_locked, is_empty, start_time, end_time) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&entry.id)
    .bind(timetable_uuid.to_string())
    .bind(entry.day_of_week.number() as i64)
    .bind(entry.period as i64)
    .bind(period_type_column(&entry.content))
    .bind(subject.0)
    .bind(subject.1)
    .bind(subject.2)
    .bind(teacher.0)
    .bind(teacher.1)
    .bind(teacher.2)
    .bind(room.0)
    .bind(room.1)
    .bind(room.2)
    .bind(class.0)
    .bind(class.1)
    .bind(class.2)
    .bind(entry.is_locked)
    .bind(entry.is_empty)
    .bind(&entry.start_time)
    .bind(&entry.end_time)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_timetable(db: &SqlitePool, uuid: Uuid) -> Result<Option<Timetable>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT uuid, days_per_week, periods_per_day, generated_date, modified_date FROM timetables WHERE uuid = ?"
    )
    .bind(uuid.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let days_per_week: Option<i64> = row.try_get("days_per_week")?;
    let periods_per_day: Option<i64> = row.try_get("periods_per_day")?;
    let plan_settings = match (days_per_week, periods_per_day) {
        (Some(days), Some(periods)) => Some(PlanSettings {
            days_per_week: days as u8,
            periods_per_day: periods as u32,
        }),
        _ => None,
    };

    Ok(Some(Timetable {
        uuid,
        plan_settings,
        generated_date: parse_timestamp(row.try_get("generated_date")?),
        modified_date: parse_timestamp(row.try_get("modified_date")?),
        entries: fetch_entries(db, uuid).await?,
    }))
}

pub async fn fetch_entries(db: &SqlitePool, uuid: Uuid) -> Result<Vec<TimetableEntry>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM timetable_entries WHERE timetable_uuid = ? ORDER BY day_of_week, period",
        ENTRY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(uuid.to_string())
        .fetch_all(db)
        .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Server-side counterpart of the grid filter. Soft-deleted entries show no
/// assignment, so they never match a reference id.
pub async fn filter_entries(
    db: &SqlitePool,
    uuid: Uuid,
    filter: &EntryFilter,
) -> Result<Vec<TimetableEntry>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM timetable_entries WHERE timetable_uuid = ",
        ENTRY_COLUMNS
    ));
    builder.push_bind(uuid.to_string());

    let mut constrained = false;
    for (column, ids) in [
        ("class_id", &filter.class_ids),
        ("teacher_id", &filter.teacher_ids),
        ("room_id", &filter.room_ids),
        ("subject_id", &filter.subject_ids),
    ] {
        let Some(ids) = ids else { continue };
        if ids.is_empty() {
            continue;
        }
        constrained = true;

        builder.push(format!(" AND {} IN (", column));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
    }
    if constrained {
        builder.push(" AND is_empty = 0");
    }
    builder.push(" ORDER BY day_of_week, period");

    let rows = builder.build().fetch_all(db).await?;
    rows.iter().map(entry_from_row).collect()
}

/// Applies a position update atomically. `Swap` moves every listed entry;
/// `Create` moves them the same way and then soft-deletes all but the first,
/// so the displaced destination entry stays restorable.
pub async fn update_positions(
    db: &SqlitePool,
    uuid: Uuid,
    positions: &[EntryPosition],
    operation: PositionOperation,
) -> Result<(), AppError> {
    if positions.is_empty() {
        return Err(AppError::BadRequest("no entry positions given".to_string()));
    }
    let distinct: HashSet<&str> = positions.iter().map(|p| p.id.as_str()).collect();
    if distinct.len() != positions.len() {
        return Err(AppError::BadRequest("entry listed more than once".to_string()));
    }

    let uuid_text = uuid.to_string();
    let mut tx = db.begin().await?;

    for position in positions {
        let row = sqlx::query(
            "SELECT is_locked FROM timetable_entries WHERE id = ? AND timetable_uuid = ?"
        )
        .bind(&position.id)
        .bind(&uuid_text)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(AppError::NotFound);
        };
        let is_locked: bool = row.try_get("is_locked")?;
        if is_locked {
            return Err(AppError::Conflict(format!("entry {} is locked", position.id)));
        }
    }

    // Park moving entries on negative periods so (day, period) stays unique
    // at every step.
    for position in positions {
        sqlx::query("UPDATE timetable_entries SET period = -period WHERE id = ?")
            .bind(&position.id)
            .execute(&mut *tx)
            .await?;
    }

    for position in positions {
        sqlx::query("UPDATE timetable_entries SET day_of_week = ?, period = ? WHERE id = ?")
            .bind(position.day_of_week.number() as i64)
            .bind(position.period as i64)
            .bind(&position.id)
            .execute(&mut *tx)
            .await
            .map_err(slot_conflict)?;
    }

    if operation == PositionOperation::Create {
        for displaced in &positions[1..] {
            sqlx::query("UPDATE timetable_entries SET is_empty = 1 WHERE id = ?")
                .bind(&displaced.id)
                .execute(&mut *tx)
                .await?;
        }
    }

    touch_timetable(&mut tx, &uuid_text).await?;
    tx.commit().await?;
    Ok(())
}

/// Brings back a soft-deleted entry that still holds its assignment.
pub async fn restore_entry(
    db: &SqlitePool,
    uuid: Uuid,
    day_of_week: DayOfWeek,
    period: u32,
) -> Result<(), AppError> {
    let uuid_text = uuid.to_string();
    let row = sqlx::query(
        "SELECT id, period_type, is_locked, is_empty, subject_id, teacher_id, room_id \
         FROM timetable_entries WHERE timetable_uuid = ? AND day_of_week = ? AND period = ?"
    )
    .bind(&uuid_text)
    .bind(day_of_week.number() as i64)
    .bind(period as i64)
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Err(AppError::NotFound);
    };

    let id: String = row.try_get("id")?;
    let is_locked: bool = row.try_get("is_locked")?;
    let is_empty: bool = row.try_get("is_empty")?;
    if is_locked {
        return Err(AppError::Conflict(format!("entry {} is locked", id)));
    }
    if !is_empty {
        return Err(AppError::Conflict(format!("entry {} is not removed", id)));
    }

    let period_type: String = row.try_get("period_type")?;
    let subject_id: Option<String> = row.try_get("subject_id")?;
    let teacher_id: Option<String> = row.try_get("teacher_id")?;
    let room_id: Option<String> = row.try_get("room_id")?;
    if period_type == "Regular" && subject_id.is_none() && teacher_id.is_none() && room_id.is_none() {
        return Err(AppError::NotFound);
    }

    let mut tx = db.begin().await?;
    sqlx::query("UPDATE timetable_entries SET is_empty = 0 WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    touch_timetable(&mut tx, &uuid_text).await?;
    tx.commit().await?;

    Ok(())
}

/// Marks the entry at a slot as removed while keeping its assignment.
pub async fn soft_delete_entry(
    db: &SqlitePool,
    uuid: Uuid,
    day_of_week: DayOfWeek,
    period: u32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE timetable_entries
        SET is_empty = 1
        WHERE timetable_uuid = ?1
          AND day_of_week = ?2
          AND period = ?3
          AND is_locked = 0
          AND is_empty = 0
        "#,
    )
    .bind(uuid.to_string())
    .bind(day_of_week.number() as i64)
    .bind(period as i64)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

async fn touch_timetable(conn: &mut SqliteConnection, uuid: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE timetables SET modified_date = ? WHERE uuid = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(uuid)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn slot_conflict(e: sqlx::Error) -> AppError {
    let occupied = e
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());
    if occupied {
        AppError::Conflict("target slot is occupied".to_string())
    } else {
        AppError::Database(e)
    }
}

fn period_type_column(content: &SlotContent) -> &'static str {
    match content {
        SlotContent::Regular(_) => "Regular",
        SlotContent::Break => "Break",
        SlotContent::Lunch => "Lunch",
    }
}

fn ref_columns(entity: Option<&EntityRef>) -> (Option<String>, Option<String>, Option<String>) {
    match entity {
        Some(e) => (Some(e.id.clone()), e.code.clone(), e.name.clone()),
        None => (None, None, None),
    }
}

fn entity_from_row(row: &SqliteRow, prefix: &str) -> Result<Option<EntityRef>, sqlx::Error> {
    let id: Option<String> = row.try_get(format!("{}_id", prefix).as_str())?;
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(Some(EntityRef {
        id,
        code: row.try_get(format!("{}_code", prefix).as_str())?,
        name: row.try_get(format!("{}_name", prefix).as_str())?,
    }))
}

fn entry_from_row(row: &SqliteRow) -> Result<TimetableEntry, sqlx::Error> {
    let day: i64 = row.try_get("day_of_week")?;
    let day_of_week = u8::try_from(day)
        .ok()
        .and_then(DayOfWeek::from_number)
        .ok_or_else(|| decode_error(format!("invalid day_of_week {}", day)))?;
    let period: i64 = row.try_get("period")?;
    let is_empty: bool = row.try_get("is_empty")?;
    let period_type: String = row.try_get("period_type")?;

    // A removed entry keeps its assignment in the table but shows as blank.
    let content = match period_type.as_str() {
        "Regular" if is_empty => SlotContent::Regular(Assignment::default()),
        "Regular" => SlotContent::Regular(Assignment {
            subject: entity_from_row(row, "subject")?,
            teacher: entity_from_row(row, "teacher")?,
            room: entity_from_row(row, "room")?,
            class: entity_from_row(row, "class")?,
        }),
        "Break" => SlotContent::Break,
        "Lunch" => SlotContent::Lunch,
        other => return Err(decode_error(format!("invalid period_type {}", other))),
    };

    Ok(TimetableEntry {
        id: row.try_get("id")?,
        day_of_week,
        period: period as u32,
        content,
        is_locked: row.try_get("is_locked")?,
        is_empty,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
    })
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn parse_timestamp(ts: Option<String>) -> Option<DateTime<Utc>> {
    ts.and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test db");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn lesson(id: &str, day: DayOfWeek, period: u32, subject: &str, teacher: &str) -> TimetableEntry {
        TimetableEntry::regular(
            id,
            day,
            period,
            Assignment {
                subject: Some(EntityRef::new(subject).with_code(subject.to_uppercase())),
                teacher: Some(EntityRef::new(teacher)),
                room: None,
                class: Some(EntityRef::new("7a").with_name("Class 7A")),
            },
        )
    }

    async fn seed(pool: &SqlitePool) -> Uuid {
        let uuid = Uuid::new_v4();
        let mut locked = lesson("locked", DayOfWeek::Monday, 2, "pe", "t3");
        locked.is_locked = true;
        let lunch = TimetableEntry {
            content: SlotContent::Lunch,
            ..TimetableEntry::regular("lunch", DayOfWeek::Monday, 3, Assignment::default())
        };

        let timetable = Timetable {
            uuid,
            plan_settings: Some(PlanSettings {
                days_per_week: 5,
                periods_per_day: 6,
            }),
            generated_date: Some(Utc::now()),
            modified_date: None,
            entries: vec![
                lesson("e1", DayOfWeek::Monday, 1, "math", "t1"),
                locked,
                lunch,
                lesson("e2", DayOfWeek::Tuesday, 2, "physics", "t2"),
            ],
        };
        insert_timetable(pool, &timetable)
            .await
            .expect("Failed to insert timetable");
        uuid
    }

    #[tokio::test]
    async fn test_insert_and_fetch_timetable() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        let timetable = fetch_timetable(&pool, uuid)
            .await
            .expect("Failed to fetch")
            .expect("Timetable not found");

        assert_eq!(timetable.entries.len(), 4);
        assert_eq!(timetable.plan_settings.unwrap().periods_per_day, 6);
        assert!(timetable.generated_date.is_some());

        let first = &timetable.entries[0];
        assert_eq!(first.id, "e1");
        let assignment = first.assignment().unwrap();
        assert_eq!(assignment.subject.as_ref().unwrap().code.as_deref(), Some("MATH"));
        assert_eq!(assignment.class.as_ref().unwrap().name.as_deref(), Some("Class 7A"));
        assert_eq!(timetable.entries[2].content, SlotContent::Lunch);

        assert!(fetch_timetable(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swap_positions() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        let positions = vec![
            EntryPosition {
                id: "e1".into(),
                day_of_week: DayOfWeek::Tuesday,
                period: 2,
            },
            EntryPosition {
                id: "e2".into(),
                day_of_week: DayOfWeek::Monday,
                period: 1,
            },
        ];
        update_positions(&pool, uuid, &positions, PositionOperation::Swap)
            .await
            .expect("Failed to swap");

        let timetable = fetch_timetable(&pool, uuid).await.unwrap().unwrap();
        let find = |id: &str| timetable.entries.iter().find(|e| e.id == id).unwrap().clone();
        assert_eq!((find("e1").day_of_week, find("e1").period), (DayOfWeek::Tuesday, 2));
        assert_eq!((find("e2").day_of_week, find("e2").period), (DayOfWeek::Monday, 1));
        assert!(!find("e2").is_empty);
        assert!(timetable.modified_date.is_some());
    }

    #[tokio::test]
    async fn test_create_displaces_destination_as_restorable() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        let positions = vec![
            EntryPosition {
                id: "e1".into(),
                day_of_week: DayOfWeek::Tuesday,
                period: 2,
            },
            EntryPosition {
                id: "e2".into(),
                day_of_week: DayOfWeek::Monday,
                period: 1,
            },
        ];
        update_positions(&pool, uuid, &positions, PositionOperation::Create)
            .await
            .expect("Failed to create");

        let entries = fetch_entries(&pool, uuid).await.unwrap();
        let displaced = entries.iter().find(|e| e.id == "e2").unwrap();
        assert!(displaced.is_empty);
        assert!(!displaced.has_content());

        restore_entry(&pool, uuid, DayOfWeek::Monday, 1)
            .await
            .expect("Failed to restore");
        let entries = fetch_entries(&pool, uuid).await.unwrap();
        let restored = entries.iter().find(|e| e.id == "e2").unwrap();
        assert!(!restored.is_empty);
        assert_eq!(
            restored.assignment().unwrap().subject.as_ref().unwrap().id,
            "physics"
        );
    }

    #[tokio::test]
    async fn test_locked_entry_is_not_moved() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        let positions = vec![
            EntryPosition {
                id: "e1".into(),
                day_of_week: DayOfWeek::Monday,
                period: 2,
            },
            EntryPosition {
                id: "locked".into(),
                day_of_week: DayOfWeek::Monday,
                period: 1,
            },
        ];
        let err = update_positions(&pool, uuid, &positions, PositionOperation::Swap)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let entries = fetch_entries(&pool, uuid).await.unwrap();
        assert_eq!(entries[0].id, "e1");
        assert_eq!(entries[0].period, 1);
    }

    #[tokio::test]
    async fn test_move_onto_occupied_slot_is_conflict() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        let positions = vec![EntryPosition {
            id: "e1".into(),
            day_of_week: DayOfWeek::Tuesday,
            period: 2,
        }];
        let err = update_positions(&pool, uuid, &positions, PositionOperation::Swap)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let positions = vec![EntryPosition {
            id: "ghost".into(),
            day_of_week: DayOfWeek::Friday,
            period: 1,
        }];
        let err = update_positions(&pool, uuid, &positions, PositionOperation::Swap)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        assert!(soft_delete_entry(&pool, uuid, DayOfWeek::Tuesday, 2).await.unwrap());
        // 二回目は何も起きない
        assert!(!soft_delete_entry(&pool, uuid, DayOfWeek::Tuesday, 2).await.unwrap());
        // locked entries stay
        assert!(!soft_delete_entry(&pool, uuid, DayOfWeek::Monday, 2).await.unwrap());

        let entries = fetch_entries(&pool, uuid).await.unwrap();
        let removed = entries.iter().find(|e| e.id == "e2").unwrap();
        assert!(removed.is_empty);
        assert_eq!(removed.assignment(), Some(&Assignment::default()));

        restore_entry(&pool, uuid, DayOfWeek::Tuesday, 2).await.unwrap();
        let err = restore_entry(&pool, uuid, DayOfWeek::Tuesday, 2).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = restore_entry(&pool, uuid, DayOfWeek::Friday, 6).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_filter_entries() {
        let pool = setup_test_db().await;
        let uuid = seed(&pool).await;

        let filter = EntryFilter {
            teacher_ids: Some(vec!["t1".into(), "t2".into()]),
            ..EntryFilter::default()
        };
        let entries = filter_entries(&pool, uuid, &filter).await.unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);

        let filter = EntryFilter {
            teacher_ids: Some(vec!["t1".into()]),
            subject_ids: Some(vec!["physics".into()]),
            ..EntryFilter::default()
        };
        assert!(filter_entries(&pool, uuid, &filter).await.unwrap().is_empty());

        let all = filter_entries(&pool, uuid, &EntryFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
    }
}
