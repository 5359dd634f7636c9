//! Meetings

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Meeting {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub participants: Vec<Uuid>,
    pub created_by: Uuid,
    pub doc_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub meeting_room_id: String,
    pub status: String,
    pub recording_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    pub fn is_joinable(&self) -> bool {
        self.status == "scheduled" || self.status == "in-progress"
    }

    pub fn allows(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.participants.contains(&user_id)
    }
}

const MEETING_COLUMNS: &str = "id, title, description, start_time, end_time, participants, \
    created_by, doc_id, folder_id, meeting_room_id, status, recording_url, duration_minutes, created_at";

fn meeting_from_row(row: &sqlx::postgres::PgRow) -> Meeting {
    Meeting {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        participants: row.get("participants"),
        created_by: row.get("created_by"),
        doc_id: row.get("doc_id"),
        folder_id: row.get("folder_id"),
        meeting_room_id: row.get("meeting_room_id"),
        status: row.get("status"),
        recording_url: row.get("recording_url"),
        duration_minutes: row.get("duration_minutes"),
        created_at: row.get("created_at"),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn create_meeting(
    pool: &PgPool,
    title: &str,
    description: Option<&str>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    participants: &[Uuid],
    created_by: Uuid,
    doc_id: Option<Uuid>,
    folder_id: Option<Uuid>,
) -> Result<Meeting, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    // opaque room key; never derived from the meeting id
    let meeting_room_id = format!("meeting-{}", Uuid::new_v4());

    sqlx::query(
        r#"
        INSERT INTO meetings (id, title, description, start_time, end_time, participants,
                              created_by, doc_id, folder_id, meeting_room_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(start_time)
    .bind(end_time)
    .bind(participants)
    .bind(created_by)
    .bind(doc_id)
    .bind(folder_id)
    .bind(&meeting_room_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Meeting {
        id,
        title: title.to_string(),
        description: description.map(|s| s.to_string()),
        start_time,
        end_time,
        participants: participants.to_vec(),
        created_by,
        doc_id,
        folder_id,
        meeting_room_id,
        status: "scheduled".to_string(),
        recording_url: None,
        duration_minutes: None,
        created_at: now,
    })
}

pub async fn get_meeting_by_id(pool: &PgPool, meeting_id: Uuid) -> Result<Option<Meeting>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = $1"))
        .bind(meeting_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(meeting_from_row))
}

pub async fn get_meeting_by_room_id(
    pool: &PgPool,
    meeting_room_id: &str,
) -> Result<Option<Meeting>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {MEETING_COLUMNS} FROM meetings WHERE meeting_room_id = $1"
    ))
    .bind(meeting_room_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(meeting_from_row))
}

pub async fn list_meetings_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Meeting>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {MEETING_COLUMNS} FROM meetings
        WHERE created_by = $1 OR $1 = ANY(participants)
        ORDER BY start_time DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(meeting_from_row).collect())
}

/// Add the user to the participant list when absent. Returns true when
/// the row changed, i.e. the joiner was newly added.
pub async fn add_participant_if_missing(
    pool: &PgPool,
    meeting_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE meetings
        SET participants = array_append(participants, $1)
        WHERE id = $2 AND NOT ($1 = ANY(participants))
        "#,
    )
    .bind(user_id)
    .bind(meeting_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_meeting_status(
    pool: &PgPool,
    meeting_id: Uuid,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE meetings SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(meeting_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// End a meeting, recording its duration.
pub async fn complete_meeting(
    pool: &PgPool,
    meeting_id: Uuid,
    duration_minutes: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE meetings SET status = 'completed', end_time = $1, duration_minutes = $2 WHERE id = $3",
    )
    .bind(Utc::now())
    .bind(duration_minutes)
    .bind(meeting_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn cancel_meeting(pool: &PgPool, meeting_id: Uuid) -> Result<(), sqlx::Error> {
    set_meeting_status(pool, meeting_id, "cancelled").await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting(status: &str, created_by: Uuid, participants: Vec<Uuid>) -> Meeting {
        Meeting {
            id: Uuid::new_v4(),
            title: "standup".into(),
            description: None,
            start_time: Utc::now(),
            end_time: None,
            participants,
            created_by,
            doc_id: None,
            folder_id: None,
            meeting_room_id: format!("meeting-{}", Uuid::new_v4()),
            status: status.into(),
            recording_url: None,
            duration_minutes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_joinable_states() {
        let owner = Uuid::new_v4();
        assert!(meeting("scheduled", owner, vec![]).is_joinable());
        assert!(meeting("in-progress", owner, vec![]).is_joinable());
        assert!(!meeting("completed", owner, vec![]).is_joinable());
        assert!(!meeting("cancelled", owner, vec![]).is_joinable());
    }

    #[test]
    fn test_allows_creator_and_participants() {
        let owner = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let m = meeting("scheduled", owner, vec![guest]);
        assert!(m.allows(owner));
        assert!(m.allows(guest));
        assert!(!m.allows(Uuid::new_v4()));
    }
}
