//! Meeting lifecycle
//!
//! Scheduling, the join transition, and invitation fan-out. Presence
//! mechanics live in [`crate::meetings::rooms`]; this module owns the
//! persisted meeting record.

use crate::error::{AppError, AppResult};
use crate::notify::{notify_meeting_participants, NotificationKind};
use crate::store::meetings::{
    add_participant_if_missing, create_meeting, get_meeting_by_room_id, set_meeting_status, Meeting,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub async fn schedule_meeting(
    pool: &PgPool,
    title: &str,
    description: Option<&str>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    participants: &[Uuid],
    created_by: Uuid,
    doc_id: Option<Uuid>,
    folder_id: Option<Uuid>,
) -> AppResult<Meeting> {
    if title.trim().is_empty() {
        return Err(AppError::invalid_argument("meeting title required"));
    }

    let meeting = create_meeting(
        pool,
        title,
        description,
        start_time,
        end_time,
        participants,
        created_by,
        doc_id,
        folder_id,
    )
    .await?;

    notify_meeting_participants(
        pool,
        participants,
        created_by,
        NotificationKind::MeetingInvitation,
        "Meeting invitation",
        &format!("You have been invited to \"{title}\""),
        meeting.id,
    )
    .await;

    Ok(meeting)
}

/// Authorize and record a join against the persisted meeting.
///
/// The caller must be a listed participant or the creator; completed
/// and cancelled meetings reject joins. First join moves a scheduled
/// meeting to in-progress. When the joiner was not yet on the
/// participant list (the creator, typically) they are added, and the
/// other participants are notified.
pub async fn authorize_join(
    pool: &PgPool,
    meeting_room_id: &str,
    user_id: Uuid,
) -> AppResult<Meeting> {
    let meeting = get_meeting_by_room_id(pool, meeting_room_id)
        .await?
        .ok_or_else(|| AppError::not_found("meeting not found"))?;

    if !meeting.is_joinable() {
        return Err(AppError::invalid_argument(format!(
            "meeting is {}",
            meeting.status
        )));
    }
    if !meeting.allows(user_id) {
        return Err(AppError::forbidden("not invited to this meeting"));
    }

    add_participant_if_missing(pool, meeting.id, user_id).await?;

    if meeting.status == "scheduled" {
        set_meeting_status(pool, meeting.id, "in-progress").await?;
        notify_meeting_participants(
            pool,
            &meeting.participants,
            user_id,
            NotificationKind::MeetingStarted,
            "Meeting started",
            &format!("\"{}\" has started", meeting.title),
            meeting.id,
        )
        .await;
    }

    // meeting_joined fan-out happens when the socket layer establishes
    // a new presence, not here; see notify_presence_established

    // return the post-join view
    let meeting = get_meeting_by_room_id(pool, meeting_room_id)
        .await?
        .ok_or_else(|| AppError::not_found("meeting not found"))?;
    Ok(meeting)
}

/// Notify the remaining participants that an existing invitee
/// established a new presence.
pub async fn notify_presence_established(
    pool: &PgPool,
    meeting: &Meeting,
    joiner: Uuid,
    joiner_name: &str,
) {
    notify_meeting_participants(
        pool,
        &meeting.participants,
        joiner,
        NotificationKind::MeetingJoined,
        "Participant joined",
        &format!("{joiner_name} joined \"{}\"", meeting.title),
        meeting.id,
    )
    .await;
}
