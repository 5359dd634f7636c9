//! Notification fan-out
//!
//! Derives recipients from workspace events and persists one
//! notification per recipient. Fan-out failures are logged and
//! swallowed; the originating action always succeeds.
//!
//! Document view/edit/comment/join events are deduplicated against the
//! store: a notification with the same `(recipient, kind, documentId,
//! actorId)` created in the trailing 60 seconds suppresses a new one.

use crate::store::notifications::{exists_recent_duplicate, insert_notification};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

/// The closed set of notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EventReminder,
    EventCreated,
    EventUpdated,
    EventCancelled,
    MeetingStarted,
    MeetingInvitation,
    MeetingJoined,
    Comment,
    DocumentViewed,
    DocumentEdited,
    DocumentCommented,
    ChatMessage,
    Share,
    General,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventReminder => "event_reminder",
            Self::EventCreated => "event_created",
            Self::EventUpdated => "event_updated",
            Self::EventCancelled => "event_cancelled",
            Self::MeetingStarted => "meeting_started",
            Self::MeetingInvitation => "meeting_invitation",
            Self::MeetingJoined => "meeting_joined",
            Self::Comment => "comment",
            Self::DocumentViewed => "document_viewed",
            Self::DocumentEdited => "document_edited",
            Self::DocumentCommented => "document_commented",
            Self::ChatMessage => "chat_message",
            Self::Share => "share",
            Self::General => "general",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "event_reminder" => Self::EventReminder,
            "event_created" => Self::EventCreated,
            "event_updated" => Self::EventUpdated,
            "event_cancelled" => Self::EventCancelled,
            "meeting_started" => Self::MeetingStarted,
            "meeting_invitation" => Self::MeetingInvitation,
            "meeting_joined" => Self::MeetingJoined,
            "comment" => Self::Comment,
            "document_viewed" => Self::DocumentViewed,
            "document_edited" => Self::DocumentEdited,
            "document_commented" => Self::DocumentCommented,
            "chat_message" => Self::ChatMessage,
            "share" => Self::Share,
            "general" => Self::General,
            _ => return None,
        };
        Some(kind)
    }

    /// Kinds subject to the 60-second store-level dedup window.
    fn deduplicated(self) -> bool {
        matches!(
            self,
            Self::DocumentViewed | Self::DocumentEdited | Self::DocumentCommented | Self::MeetingJoined
        )
    }
}

/// Dedup window shared with the in-process presence throttle.
pub const DEDUP_WINDOW_SECS: i64 = 60;

/// Persist one notification, applying the dedup window for document
/// activity kinds when the metadata carries `(documentId, actorId)`.
///
/// Errors are logged and swallowed.
pub async fn notify(
    pool: &PgPool,
    recipient: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    metadata: Value,
) {
    if kind.deduplicated() {
        let doc_id = metadata
            .get("documentId")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let actor_id = metadata
            .get("actorId")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());

        if let (Some(doc_id), Some(actor_id)) = (doc_id, actor_id) {
            match exists_recent_duplicate(
                pool,
                recipient,
                kind.as_str(),
                doc_id,
                actor_id,
                Duration::seconds(DEDUP_WINDOW_SECS),
            )
            .await
            {
                Ok(true) => {
                    tracing::debug!(
                        recipient = %recipient,
                        kind = kind.as_str(),
                        "suppressing duplicate notification"
                    );
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("notification dedup lookup failed: {:?}", e);
                    // fall through and persist anyway; at-least-once
                }
            }
        }
    }

    if let Err(e) = insert_notification(pool, recipient, title, message, kind.as_str(), &metadata).await
    {
        tracing::warn!(
            recipient = %recipient,
            kind = kind.as_str(),
            "failed to persist notification: {:?}",
            e
        );
    }
}

/// Document activity aimed at the owner, suppressed when the actor is
/// the owner themselves.
pub async fn notify_document_activity(
    pool: &PgPool,
    owner: Uuid,
    actor: Uuid,
    actor_name: &str,
    kind: NotificationKind,
    document_id: Uuid,
    document_title: &str,
) {
    if owner == actor {
        return;
    }

    let (title, verb) = match kind {
        NotificationKind::DocumentViewed => ("Document viewed", "viewed"),
        NotificationKind::DocumentEdited => ("Document edited", "edited"),
        NotificationKind::DocumentCommented => ("New comment", "commented on"),
        _ => ("Document activity", "updated"),
    };
    let message = format!("{actor_name} {verb} \"{document_title}\"");

    notify(
        pool,
        owner,
        kind,
        title,
        &message,
        json!({
            "documentId": document_id.to_string(),
            "actorId": actor.to_string(),
        }),
    )
    .await;
}

/// Meeting fan-out to every participant except the actor.
pub async fn notify_meeting_participants(
    pool: &PgPool,
    participants: &[Uuid],
    actor: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    meeting_id: Uuid,
) {
    for &recipient in participants {
        if recipient == actor {
            continue;
        }
        notify(
            pool,
            recipient,
            kind,
            title,
            message,
            json!({
                "meetingId": meeting_id.to_string(),
                "actorId": actor.to_string(),
            }),
        )
        .await;
    }
}

/// Chat message fan-out to every other conversation participant.
pub async fn notify_chat_message(
    pool: &PgPool,
    participants: &[Uuid],
    sender: Uuid,
    sender_name: &str,
    conversation_id: Uuid,
    preview: &str,
) {
    for &recipient in participants {
        if recipient == sender {
            continue;
        }
        notify(
            pool,
            recipient,
            NotificationKind::ChatMessage,
            "New message",
            &format!("{sender_name}: {preview}"),
            json!({
                "conversationId": conversation_id.to_string(),
                "actorId": sender.to_string(),
            }),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_round_trip() {
        let all = [
            NotificationKind::EventReminder,
            NotificationKind::EventCreated,
            NotificationKind::EventUpdated,
            NotificationKind::EventCancelled,
            NotificationKind::MeetingStarted,
            NotificationKind::MeetingInvitation,
            NotificationKind::MeetingJoined,
            NotificationKind::Comment,
            NotificationKind::DocumentViewed,
            NotificationKind::DocumentEdited,
            NotificationKind::DocumentCommented,
            NotificationKind::ChatMessage,
            NotificationKind::Share,
            NotificationKind::General,
        ];
        for kind in all {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("nonsense"), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&NotificationKind::DocumentViewed).unwrap();
        assert_eq!(json, "\"document_viewed\"");
        let kind: NotificationKind = serde_json::from_str("\"meeting_joined\"").unwrap();
        assert_eq!(kind, NotificationKind::MeetingJoined);
    }

    #[test]
    fn test_dedup_applies_to_activity_kinds_only() {
        assert!(NotificationKind::DocumentViewed.deduplicated());
        assert!(NotificationKind::DocumentEdited.deduplicated());
        assert!(NotificationKind::DocumentCommented.deduplicated());
        assert!(NotificationKind::MeetingJoined.deduplicated());
        assert!(!NotificationKind::ChatMessage.deduplicated());
        assert!(!NotificationKind::Share.deduplicated());
        assert!(!NotificationKind::General.deduplicated());
    }
}
