//! Collaboration engine
//!
//! Owns the live rooms: materializes one per document on first join,
//! applies CRDT updates, runs the periodic auto-save, and disposes a
//! room after its last participant leaves (with a final save). Roles
//! are checked at join only; mid-session revocation is not detected.

use crate::access::resolve_document_role;
use crate::collab::recovery::recover_content;
use crate::collab::room::{Participant, Room};
use crate::config::CollabConfig;
use crate::error::{AppError, AppResult};
use crate::notify::{notify_document_activity, NotificationKind};
use crate::store::activity::{log_activity, RequestContext};
use crate::store::content::{latest_for_document, save_content};
use crate::store::documents::{get_document_access_view, get_document_by_id, touch_edit, track_view};
use crate::store::users::get_user_by_id;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// What a successful join hands back to the socket layer.
pub struct JoinOutcome {
    pub content: String,
    pub users: Vec<Participant>,
    /// Full CRDT state as a v1 update for the initial `yjs_sync`.
    pub sync: Vec<u8>,
}

#[derive(Clone)]
pub struct CollabEngine {
    rooms: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Room>>>>>,
    pool: Option<PgPool>,
    config: CollabConfig,
    /// (document, actor) -> last presence notification; in-process
    /// throttle on top of the store-level dedup.
    presence_marks: Arc<Mutex<HashMap<(Uuid, Uuid), Instant>>>,
}

impl CollabEngine {
    pub fn new(pool: Option<PgPool>, config: CollabConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            pool,
            config,
            presence_marks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch the room for a document, materializing it (and seeding from
    /// the latest content blob) when absent. Updates may arrive before
    /// the join that should have created the room; materialization must
    /// therefore be tolerated out of order.
    async fn get_or_create_room(&self, document_id: Uuid) -> Arc<Mutex<Room>> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(&document_id) {
                return room.clone();
            }
        }

        let mut room = Room::new(document_id);
        if let Some(pool) = &self.pool {
            match latest_for_document(pool, document_id).await {
                Ok(Some(blob)) => room.seed(&blob.content),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(document_id = %document_id, "failed to load content blob: {:?}", e);
                }
            }
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(document_id)
            .or_insert_with(|| Arc::new(Mutex::new(room)))
            .clone()
    }

    /// Authorize and admit a participant.
    pub async fn join(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        fallback_name: &str,
        socket_id: Uuid,
    ) -> AppResult<JoinOutcome> {
        let mut display_name = fallback_name.to_string();
        let mut owner = None;
        let mut doc_title = String::new();

        if let Some(pool) = &self.pool {
            let doc = get_document_by_id(pool, document_id)
                .await?
                .ok_or_else(|| AppError::not_found("document not found"))?;

            let view = get_document_access_view(pool, &doc).await?;
            let role = resolve_document_role(&view, user_id);
            if !role.can_view() {
                // indistinguishable from true absence
                return Err(AppError::not_found("document not found"));
            }

            if let Some(user) = get_user_by_id(pool, user_id).await? {
                display_name = user.display_name();
            }
            owner = Some(doc.created_by);
            doc_title = doc.title;
        }

        let room = self.get_or_create_room(document_id).await;
        let outcome = {
            let mut room = room.lock().await;
            room.add_participant(user_id, display_name.clone(), socket_id);
            JoinOutcome {
                content: room.buffered_content.clone().unwrap_or_else(|| room.text()),
                users: room.participants().to_vec(),
                sync: room.state_as_update(),
            }
        };

        if let (Some(pool), Some(owner)) = (self.pool.clone(), owner) {
            if let Err(e) = track_view(&pool, document_id, user_id).await {
                tracing::warn!("track_view failed: {:?}", e);
            }
            if let Err(e) = log_activity(
                &pool,
                user_id,
                "document_viewed",
                Some("document"),
                Some(document_id),
                None,
                &RequestContext::default(),
            )
            .await
            {
                tracing::warn!("activity log failed: {:?}", e);
            }
            self.notify_presence_throttled(&pool, owner, user_id, &display_name, document_id, &doc_title)
                .await;
        }

        Ok(outcome)
    }

    /// Presence-derived view notification, throttled per
    /// (document, actor) to one per window in-process.
    async fn notify_presence_throttled(
        &self,
        pool: &PgPool,
        owner: Uuid,
        actor: Uuid,
        actor_name: &str,
        document_id: Uuid,
        document_title: &str,
    ) {
        {
            let mut marks = self.presence_marks.lock().await;
            let key = (document_id, actor);
            if let Some(last) = marks.get(&key) {
                if last.elapsed() < self.config.presence_throttle {
                    return;
                }
            }
            marks.insert(key, Instant::now());
        }

        notify_document_activity(
            pool,
            owner,
            actor,
            actor_name,
            NotificationKind::DocumentViewed,
            document_id,
            document_title,
        )
        .await;
    }

    /// Apply an opaque update and queue the extracted content for
    /// auto-save. Parse failures are logged and skipped; the room stays
    /// live either way.
    pub async fn apply_update(
        &self,
        document_id: Uuid,
        sender: Uuid,
        update_bytes: &[u8],
    ) -> AppResult<()> {
        let room = self.get_or_create_room(document_id).await;
        {
            let mut room = room.lock().await;
            room.apply_update(update_bytes)?;
            room.last_editor = Some(sender);

            let text = room.text();
            match recover_content(&text) {
                Some(value) => {
                    room.buffered_content = Some(value.to_string());
                }
                None => {
                    tracing::debug!(
                        document_id = %document_id,
                        "no recoverable editor state, skipping save for this update"
                    );
                }
            }
        }

        if let Some(pool) = &self.pool {
            if let Err(e) = touch_edit(pool, document_id, sender).await {
                tracing::warn!("touch_edit failed: {:?}", e);
            }
        }

        Ok(())
    }

    /// Update a participant's cursor. Ephemeral; never persisted.
    pub async fn cursor_update(&self, document_id: Uuid, socket_id: Uuid, cursor: Value) -> bool {
        let rooms = self.rooms.read().await;
        match rooms.get(&document_id) {
            Some(room) => room.lock().await.update_cursor(socket_id, cursor),
            None => false,
        }
    }

    /// Current participants of a room, empty when the room is absent.
    pub async fn presence(&self, document_id: Uuid) -> Vec<Participant> {
        let rooms = self.rooms.read().await;
        match rooms.get(&document_id) {
            Some(room) => room.lock().await.participants().to_vec(),
            None => Vec::new(),
        }
    }

    /// Buffered content for an explicit snapshot; falls back to a fresh
    /// extraction.
    pub async fn current_content(&self, document_id: Uuid) -> Option<String> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(&document_id)?;
        let room = room.lock().await;
        room.buffered_content
            .clone()
            .or_else(|| recover_content(&room.text()).map(|v| v.to_string()))
    }

    /// Remove a participant. When the room empties, perform the final
    /// save and dispose it.
    pub async fn leave(&self, document_id: Uuid, socket_id: Uuid) -> Option<Participant> {
        let room = {
            let rooms = self.rooms.read().await;
            rooms.get(&document_id)?.clone()
        };

        let (left, drained) = {
            let mut room = room.lock().await;
            let left = room.remove_participant(socket_id);
            (left, room.is_empty())
        };

        if drained {
            self.dispose_room(document_id).await;
        }

        left
    }

    /// Final save, then drop the room. A draining writer still gets to
    /// finalize even if a concurrent join re-creates the room after.
    async fn dispose_room(&self, document_id: Uuid) {
        let room = {
            let mut rooms = self.rooms.write().await;
            let Some(existing) = rooms.get(&document_id).cloned() else {
                return;
            };
            // a new participant may have slipped in between the empty
            // check and disposal; keep the room in that case
            if !existing.lock().await.is_empty() {
                return;
            }
            rooms.remove(&document_id);
            existing
        };
        if let Some(pool) = &self.pool {
            let mut room = room.lock().await;
            self.flush_room(pool, &mut room).await;
        }
        tracing::info!(document_id = %document_id, "room disposed");
    }

    /// Persist the room's buffered content. Failures are logged; the
    /// dirty flag stays set so the next tick retries.
    async fn flush_room(&self, pool: &PgPool, room: &mut Room) {
        let content = match &room.buffered_content {
            Some(content) => content.clone(),
            None => match recover_content(&room.text()) {
                Some(value) => value.to_string(),
                None => return,
            },
        };

        match save_content(pool, room.document_id, &content).await {
            Ok(_) => {
                room.dirty = false;
                if let Some(editor) = room.last_editor {
                    self.notify_edit(pool, room.document_id, editor).await;
                }
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %room.document_id,
                    "auto-save failed, will retry next tick: {:?}",
                    e
                );
            }
        }
    }

    /// Owner-directed edit notification after a successful save. The
    /// store-level dedup window absorbs repeated flushes.
    async fn notify_edit(&self, pool: &PgPool, document_id: Uuid, editor: Uuid) {
        let doc = match get_document_by_id(pool, document_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("edit notification lookup failed: {:?}", e);
                return;
            }
        };
        if doc.created_by == editor {
            return;
        }
        let editor_name = match get_user_by_id(pool, editor).await {
            Ok(Some(user)) => user.display_name(),
            _ => "Someone".to_string(),
        };
        notify_document_activity(
            pool,
            doc.created_by,
            editor,
            &editor_name,
            NotificationKind::DocumentEdited,
            document_id,
            &doc.title,
        )
        .await;
    }

    /// Periodic auto-save over all live rooms with unsaved changes.
    pub async fn autosave_tick(&self) {
        let Some(pool) = self.pool.clone() else { return };
        let rooms: Vec<Arc<Mutex<Room>>> = {
            let rooms = self.rooms.read().await;
            rooms.values().cloned().collect()
        };

        for room in rooms {
            let mut room = room.lock().await;
            if room.dirty && !room.is_empty() {
                self.flush_room(&pool, &mut room).await;
            }
        }
    }

    /// Spawn the background auto-save loop.
    pub fn spawn_autosave(&self) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        let interval = self.config.autosave_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                engine.autosave_tick().await;
            }
        })
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    #[cfg(test)]
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine() -> CollabEngine {
        CollabEngine::new(None, CollabConfig::default())
    }

    #[tokio::test]
    async fn test_join_materializes_room() {
        let engine = engine();
        let doc = Uuid::new_v4();
        let outcome = engine
            .join(doc, Uuid::new_v4(), "alice", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome.users.len(), 1);
        assert_eq!(engine.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_last_leave_disposes_room() {
        let engine = engine();
        let doc = Uuid::new_v4();
        let socket = Uuid::new_v4();
        engine.join(doc, Uuid::new_v4(), "a", socket).await.unwrap();
        let left = engine.leave(doc, socket).await;
        assert!(left.is_some());
        assert_eq!(engine.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_survives_while_others_remain() {
        let engine = engine();
        let doc = Uuid::new_v4();
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        engine.join(doc, Uuid::new_v4(), "a", s1).await.unwrap();
        engine.join(doc, Uuid::new_v4(), "b", s2).await.unwrap();

        engine.leave(doc, s1).await;
        assert_eq!(engine.room_count().await, 1);
        assert_eq!(engine.presence(doc).await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_before_join_creates_room() {
        // out-of-order materialization: an update for a room nobody
        // joined yet must still apply
        let engine = engine();
        let doc = Uuid::new_v4();

        let mut source = Room::new(Uuid::new_v4());
        source.seed(r#"{"blocks":["hello"]}"#);
        let update = source.state_as_update();

        engine
            .apply_update(doc, Uuid::new_v4(), &update)
            .await
            .unwrap();
        assert_eq!(engine.room_count().await, 1);
        assert_eq!(
            engine.current_content(doc).await.as_deref(),
            Some(r#"{"blocks":["hello"]}"#)
        );
    }

    #[tokio::test]
    async fn test_garbage_update_is_rejected_room_stays() {
        let engine = engine();
        let doc = Uuid::new_v4();
        engine.join(doc, Uuid::new_v4(), "a", Uuid::new_v4()).await.unwrap();

        let err = engine
            .apply_update(doc, Uuid::new_v4(), &[1, 2, 3, 4])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert_eq!(engine.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_convergence_across_two_engines() {
        // same room, two replicas exchanging opaque updates converge
        let e1 = engine();
        let e2 = engine();
        let doc = Uuid::new_v4();

        let mut a = Room::new(doc);
        a.seed(r#"{"v":"from-a"}"#);
        let ua = a.state_as_update();

        e1.apply_update(doc, Uuid::new_v4(), &ua).await.unwrap();
        e2.apply_update(doc, Uuid::new_v4(), &ua).await.unwrap();

        assert_eq!(
            e1.current_content(doc).await,
            e2.current_content(doc).await
        );
    }

    #[tokio::test]
    async fn test_autosave_tick_only_flushes_content() {
        // the periodic tick persists the content blob and nothing else:
        // no room disposal, no ledger writes (snapshots are explicit,
        // see the docs socket's save_snapshot path)
        let engine = engine();
        let doc = Uuid::new_v4();
        engine.join(doc, Uuid::new_v4(), "a", Uuid::new_v4()).await.unwrap();

        let mut source = Room::new(doc);
        source.seed(r#"{"blocks":["draft"]}"#);
        engine
            .apply_update(doc, Uuid::new_v4(), &source.state_as_update())
            .await
            .unwrap();

        engine.autosave_tick().await;
        engine.autosave_tick().await;

        assert_eq!(engine.room_count().await, 1);
        assert_eq!(
            engine.current_content(doc).await.as_deref(),
            Some(r#"{"blocks":["draft"]}"#)
        );
    }

    #[tokio::test]
    async fn test_cursor_update_on_absent_room() {
        let engine = engine();
        assert!(
            !engine
                .cursor_update(Uuid::new_v4(), Uuid::new_v4(), serde_json::json!({}))
                .await
        );
    }

    #[tokio::test]
    async fn test_presence_throttle_window() {
        let engine = CollabEngine::new(
            None,
            CollabConfig {
                presence_throttle: Duration::from_secs(60),
                ..CollabConfig::default()
            },
        );
        let doc = Uuid::new_v4();
        let actor = Uuid::new_v4();

        // first mark admits, second within the window is throttled
        let mut marks = engine.presence_marks.lock().await;
        marks.insert((doc, actor), Instant::now());
        let throttled = marks
            .get(&(doc, actor))
            .map(|last| last.elapsed() < engine.config.presence_throttle)
            .unwrap_or(false);
        assert!(throttled);
    }
}
