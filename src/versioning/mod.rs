//! Version ledger
//!
//! Snapshot creation, restore, and retention over the store. Version
//! numbers come from the document's atomic counter, so snapshots are
//! dense and strictly increasing per document and the document's
//! `version` is always ≥ the highest snapshot number.

use crate::error::{AppError, AppResult};
use crate::store::content::{insert_content, latest_for_document};
use crate::store::documents::{bump_version, get_document_by_id, pull_previous_versions, push_previous_version};
use crate::store::versions::{
    get_version_by_id, insert_version, list_versions, prune_versions, soft_delete_version,
    DocumentVersion, VersionWithAuthor,
};
use sqlx::PgPool;
use uuid::Uuid;

pub const PRE_RESTORE_DESCRIPTION: &str = "Auto-saved before restore";
pub const AUTO_VERSION_DESCRIPTION: &str = "Auto-saved version";

/// Result of a restore: the reversibility snapshot plus the content now
/// current.
#[derive(Debug)]
pub struct RestoreOutcome {
    pub new_version: DocumentVersion,
    pub restored_content: String,
}

pub async fn get_versions(pool: &PgPool, document_id: Uuid) -> AppResult<Vec<VersionWithAuthor>> {
    get_document_by_id(pool, document_id)
        .await?
        .ok_or_else(|| AppError::not_found("document not found"))?;
    Ok(list_versions(pool, document_id).await?)
}

pub async fn get_version(pool: &PgPool, version_id: Uuid) -> AppResult<DocumentVersion> {
    get_version_by_id(pool, version_id)
        .await?
        .ok_or_else(|| AppError::not_found("version not found"))
}

/// Append a snapshot: bump the document's counter, record the snapshot
/// under the new number, and link its id into the document.
pub async fn create_version(
    pool: &PgPool,
    document_id: Uuid,
    content: &str,
    actor: Uuid,
    description: Option<&str>,
) -> AppResult<DocumentVersion> {
    let version = bump_version(pool, document_id).await?;
    let snapshot = insert_version(pool, document_id, version, content, actor, description).await?;
    push_previous_version(pool, document_id, snapshot.id).await?;
    Ok(snapshot)
}

/// Background-policy snapshot with the canonical auto-save description.
pub async fn create_auto_version(
    pool: &PgPool,
    document_id: Uuid,
    content: &str,
    actor: Uuid,
) -> AppResult<DocumentVersion> {
    create_version(pool, document_id, content, actor, Some(AUTO_VERSION_DESCRIPTION)).await
}

/// Restore a prior snapshot.
///
/// The current content is snapshotted first so restoration is always
/// reversible; the target's content is then written as a *new* content
/// blob row (the read path collapses the duplicate), making the restore
/// visible as a fresh content event.
pub async fn restore_version(
    pool: &PgPool,
    document_id: Uuid,
    version_id: Uuid,
    actor: Uuid,
    retention: usize,
) -> AppResult<RestoreOutcome> {
    let target = get_version_by_id(pool, version_id)
        .await?
        .ok_or_else(|| AppError::not_found("version not found"))?;
    if target.document_id != document_id {
        return Err(AppError::not_found("version not found"));
    }

    let current = latest_for_document(pool, document_id)
        .await?
        .map(|blob| blob.content)
        .unwrap_or_default();

    let pre_restore =
        create_version(pool, document_id, &current, actor, Some(PRE_RESTORE_DESCRIPTION)).await?;

    insert_content(pool, document_id, &target.content).await?;

    cleanup_old_versions(pool, document_id, retention).await?;

    Ok(RestoreOutcome {
        new_version: pre_restore,
        restored_content: target.content,
    })
}

/// Keep the most recent `retention` snapshots; hard-delete the tail and
/// pull the pruned ids out of the document.
pub async fn cleanup_old_versions(
    pool: &PgPool,
    document_id: Uuid,
    retention: usize,
) -> AppResult<usize> {
    let pruned = prune_versions(pool, document_id, retention as i64).await?;
    if !pruned.is_empty() {
        tracing::info!(
            document_id = %document_id,
            pruned = pruned.len(),
            "pruned old version snapshots"
        );
        pull_previous_versions(pool, document_id, &pruned).await?;
    }
    Ok(pruned.len())
}

/// Owner-initiated removal of a single snapshot; soft-deleted so the
/// ledger stays auditable.
pub async fn remove_version(
    pool: &PgPool,
    version_id: Uuid,
    actor: Uuid,
) -> AppResult<()> {
    get_version_by_id(pool, version_id)
        .await?
        .ok_or_else(|| AppError::not_found("version not found"))?;
    soft_delete_version(pool, version_id, actor).await?;
    Ok(())
}
