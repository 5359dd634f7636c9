//! Identity and authorization resolution
//!
//! Maps a caller to an effective role on a document or folder. Resolution
//! is pure over already-fetched rows so it can be tested without a store;
//! the async entry points in [`crate::store`] fetch and delegate here.
//!
//! Persisted access values keep their historical spellings (`update` for
//! full access on folders, occasionally `comment` as a document default).
//! Reads normalize both to `edit` for documents; storage is never
//! rewritten.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Effective role of a caller on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    None,
    View,
    Edit,
}

impl AccessRole {
    pub fn can_view(self) -> bool {
        self >= AccessRole::View
    }

    pub fn can_edit(self) -> bool {
        self == AccessRole::Edit
    }
}

/// Normalize a persisted document access value to an effective role.
///
/// `update` and `comment` are legacy spellings of full access on
/// documents.
pub fn normalize_document_access(raw: &str) -> AccessRole {
    match raw {
        "edit" | "update" | "comment" => AccessRole::Edit,
        "view" => AccessRole::View,
        _ => AccessRole::None,
    }
}

/// Normalize a persisted folder access value. Folders spell full access
/// as `update` internally.
pub fn normalize_folder_access(raw: &str) -> AccessRole {
    match raw {
        "edit" | "update" => AccessRole::Edit,
        "view" => AccessRole::View,
        _ => AccessRole::None,
    }
}

/// A collaborator entry on a document or folder. `access = None` means
/// the entry falls back to the resource's default access.
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub user_id: Uuid,
    pub access: Option<String>,
}

/// The document fields access resolution needs.
#[derive(Debug, Clone)]
pub struct DocumentAccessView {
    pub created_by: Uuid,
    pub default_access: String,
    pub entries: Vec<AccessEntry>,
    pub folder: Option<FolderAccessView>,
}

/// The folder fields access resolution needs.
#[derive(Debug, Clone)]
pub struct FolderAccessView {
    pub owner_id: Uuid,
    pub entries: Vec<AccessEntry>,
}

/// Resolve the caller's effective role on a folder.
///
/// Owner gets `edit`; a collaborator gets their stored role (normalized),
/// defaulting to `view` when the row carries no explicit access.
pub fn resolve_folder_role(folder: &FolderAccessView, user_id: Uuid) -> AccessRole {
    if folder.owner_id == user_id {
        return AccessRole::Edit;
    }
    for entry in &folder.entries {
        if entry.user_id == user_id {
            return match entry.access.as_deref() {
                Some(raw) => normalize_folder_access(raw),
                None => AccessRole::View,
            };
        }
    }
    AccessRole::None
}

/// Resolve the caller's effective role on a document.
///
/// Order: document owner, per-user override, collaborator default, then
/// the containing folder's role as a fallback. The folder owner keeps
/// edit on contained documents even without a document-level entry; that
/// matches the historical behavior and is relied upon by folder sharing.
pub fn resolve_document_role(doc: &DocumentAccessView, user_id: Uuid) -> AccessRole {
    if doc.created_by == user_id {
        return AccessRole::Edit;
    }

    for entry in &doc.entries {
        if entry.user_id == user_id {
            return match entry.access.as_deref() {
                Some(raw) => normalize_document_access(raw),
                None => normalize_document_access(&doc.default_access),
            };
        }
    }

    match &doc.folder {
        Some(folder) => resolve_folder_role(folder, user_id),
        None => AccessRole::None,
    }
}

/// Extract a folder id from the polymorphic folder reference.
///
/// Stored document rows carry the folder link either as a bare id string
/// or as an embedded object with an `id` (or legacy `_id`) field.
pub fn extract_folder_id(folder_ref: &Value) -> Option<Uuid> {
    match folder_ref {
        Value::String(s) => Uuid::parse_str(s).ok(),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uid() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn test_owner_gets_edit() {
        let owner = uid();
        let doc = DocumentAccessView {
            created_by: owner,
            default_access: "view".into(),
            entries: vec![],
            folder: None,
        };
        assert_eq!(resolve_document_role(&doc, owner), AccessRole::Edit);
    }

    #[test]
    fn test_legacy_update_and_comment_normalize_to_edit() {
        assert_eq!(normalize_document_access("update"), AccessRole::Edit);
        assert_eq!(normalize_document_access("comment"), AccessRole::Edit);
        assert_eq!(normalize_document_access("view"), AccessRole::View);
        assert_eq!(normalize_document_access("bogus"), AccessRole::None);
    }

    #[test]
    fn test_collaborator_without_override_gets_default() {
        let user = uid();
        let doc = DocumentAccessView {
            created_by: uid(),
            default_access: "comment".into(),
            entries: vec![AccessEntry { user_id: user, access: None }],
            folder: None,
        };
        // default "comment" normalizes to edit on documents
        assert_eq!(resolve_document_role(&doc, user), AccessRole::Edit);
    }

    #[test]
    fn test_per_user_override_beats_default() {
        let user = uid();
        let doc = DocumentAccessView {
            created_by: uid(),
            default_access: "edit".into(),
            entries: vec![AccessEntry { user_id: user, access: Some("view".into()) }],
            folder: None,
        };
        assert_eq!(resolve_document_role(&doc, user), AccessRole::View);
    }

    #[test]
    fn test_folder_fallback() {
        let user = uid();
        let folder_owner = uid();
        let doc = DocumentAccessView {
            created_by: uid(),
            default_access: "view".into(),
            entries: vec![],
            folder: Some(FolderAccessView {
                owner_id: folder_owner,
                entries: vec![AccessEntry { user_id: user, access: Some("update".into()) }],
            }),
        };
        assert_eq!(resolve_document_role(&doc, user), AccessRole::Edit);
        assert_eq!(resolve_document_role(&doc, folder_owner), AccessRole::Edit);
        assert_eq!(resolve_document_role(&doc, uid()), AccessRole::None);
    }

    #[test]
    fn test_folder_collaborator_without_role_gets_view() {
        let user = uid();
        let folder = FolderAccessView {
            owner_id: uid(),
            entries: vec![AccessEntry { user_id: user, access: None }],
        };
        assert_eq!(resolve_folder_role(&folder, user), AccessRole::View);
    }

    #[test]
    fn test_authorization_monotonicity_through_folder() {
        // edit on the folder implies at least view on contained documents
        let user = uid();
        let folder = FolderAccessView {
            owner_id: uid(),
            entries: vec![AccessEntry { user_id: user, access: Some("edit".into()) }],
        };
        assert!(resolve_folder_role(&folder, user).can_edit());
        let doc = DocumentAccessView {
            created_by: uid(),
            default_access: "view".into(),
            entries: vec![],
            folder: Some(folder),
        };
        assert!(resolve_document_role(&doc, user).can_view());
    }

    #[test]
    fn test_extract_folder_id_shapes() {
        let id = uid();
        assert_eq!(extract_folder_id(&json!(id.to_string())), Some(id));
        assert_eq!(extract_folder_id(&json!({"id": id.to_string()})), Some(id));
        assert_eq!(extract_folder_id(&json!({"_id": id.to_string()})), Some(id));
        assert_eq!(extract_folder_id(&json!({"name": "loose"})), None);
        assert_eq!(extract_folder_id(&json!(null)), None);
        assert_eq!(extract_folder_id(&json!("not-a-uuid")), None);
    }

    #[test]
    fn test_role_ordering() {
        assert!(AccessRole::Edit > AccessRole::View);
        assert!(AccessRole::View > AccessRole::None);
        assert!(AccessRole::View.can_view());
        assert!(!AccessRole::View.can_edit());
    }
}
