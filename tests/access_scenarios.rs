//! Workspace access scenarios: role resolution across documents,
//! explicit grants, legacy spellings, and the folder fallback chain.

use coscribe::access::{
    resolve_document_role, resolve_folder_role, AccessEntry, AccessRole, DocumentAccessView,
    FolderAccessView,
};
use uuid::Uuid;

fn entry(user_id: Uuid, access: Option<&str>) -> AccessEntry {
    AccessEntry {
        user_id,
        access: access.map(str::to_string),
    }
}

#[test]
fn owner_always_edits_even_with_a_view_entry() {
    let owner = Uuid::new_v4();
    let doc = DocumentAccessView {
        created_by: owner,
        default_access: "view".to_string(),
        entries: vec![entry(owner, Some("view"))],
        folder: None,
    };
    assert_eq!(resolve_document_role(&doc, owner), AccessRole::Edit);
}

#[test]
fn stranger_resolves_to_none() {
    let doc = DocumentAccessView {
        created_by: Uuid::new_v4(),
        default_access: "edit".to_string(),
        entries: vec![],
        folder: None,
    };
    assert_eq!(resolve_document_role(&doc, Uuid::new_v4()), AccessRole::None);
}

#[test]
fn legacy_document_spellings_read_as_edit() {
    let owner = Uuid::new_v4();
    let reader = Uuid::new_v4();
    for legacy in ["update", "comment"] {
        let doc = DocumentAccessView {
            created_by: owner,
            default_access: "view".to_string(),
            entries: vec![entry(reader, Some(legacy))],
            folder: None,
        };
        assert_eq!(
            resolve_document_role(&doc, reader),
            AccessRole::Edit,
            "legacy spelling {legacy} should normalize to edit"
        );
    }
}

#[test]
fn null_entry_inherits_default_access() {
    let owner = Uuid::new_v4();
    let collaborator = Uuid::new_v4();
    let doc = DocumentAccessView {
        created_by: owner,
        default_access: "edit".to_string(),
        entries: vec![entry(collaborator, None)],
        folder: None,
    };
    assert_eq!(resolve_document_role(&doc, collaborator), AccessRole::Edit);

    let doc = DocumentAccessView {
        default_access: "view".to_string(),
        ..doc
    };
    assert_eq!(resolve_document_role(&doc, collaborator), AccessRole::View);
}

#[test]
fn document_falls_back_to_folder_grant() {
    let doc_owner = Uuid::new_v4();
    let folder_owner = Uuid::new_v4();
    let via_folder = Uuid::new_v4();

    let doc = DocumentAccessView {
        created_by: doc_owner,
        default_access: "view".to_string(),
        entries: vec![],
        folder: Some(FolderAccessView {
            owner_id: folder_owner,
            entries: vec![entry(via_folder, Some("update"))],
        }),
    };

    // folder spells edit as `update`
    assert_eq!(resolve_document_role(&doc, via_folder), AccessRole::Edit);
    // folder owner edits documents inside their folder
    assert_eq!(resolve_document_role(&doc, folder_owner), AccessRole::Edit);
}

#[test]
fn explicit_document_entry_beats_folder_fallback() {
    let user = Uuid::new_v4();
    let doc = DocumentAccessView {
        created_by: Uuid::new_v4(),
        default_access: "view".to_string(),
        entries: vec![entry(user, Some("view"))],
        folder: Some(FolderAccessView {
            owner_id: Uuid::new_v4(),
            entries: vec![entry(user, Some("update"))],
        }),
    };
    // the per-document grant wins over the broader folder grant
    assert_eq!(resolve_document_role(&doc, user), AccessRole::View);
}

#[test]
fn folder_collaborator_without_role_gets_view() {
    let user = Uuid::new_v4();
    let folder = FolderAccessView {
        owner_id: Uuid::new_v4(),
        entries: vec![entry(user, None)],
    };
    assert_eq!(resolve_folder_role(&folder, user), AccessRole::View);
}
