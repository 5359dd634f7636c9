//! Store-level counter and retention behavior against a live database.
//!
//! These run against the database named by `DATABASE_URL` with the
//! migrations applied; they are ignored by default so the unit suite
//! stays self-contained. Run with `cargo test -- --ignored`.

use coscribe::shares::invite_by_email;
use coscribe::store::documents::{create_document, get_document_by_id, track_view};
use coscribe::store::users::{create_user, User};
use coscribe::versioning::{cleanup_old_versions, create_version, remove_version};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a migrated database");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("database connection")
}

async fn user(pool: &PgPool, first_name: &str) -> User {
    let email = format!("{first_name}-{}@example.test", Uuid::new_v4());
    create_user(pool, first_name, "Tester", &email, "not-a-real-hash")
        .await
        .expect("create user")
}

#[tokio::test]
#[ignore = "requires a postgres database (DATABASE_URL)"]
async fn view_count_tracks_unique_viewers() {
    let pool = pool().await;
    let owner = user(&pool, "owner").await;
    let visitor = user(&pool, "visitor").await;
    let doc = create_document(&pool, "notes", None, owner.id).await.unwrap();

    // repeat visits by the same viewer count once
    track_view(&pool, doc.id, visitor.id).await.unwrap();
    track_view(&pool, doc.id, visitor.id).await.unwrap();
    track_view(&pool, doc.id, owner.id).await.unwrap();

    let doc = get_document_by_id(&pool, doc.id).await.unwrap().unwrap();
    assert_eq!(doc.view_count, 2);
    assert_eq!(doc.viewed_by.len(), 2);
    assert!(doc.last_viewed_at.is_some());
}

#[tokio::test]
#[ignore = "requires a postgres database (DATABASE_URL)"]
async fn email_invite_counts_as_a_share() {
    let pool = pool().await;
    let owner = user(&pool, "owner").await;
    let invitee = user(&pool, "invitee").await;
    let doc = create_document(&pool, "shared notes", None, owner.id).await.unwrap();

    invite_by_email(
        &pool,
        owner.id,
        false,
        "http://localhost:3000",
        "document",
        doc.id,
        &invitee.email,
        "view",
    )
    .await
    .unwrap();

    let doc = get_document_by_id(&pool, doc.id).await.unwrap().unwrap();
    assert_eq!(doc.share_count, 1);
}

#[tokio::test]
#[ignore = "requires a postgres database (DATABASE_URL)"]
async fn retention_ages_out_soft_deleted_snapshots() {
    let pool = pool().await;
    let owner = user(&pool, "owner").await;
    let doc = create_document(&pool, "versioned", None, owner.id).await.unwrap();

    let mut snapshots = Vec::new();
    for i in 0..5 {
        let snapshot = create_version(&pool, doc.id, &format!("draft {i}"), owner.id, None)
            .await
            .unwrap();
        snapshots.push(snapshot);
    }

    // tombstone the oldest, then retain the three newest
    remove_version(&pool, snapshots[0].id, owner.id).await.unwrap();
    cleanup_old_versions(&pool, doc.id, 3).await.unwrap();

    // the tombstoned row is gone from the table, not just hidden
    let row = sqlx::query("SELECT COUNT(*) AS count FROM document_versions WHERE document_id = $1")
        .bind(doc.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("count"), 3);

    let doc = get_document_by_id(&pool, doc.id).await.unwrap().unwrap();
    assert_eq!(doc.previous_versions.len(), 3);
    assert!(!doc.previous_versions.contains(&snapshots[0].id));
    assert!(!doc.previous_versions.contains(&snapshots[1].id));
}
