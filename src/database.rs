#[cfg(feature = "database")]
pub use sqlite::DatabaseManager;

#[cfg(feature = "database")]
mod sqlite {
    use anyhow::Result;
    use async_trait::async_trait;
    use serde::{de::DeserializeOwned, Serialize};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
    use tracing::info;

    use crate::domain::*;
    use crate::store::*;

    // Record kinds; every entity row is its JSON body plus the lookup keys
    const USER: &str = "user";
    const REQUEST: &str = "request";
    const JUSTIFICATION: &str = "justification";
    const JUSTIFICATION_DOCUMENT: &str = "justification_document";
    const SUFFICIENCY: &str = "sufficiency";
    const SUFFICIENCY_DOCUMENT: &str = "sufficiency_document";
    const SUPPORTING_DOCUMENT: &str = "supporting_document";
    const AGENDA: &str = "agenda";
    const PARTICIPANT: &str = "agenda_participant";
    const MINUTES: &str = "minutes";
    const ATTENDEE: &str = "minutes_attendee";
    const NOTIFICATION: &str = "notification";
    const COMMENT: &str = "comment";
    const PENDING_DELETION: &str = "pending_blob_deletion";

    /// SQLite-backed workflow store
    pub struct DatabaseManager {
        pool: SqlitePool,
    }

    impl DatabaseManager {
        /// Initialize database with automatic migrations
        pub async fn new(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
            if !sqlx::Sqlite::database_exists(database_url).await? {
                info!("Creating database at {}", database_url);
                sqlx::Sqlite::create_database(database_url).await?;
            }

            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(database_url)
                .await?;

            if auto_migrate {
                info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!("Database migrations completed");
            }

            Ok(Self { pool })
        }

        pub fn pool(&self) -> &SqlitePool {
            &self.pool
        }

        /// Close database connections gracefully
        pub async fn shutdown(&self) {
            info!("Shutting down database connections...");
            self.pool.close().await;
            info!("Database connections closed");
        }

        async fn next_id(&self) -> StoreResult<u64> {
            let result = sqlx::query("INSERT INTO id_sequence DEFAULT VALUES")
                .execute(&self.pool)
                .await?;
            Ok(result.last_insert_rowid() as u64)
        }

        async fn put<T: Serialize>(&self, kind: &str, parent_id: u64, id: u64, body: &T) -> StoreResult<()> {
            let body = serde_json::to_string(body)?;
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO records (kind, parent_id, id, body, updated_at)
                VALUES (?1, ?2, ?3, ?4, datetime('now'))
                "#,
            )
            .bind(kind)
            .bind(parent_id as i64)
            .bind(id as i64)
            .bind(body)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get<T: DeserializeOwned>(&self, kind: &str, id: u64) -> StoreResult<Option<T>> {
            let row = sqlx::query("SELECT body FROM records WHERE kind = ?1 AND id = ?2 LIMIT 1")
                .bind(kind)
                .bind(id as i64)
                .fetch_optional(&self.pool)
                .await?;
            row.map(|r| decode(r.get("body"))).transpose()
        }

        async fn get_child<T: DeserializeOwned>(&self, kind: &str, parent_id: u64, id: u64) -> StoreResult<Option<T>> {
            let row = sqlx::query("SELECT body FROM records WHERE kind = ?1 AND parent_id = ?2 AND id = ?3")
                .bind(kind)
                .bind(parent_id as i64)
                .bind(id as i64)
                .fetch_optional(&self.pool)
                .await?;
            row.map(|r| decode(r.get("body"))).transpose()
        }

        async fn list<T: DeserializeOwned>(&self, kind: &str) -> StoreResult<Vec<T>> {
            let rows = sqlx::query("SELECT body FROM records WHERE kind = ?1 ORDER BY id ASC")
                .bind(kind)
                .fetch_all(&self.pool)
                .await?;
            rows.into_iter().map(|r| decode(r.get("body"))).collect()
        }

        async fn list_children<T: DeserializeOwned>(&self, kind: &str, parent_id: u64) -> StoreResult<Vec<T>> {
            let rows = sqlx::query("SELECT body FROM records WHERE kind = ?1 AND parent_id = ?2 ORDER BY id ASC")
                .bind(kind)
                .bind(parent_id as i64)
                .fetch_all(&self.pool)
                .await?;
            rows.into_iter().map(|r| decode(r.get("body"))).collect()
        }

        /// Rows of `kind` whose own id is `id`, across parents
        async fn list_by_id<T: DeserializeOwned>(&self, kind: &str, id: u64) -> StoreResult<Vec<T>> {
            let rows = sqlx::query("SELECT body FROM records WHERE kind = ?1 AND id = ?2 ORDER BY parent_id ASC")
                .bind(kind)
                .bind(id as i64)
                .fetch_all(&self.pool)
                .await?;
            rows.into_iter().map(|r| decode(r.get("body"))).collect()
        }

        async fn delete(&self, kind: &str, id: u64) -> StoreResult<bool> {
            let result = sqlx::query("DELETE FROM records WHERE kind = ?1 AND id = ?2")
                .bind(kind)
                .bind(id as i64)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn delete_children(&self, kind: &str, parent_id: u64) -> StoreResult<usize> {
            let result = sqlx::query("DELETE FROM records WHERE kind = ?1 AND parent_id = ?2")
                .bind(kind)
                .bind(parent_id as i64)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() as usize)
        }
    }

    fn decode<T: DeserializeOwned>(body: String) -> StoreResult<T> {
        Ok(serde_json::from_str(&body)?)
    }

    #[async_trait]
    impl UserStore for DatabaseManager {
        async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
            self.get(USER, id).await
        }

        async fn upsert_user(&self, user: User) -> StoreResult<()> {
            self.put(USER, 0, user.id, &user).await
        }
    }

    #[async_trait]
    impl RequestStore for DatabaseManager {
        async fn insert_request(&self, mut request: Request) -> StoreResult<Request> {
            request.id = self.next_id().await?;
            self.put(REQUEST, request.department_id, request.id, &request).await?;
            Ok(request)
        }

        async fn get_request(&self, id: RequestId) -> StoreResult<Option<Request>> {
            self.get(REQUEST, id).await
        }

        async fn update_request(&self, request: &Request) -> StoreResult<()> {
            self.put(REQUEST, request.department_id, request.id, request).await
        }

        async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<Request>> {
            let requests: Vec<Request> = match filter.department_id {
                Some(department_id) => self.list_children(REQUEST, department_id).await?,
                None => self.list(REQUEST).await?,
            };
            Ok(requests.into_iter().filter(|r| filter.matches(r)).collect())
        }
    }

    #[async_trait]
    impl JustificationStore for DatabaseManager {
        async fn insert_justification(&self, mut justification: Justification) -> StoreResult<Justification> {
            justification.id = self.next_id().await?;
            self.put(JUSTIFICATION, justification.request_id, justification.id, &justification)
                .await?;
            Ok(justification)
        }

        async fn get_justification(&self, id: JustificationId) -> StoreResult<Option<Justification>> {
            self.get(JUSTIFICATION, id).await
        }

        async fn get_justification_by_request(&self, request_id: RequestId) -> StoreResult<Option<Justification>> {
            let mut found: Vec<Justification> = self.list_children(JUSTIFICATION, request_id).await?;
            Ok(if found.is_empty() { None } else { Some(found.remove(0)) })
        }

        async fn update_justification(&self, justification: &Justification) -> StoreResult<()> {
            self.put(JUSTIFICATION, justification.request_id, justification.id, justification)
                .await
        }

        async fn insert_justification_document(&self, mut doc: JustificationDocument) -> StoreResult<JustificationDocument> {
            doc.id = self.next_id().await?;
            self.put(JUSTIFICATION_DOCUMENT, doc.justification_id, doc.id, &doc).await?;
            Ok(doc)
        }

        async fn get_justification_document(&self, id: DocumentId) -> StoreResult<Option<JustificationDocument>> {
            self.get(JUSTIFICATION_DOCUMENT, id).await
        }

        async fn list_justification_documents(&self, justification_id: JustificationId) -> StoreResult<Vec<JustificationDocument>> {
            self.list_children(JUSTIFICATION_DOCUMENT, justification_id).await
        }

        async fn delete_justification_document(&self, id: DocumentId) -> StoreResult<bool> {
            self.delete(JUSTIFICATION_DOCUMENT, id).await
        }
    }

    #[async_trait]
    impl SufficiencyStore for DatabaseManager {
        async fn insert_sufficiency(&self, mut record: BudgetSufficiencyRequest) -> StoreResult<BudgetSufficiencyRequest> {
            record.id = self.next_id().await?;
            self.put(SUFFICIENCY, record.request_id, record.id, &record).await?;
            Ok(record)
        }

        async fn get_sufficiency(&self, id: SufficiencyId) -> StoreResult<Option<BudgetSufficiencyRequest>> {
            self.get(SUFFICIENCY, id).await
        }

        async fn find_sufficiency(&self, request_id: RequestId, kind: SufficiencyKind) -> StoreResult<Option<BudgetSufficiencyRequest>> {
            let records: Vec<BudgetSufficiencyRequest> = self.list_children(SUFFICIENCY, request_id).await?;
            Ok(records.into_iter().find(|r| r.kind == kind))
        }

        async fn list_sufficiencies(&self, request_id: RequestId) -> StoreResult<Vec<BudgetSufficiencyRequest>> {
            self.list_children(SUFFICIENCY, request_id).await
        }

        async fn update_sufficiency(&self, record: &BudgetSufficiencyRequest) -> StoreResult<()> {
            self.put(SUFFICIENCY, record.request_id, record.id, record).await
        }

        async fn insert_sufficiency_document(&self, mut doc: SufficiencyDocument) -> StoreResult<SufficiencyDocument> {
            doc.id = self.next_id().await?;
            self.put(SUFFICIENCY_DOCUMENT, doc.sufficiency_id, doc.id, &doc).await?;
            Ok(doc)
        }

        async fn list_sufficiency_documents(&self, sufficiency_id: SufficiencyId) -> StoreResult<Vec<SufficiencyDocument>> {
            self.list_children(SUFFICIENCY_DOCUMENT, sufficiency_id).await
        }
    }

    #[async_trait]
    impl SupportingDocumentStore for DatabaseManager {
        async fn insert_supporting_document(&self, mut doc: SupportingDocument) -> StoreResult<SupportingDocument> {
            doc.id = self.next_id().await?;
            self.put(SUPPORTING_DOCUMENT, doc.request_id, doc.id, &doc).await?;
            Ok(doc)
        }

        async fn get_supporting_document(&self, id: DocumentId) -> StoreResult<Option<SupportingDocument>> {
            self.get(SUPPORTING_DOCUMENT, id).await
        }

        async fn list_supporting_documents(&self, request_id: RequestId) -> StoreResult<Vec<SupportingDocument>> {
            self.list_children(SUPPORTING_DOCUMENT, request_id).await
        }

        async fn update_supporting_document(&self, doc: &SupportingDocument) -> StoreResult<()> {
            self.put(SUPPORTING_DOCUMENT, doc.request_id, doc.id, doc).await
        }

        async fn delete_supporting_document(&self, id: DocumentId) -> StoreResult<bool> {
            self.delete(SUPPORTING_DOCUMENT, id).await
        }
    }

    #[async_trait]
    impl AgendaStore for DatabaseManager {
        async fn insert_agenda(&self, mut agenda: Agenda) -> StoreResult<Agenda> {
            agenda.id = self.next_id().await?;
            self.put(AGENDA, agenda.request_id, agenda.id, &agenda).await?;
            Ok(agenda)
        }

        async fn get_agenda(&self, id: AgendaId) -> StoreResult<Option<Agenda>> {
            self.get(AGENDA, id).await
        }

        async fn list_agendas(&self) -> StoreResult<Vec<Agenda>> {
            self.list(AGENDA).await
        }

        async fn list_agendas_for_request(&self, request_id: RequestId) -> StoreResult<Vec<Agenda>> {
            self.list_children(AGENDA, request_id).await
        }

        async fn update_agenda(&self, agenda: &Agenda) -> StoreResult<()> {
            self.put(AGENDA, agenda.request_id, agenda.id, agenda).await
        }

        async fn get_participant(&self, agenda_id: AgendaId, user_id: UserId) -> StoreResult<Option<AgendaParticipant>> {
            self.get_child(PARTICIPANT, agenda_id, user_id).await
        }

        async fn list_participants(&self, agenda_id: AgendaId) -> StoreResult<Vec<AgendaParticipant>> {
            self.list_children(PARTICIPANT, agenda_id).await
        }

        async fn list_participations(&self, user_id: UserId) -> StoreResult<Vec<AgendaParticipant>> {
            self.list_by_id(PARTICIPANT, user_id).await
        }

        async fn upsert_participant(&self, participant: &AgendaParticipant) -> StoreResult<()> {
            self.put(PARTICIPANT, participant.agenda_id, participant.user_id, participant)
                .await
        }

        async fn delete_participants(&self, agenda_id: AgendaId) -> StoreResult<usize> {
            self.delete_children(PARTICIPANT, agenda_id).await
        }
    }

    #[async_trait]
    impl MinutesStore for DatabaseManager {
        async fn insert_minutes(&self, mut minutes: Minutes) -> StoreResult<Minutes> {
            minutes.id = self.next_id().await?;
            self.put(MINUTES, minutes.agenda_id, minutes.id, &minutes).await?;
            Ok(minutes)
        }

        async fn get_minutes(&self, id: MinutesId) -> StoreResult<Option<Minutes>> {
            self.get(MINUTES, id).await
        }

        async fn get_minutes_by_agenda(&self, agenda_id: AgendaId) -> StoreResult<Option<Minutes>> {
            let mut found: Vec<Minutes> = self.list_children(MINUTES, agenda_id).await?;
            Ok(if found.is_empty() { None } else { Some(found.remove(0)) })
        }

        async fn update_minutes(&self, minutes: &Minutes) -> StoreResult<()> {
            self.put(MINUTES, minutes.agenda_id, minutes.id, minutes).await
        }

        async fn get_attendee(&self, minutes_id: MinutesId, user_id: UserId) -> StoreResult<Option<MinutesAttendee>> {
            self.get_child(ATTENDEE, minutes_id, user_id).await
        }

        async fn list_attendees(&self, minutes_id: MinutesId) -> StoreResult<Vec<MinutesAttendee>> {
            self.list_children(ATTENDEE, minutes_id).await
        }

        async fn upsert_attendee(&self, attendee: &MinutesAttendee) -> StoreResult<()> {
            self.put(ATTENDEE, attendee.minutes_id, attendee.user_id, attendee).await
        }
    }

    #[async_trait]
    impl NotificationStore for DatabaseManager {
        async fn insert_notification(&self, mut notification: Notification) -> StoreResult<Notification> {
            notification.id = self.next_id().await?;
            self.put(NOTIFICATION, 0, notification.id, &notification).await?;
            Ok(notification)
        }

        async fn get_notification(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
            self.get(NOTIFICATION, id).await
        }

        async fn update_notification(&self, notification: &Notification) -> StoreResult<()> {
            self.put(NOTIFICATION, 0, notification.id, notification).await
        }

        async fn list_undelivered(&self, max_attempts: u32, limit: usize) -> StoreResult<Vec<Notification>> {
            let notifications: Vec<Notification> = self.list(NOTIFICATION).await?;
            Ok(notifications
                .into_iter()
                .filter(|n| n.delivered_at.is_none() && n.attempts < max_attempts)
                .take(limit)
                .collect())
        }

        async fn list_notifications(&self) -> StoreResult<Vec<Notification>> {
            self.list(NOTIFICATION).await
        }
    }

    #[async_trait]
    impl CommentStore for DatabaseManager {
        async fn insert_comment(&self, mut comment: Comment) -> StoreResult<Comment> {
            comment.id = self.next_id().await?;
            self.put(COMMENT, comment.origin_id, comment.id, &comment).await?;
            Ok(comment)
        }

        async fn list_comments(&self, origin: CommentOrigin, origin_id: u64) -> StoreResult<Vec<Comment>> {
            let comments: Vec<Comment> = self.list_children(COMMENT, origin_id).await?;
            Ok(comments.into_iter().filter(|c| c.origin == origin).collect())
        }
    }

    #[async_trait]
    impl BlobDeletionStore for DatabaseManager {
        async fn insert_pending_deletion(&self, mut pending: PendingBlobDeletion) -> StoreResult<PendingBlobDeletion> {
            pending.id = self.next_id().await?;
            self.put(PENDING_DELETION, 0, pending.id, &pending).await?;
            Ok(pending)
        }

        async fn list_pending_deletions(&self, limit: usize) -> StoreResult<Vec<PendingBlobDeletion>> {
            let pending: Vec<PendingBlobDeletion> = self.list(PENDING_DELETION).await?;
            Ok(pending.into_iter().take(limit).collect())
        }

        async fn update_pending_deletion(&self, pending: &PendingBlobDeletion) -> StoreResult<()> {
            self.put(PENDING_DELETION, 0, pending.id, pending).await
        }

        async fn delete_pending_deletion(&self, id: u64) -> StoreResult<bool> {
            self.delete(PENDING_DELETION, id).await
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::Utc;
        use rust_decimal::Decimal;

        async fn open() -> (tempfile::TempDir, DatabaseManager) {
            let dir = tempfile::TempDir::new().unwrap();
            let url = format!("sqlite://{}", dir.path().join("committee.db").display());
            let db = DatabaseManager::new(&url, 2, true).await.unwrap();
            (dir, db)
        }

        #[tokio::test]
        async fn test_ids_are_shared_across_kinds() {
            let (_dir, db) = open().await;
            let request = db
                .insert_request(Request {
                    id: 0,
                    folio: "F-9".to_string(),
                    requester_id: 1,
                    department_id: 4,
                    amount: Decimal::new(1000, 0),
                    acquisition_type_id: 2,
                    motive: "Equipo".to_string(),
                    status: RequestStatus::Pending,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
            let comment = db
                .insert_comment(Comment {
                    id: 0,
                    origin: CommentOrigin::Request,
                    origin_id: request.id,
                    author_id: 1,
                    body: "Revisar".to_string(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();

            assert_ne!(request.id, comment.id);
            assert_eq!(db.get_request(request.id).await.unwrap(), Some(request.clone()));
            assert_eq!(db.list_comments(CommentOrigin::Request, request.id).await.unwrap().len(), 1);
            assert!(db.list_comments(CommentOrigin::Agenda, request.id).await.unwrap().is_empty());

            let filter = RequestFilter {
                department_id: Some(5),
                bucket: None,
            };
            assert!(db.list_requests(&filter).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_participants_keyed_by_agenda_and_user() {
            let (_dir, db) = open().await;
            for agenda_id in [100, 200] {
                db.upsert_participant(&AgendaParticipant::new(agenda_id, 7, Roster::Base))
                    .await
                    .unwrap();
            }

            assert_eq!(db.list_participations(7).await.unwrap().len(), 2);
            assert_eq!(db.delete_participants(100).await.unwrap(), 1);
            assert!(db.get_participant(100, 7).await.unwrap().is_none());
            assert!(db.get_participant(200, 7).await.unwrap().is_some());
        }
    }
}

/// Open the configured SQLite store, if one is configured
#[cfg(feature = "database")]
pub async fn init_database(config: &crate::config::CommitteeConfig) -> anyhow::Result<Option<DatabaseManager>> {
    match &config.database {
        Some(db_config) => {
            tracing::info!("Initializing database at {}", db_config.url);
            let manager = DatabaseManager::new(&db_config.url, db_config.max_connections, db_config.auto_migrate).await?;
            tracing::info!("Database manager initialized successfully");
            Ok(Some(manager))
        }
        None => {
            tracing::info!("Database not configured, using in-memory store");
            Ok(None)
        }
    }
}
