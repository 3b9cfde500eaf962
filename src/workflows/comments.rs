use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::WorkflowContext;
use crate::domain::{Comment, CommentOrigin, UserId};
use crate::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub origin: CommentOrigin,
    pub origin_id: u64,
    pub body: String,
}

/// Free-text comment threads keyed by origin kind and id
#[derive(Clone)]
pub struct CommentThread {
    ctx: WorkflowContext,
}

impl CommentThread {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    async fn origin_exists(&self, origin: CommentOrigin, id: u64) -> WorkflowResult<bool> {
        let store = &self.ctx.store;
        let exists = match origin {
            CommentOrigin::Request => store.get_request(id).await?.is_some(),
            CommentOrigin::Justification => store.get_justification(id).await?.is_some(),
            CommentOrigin::Sufficiency => store.get_sufficiency(id).await?.is_some(),
            CommentOrigin::Document => store.get_supporting_document(id).await?.is_some(),
            CommentOrigin::Agenda => store.get_agenda(id).await?.is_some(),
            CommentOrigin::Minutes => store.get_minutes(id).await?.is_some(),
        };
        Ok(exists)
    }

    pub async fn add(&self, author_id: UserId, new: NewComment) -> WorkflowResult<Comment> {
        if new.body.trim().is_empty() {
            return Err(WorkflowError::Validation("comment body must not be empty".to_string()));
        }
        if !self.origin_exists(new.origin, new.origin_id).await? {
            return Err(WorkflowError::not_found("comment origin", format!("{:?} {}", new.origin, new.origin_id)));
        }

        let comment = self
            .ctx
            .store
            .insert_comment(Comment {
                id: 0,
                origin: new.origin,
                origin_id: new.origin_id,
                author_id,
                body: new.body,
                created_at: Utc::now(),
            })
            .await?;

        debug!(comment_id = comment.id, origin = ?comment.origin, origin_id = comment.origin_id, "Comment added");
        Ok(comment)
    }

    pub async fn list(&self, origin: CommentOrigin, origin_id: u64) -> WorkflowResult<Vec<Comment>> {
        Ok(self.ctx.store.list_comments(origin, origin_id).await?)
    }
}
