use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{Comment, CommentThread};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub project_id: Option<Uuid>,
    pub content: Option<String>,
    pub parent_id: Option<Uuid>,
    /// Only consulted for anonymous posters.
    pub user_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListQuery {
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub content: String,
    pub parent_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            project_id: c.project_id,
            user_id: c.user_id,
            user_name: c.user_name,
            content: c.content,
            parent_id: c.parent_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// A root comment with its flattened replies.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub replies: Vec<CommentResponse>,
}

impl From<CommentThread> for ThreadResponse {
    fn from(t: CommentThread) -> Self {
        Self {
            comment: t.root.into(),
            replies: t.replies.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentList<T> {
    pub comments: Vec<T>,
    /// Every comment in the list, replies included.
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CommentEnvelope {
    pub message: &'static str,
    pub comment: CommentResponse,
}
