use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CommentEnvelope, CommentList, CommentListQuery, CommentResponse, CreateCommentRequest,
    ThreadResponse, UpdateCommentRequest,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    domain::{build_threads, Comment, CurrentUser, NewComment},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    rate_limit::ClientIp,
    state::AppState,
};

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/projects/:project_id", get(project_comments))
        .route("/comments/users/:user_id", get(user_comments))
        .route("/comments/:id", put(update_comment).delete(delete_comment))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

async fn threaded(
    state: &AppState,
    project_id: Uuid,
) -> Result<CommentList<ThreadResponse>, AppError> {
    if state.projects.find_by_id(project_id).await?.is_none() {
        return Err(AppError::not_found("Project does not exist"));
    }
    let comments = state.comments.list_by_project(project_id).await?;
    let count = comments.len();
    let comments = build_threads(comments)
        .into_iter()
        .map(ThreadResponse::from)
        .collect();
    Ok(CommentList { comments, count })
}

/// Loads the comment and its project and checks the caller may moderate it.
async fn load_moderated_comment(
    state: &AppState,
    caller: &CurrentUser,
    id: Uuid,
) -> Result<Comment, AppError> {
    let comment = state
        .comments
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment does not exist"))?;
    let project = state
        .projects
        .find_by_id(comment.project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project does not exist"))?;

    if !caller.can_moderate_comment(&comment, &project) {
        warn!(comment_id = %id, caller = %caller.id, "comment moderation refused");
        return Err(AppError::forbidden(
            "You can only modify your own comments",
        ));
    }
    Ok(comment)
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CommentListQuery>,
) -> Result<Json<CommentList<ThreadResponse>>, AppError> {
    let project_id = query
        .project_id
        .ok_or_else(|| AppError::validation("projectId query parameter is required"))?;
    Ok(Json(threaded(&state, project_id).await?))
}

#[instrument(skip(state))]
pub async fn project_comments(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<CommentList<ThreadResponse>>, AppError> {
    Ok(Json(threaded(&state, project_id).await?))
}

#[instrument(skip_all, fields(caller = %caller.id, user_id = %user_id))]
pub async fn user_comments(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<CommentList<CommentResponse>>, AppError> {
    if !caller.can_view_account(user_id) {
        return Err(AppError::forbidden("You can only view your own comments"));
    }
    let comments: Vec<CommentResponse> = state
        .comments
        .list_by_user(user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(CommentList {
        count: comments.len(),
        comments,
    }))
}

#[instrument(skip_all, fields(client = %ip))]
pub async fn create_comment(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    ClientIp(ip): ClientIp,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentEnvelope>), AppError> {
    // Only guests are throttled, and every guest attempt counts.
    if caller.is_none() && !state.comment_limiter.allow(&ip).await {
        warn!("anonymous comment rate limit hit");
        return Err(AppError::RateLimited(
            "Too many comments from this address, please try again later".into(),
        ));
    }

    let (Some(project_id), Some(content)) = (payload.project_id, non_blank(payload.content))
    else {
        return Err(AppError::validation("Project ID and content are required"));
    };

    let (user_id, user_name) = match &caller {
        Some(user) => {
            let name = if user.name.trim().is_empty() {
                user.email.clone()
            } else {
                user.name.clone()
            };
            (Some(user.id), name)
        }
        None => match non_blank(payload.user_name) {
            Some(name) => (None, name),
            None => {
                return Err(AppError::validation(
                    "Name is required for public comments",
                ))
            }
        },
    };

    if state.projects.find_by_id(project_id).await?.is_none() {
        return Err(AppError::not_found("Project does not exist"));
    }
    if let Some(parent_id) = payload.parent_id {
        match state.comments.find_by_id(parent_id).await? {
            Some(parent) if parent.project_id == project_id => {}
            _ => {
                return Err(AppError::validation(
                    "Parent comment does not exist on this project",
                ))
            }
        }
    }

    let comment = state
        .comments
        .create(NewComment {
            project_id,
            user_id,
            user_name,
            content,
            parent_id: payload.parent_id,
        })
        .await?;
    info!(
        comment_id = %comment.id,
        project_id = %project_id,
        anonymous = user_id.is_none(),
        "comment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CommentEnvelope {
            message: "Comment created successfully",
            comment: comment.into(),
        }),
    ))
}

#[instrument(skip_all, fields(caller = %caller.id, comment_id = %id))]
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCommentRequest>,
) -> Result<Json<CommentEnvelope>, AppError> {
    load_moderated_comment(&state, &caller, id).await?;
    let content =
        non_blank(payload.content).ok_or_else(|| AppError::validation("Content is required"))?;

    let comment = state.comments.update_content(id, &content).await?;
    info!("comment updated");
    Ok(Json(CommentEnvelope {
        message: "Comment updated successfully",
        comment: comment.into(),
    }))
}

#[instrument(skip_all, fields(caller = %caller.id, comment_id = %id))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_moderated_comment(&state, &caller, id).await?;
    if !state.comments.delete(id).await? {
        return Err(AppError::not_found("Comment does not exist"));
    }
    info!("comment deleted");
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
