use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{ProjectEnvelope, ProjectList, ProjectListQuery, ProjectResponse, SummaryResponse};
use crate::{
    auth::AuthUser,
    comments::dto::ThreadResponse,
    domain::{
        build_threads, Access, CurrentUser, NewProject, Project, ProjectFilter, ProjectInput,
        ProjectSummary, User,
    },
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/summary", get(project_summary))
        .route("/projects/staff/projects", get(my_projects))
        .route("/projects/staff/:staff_id/projects", get(staff_projects))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

async fn load_project(state: &AppState, id: Uuid) -> Result<Project, AppError> {
    state
        .projects
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Project does not exist"))
}

/// Loads the project and checks the caller may change it.
async fn load_managed_project(
    state: &AppState,
    caller: &CurrentUser,
    id: Uuid,
) -> Result<Project, AppError> {
    caller.require(Access::StaffOrAdmin)?;
    let project = load_project(state, id).await?;
    if !caller.can_manage_project(&project) {
        warn!(project_id = %id, caller = %caller.id, "project not owned by caller");
        return Err(AppError::forbidden(
            "You can only manage projects assigned to you",
        ));
    }
    Ok(project)
}

/// A project owner must be an approved STAFF account.
async fn assignable_staff(state: &AppState, staff_id: Uuid) -> Result<User, AppError> {
    match state.users.find_by_id(staff_id).await? {
        Some(user) if user.can_be_assigned_projects() => Ok(user),
        _ => Err(AppError::validation(
            "Assigned user must be an approved staff member",
        )),
    }
}

async fn with_owner(state: &AppState, project: Project) -> Result<ProjectResponse, AppError> {
    let staff = match project.staff_id {
        Some(id) => state.users.find_by_id(id).await?,
        None => None,
    };
    Ok(ProjectResponse::from(project).with_staff(staff.as_ref()))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProjectListQuery>,
) -> Result<Json<ProjectList>, AppError> {
    let filter = query.into_filter()?;
    let listings = state.projects.list(&filter).await?;
    Ok(Json(listings.into()))
}

#[instrument(skip(state))]
pub async fn project_summary(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProjectListQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let filter = query.into_filter()?;
    let listings = state.projects.list(&filter).await?;
    let summary = ProjectSummary::from_projects(listings.iter().map(|l| &l.project));
    Ok(Json(SummaryResponse { summary }))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let project = load_project(&state, id).await?;
    let comments = state.comments.list_by_project(id).await?;
    let total = comments.len() as i64;

    // newest conversations first, each thread reading top to bottom
    let mut threads = build_threads(comments);
    threads.reverse();

    let mut body = with_owner(&state, project).await?;
    body.comment_count = Some(total);
    body.comments = Some(threads.into_iter().map(ThreadResponse::from).collect());
    Ok(Json(json!({ "project": body })))
}

#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(mut input): AppJson<ProjectInput>,
) -> Result<(StatusCode, Json<ProjectEnvelope>), AppError> {
    if let Err(e) = caller.require_project_author() {
        warn!(role = %caller.role, approved = caller.is_approved, "project create refused");
        return Err(e);
    }

    let staff_id = match input.staff_id.take() {
        Some(id) => assignable_staff(&state, id).await?.id,
        None => caller.id,
    };
    let details = input.into_details()?;

    let project = state
        .projects
        .create(NewProject {
            details,
            staff_id,
            created_by_id: caller.id,
        })
        .await?;
    info!(project_id = %project.id, staff_id = %staff_id, "project created");

    Ok((
        StatusCode::CREATED,
        Json(ProjectEnvelope {
            message: "Project created successfully",
            project: with_owner(&state, project).await?,
        }),
    ))
}

#[instrument(skip_all, fields(caller = %caller.id, project_id = %id))]
pub async fn update_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(mut input): AppJson<ProjectInput>,
) -> Result<Json<ProjectEnvelope>, AppError> {
    let mut project = load_managed_project(&state, &caller, id).await?;
    let staff_id = input.staff_id.take();
    input.merge_into(&mut project.details)?;

    if let Some(staff_id) = staff_id {
        if project.staff_id != Some(staff_id) {
            project.staff_id = Some(assignable_staff(&state, staff_id).await?.id);
        }
    }
    project.last_edited_by_id = Some(caller.id);

    let project = state.projects.update(&project).await?;
    info!("project updated");
    Ok(Json(ProjectEnvelope {
        message: "Project updated successfully",
        project: with_owner(&state, project).await?,
    }))
}

#[instrument(skip_all, fields(caller = %caller.id, project_id = %id))]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_managed_project(&state, &caller, id).await?;
    if !state.projects.delete(id).await? {
        return Err(AppError::not_found("Project does not exist"));
    }
    info!("project deleted");
    Ok(Json(json!({ "message": "Project deleted successfully" })))
}

#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn my_projects(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<ProjectList>, AppError> {
    caller.require(Access::StaffOrAdmin)?;
    let listings = state.projects.list(&ProjectFilter::owned_by(caller.id)).await?;
    Ok(Json(listings.into()))
}

#[instrument(skip_all, fields(caller = %caller.id, staff_id = %staff_id))]
pub async fn staff_projects(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(staff_id): AppPath<Uuid>,
) -> Result<Json<ProjectList>, AppError> {
    caller.require(Access::StaffOrAdmin)?;
    if !caller.can_view_account(staff_id) {
        return Err(AppError::forbidden(
            "You can only view your own assigned projects",
        ));
    }
    let listings = state.projects.list(&ProjectFilter::owned_by(staff_id)).await?;
    Ok(Json(listings.into()))
}
