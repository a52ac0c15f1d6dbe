use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    comments::dto::ThreadResponse,
    domain::{
        Project, ProjectDetails, ProjectFilter, ProjectListing, ProjectStatus, ProjectSummary,
        User,
    },
    error::AppError,
};

/// Query string of the directory and summary endpoints. Blank values are
/// treated as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub sub_county: Option<String>,
    pub ward: Option<String>,
    pub department: Option<String>,
    pub financial_year: Option<String>,
    pub staff_id: Option<Uuid>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ProjectListQuery {
    pub fn into_filter(self) -> Result<ProjectFilter, AppError> {
        Ok(ProjectFilter {
            status: non_blank(self.status)
                .map(|s| s.parse::<ProjectStatus>())
                .transpose()?,
            search: non_blank(self.search),
            sub_county: non_blank(self.sub_county),
            ward: non_blank(self.ward),
            department: non_blank(self.department),
            financial_year: non_blank(self.financial_year),
            staff_id: self.staff_id,
        })
    }
}

/// Minimal account reference embedded in project payloads.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserRef {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: ProjectDetails,
    pub staff_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub last_edited_by_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<ThreadResponse>>,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            details: p.details,
            staff_id: p.staff_id,
            created_by_id: p.created_by_id,
            last_edited_by_id: p.last_edited_by_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
            staff: None,
            comment_count: None,
            comments: None,
        }
    }
}

impl From<ProjectListing> for ProjectResponse {
    fn from(l: ProjectListing) -> Self {
        Self {
            comment_count: Some(l.comment_count),
            ..l.project.into()
        }
    }
}

impl ProjectResponse {
    pub fn with_staff(mut self, staff: Option<&User>) -> Self {
        self.staff = staff.map(UserRef::from);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectResponse>,
    pub count: usize,
}

impl From<Vec<ProjectListing>> for ProjectList {
    fn from(listings: Vec<ProjectListing>) -> Self {
        let projects: Vec<ProjectResponse> = listings.into_iter().map(Into::into).collect();
        Self {
            count: projects.len(),
            projects,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub message: &'static str,
    pub project: ProjectResponse,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: ProjectSummary,
}
