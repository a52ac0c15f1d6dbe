use anyhow::Context;
use async_trait::async_trait;
use sqlx::{query_builder::Separated, FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{CommentRepository, ProjectRepository, UserRepository};
use crate::domain::{
    Comment, NewComment, NewProject, NewUser, Project, ProjectDetails, ProjectFilter,
    ProjectListing, Role, User, UserStats,
};
use crate::error::AppError;

// ---- users ----

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, is_approved, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    is_approved: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role: Role = r
            .role
            .parse()
            .with_context(|| format!("user {} has a corrupt role", r.id))?;
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            role,
            is_approved: r.is_approved,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn users_from(rows: Vec<UserRow>) -> Result<Vec<User>, AppError> {
    rows.into_iter().map(User::try_from).collect()
}

pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepo {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, is_approved)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_approved)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        users_from(rows)
    }

    async fn list_staff(&self, pending_only: bool) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE role = 'STAFF' AND (NOT $1 OR NOT is_approved)
             ORDER BY name ASC
            "#
        ))
        .bind(pending_only)
        .fetch_all(&self.pool)
        .await?;
        users_from(rows)
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = $3, password_hash = $4, role = $5,
                   is_approved = $6, updated_at = NOW()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_approved)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))?
        .try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn stats(&self, id: Uuid) -> Result<UserStats, AppError> {
        let (project_count, comment_count) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT (SELECT COUNT(*) FROM projects WHERE staff_id = $1),
                   (SELECT COUNT(*) FROM comments WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserStats {
            project_count,
            comment_count,
        })
    }
}

// ---- projects ----

/// Order must match `push_details`.
const DETAIL_COLUMNS: &str = "title, description, status, budgeted_cost, source_of_funds, \
    progress, department, directorate, contract_name, lpo_number, contract_number, contractor, \
    contract_period, contract_start_date, contract_end_date, contract_cost, amount_paid_to_date, \
    implementation_status, recommendations, pmc, financial_year, sub_county, ward, latitude, \
    longitude, images";

const PROJECT_COLUMNS: &str = "id, staff_id, created_by_id, last_edited_by_id, created_at, \
    updated_at, title, description, status, budgeted_cost, source_of_funds, progress, department, \
    directorate, contract_name, lpo_number, contract_number, contractor, contract_period, \
    contract_start_date, contract_end_date, contract_cost, amount_paid_to_date, \
    implementation_status, recommendations, pmc, financial_year, sub_county, ward, latitude, \
    longitude, images";

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    staff_id: Option<Uuid>,
    created_by_id: Option<Uuid>,
    last_edited_by_id: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    title: String,
    description: Option<String>,
    status: String,
    budgeted_cost: Option<f64>,
    source_of_funds: Option<String>,
    progress: Option<i32>,
    department: Option<String>,
    directorate: Option<String>,
    contract_name: Option<String>,
    lpo_number: Option<String>,
    contract_number: Option<String>,
    contractor: Option<String>,
    contract_period: Option<String>,
    contract_start_date: Option<OffsetDateTime>,
    contract_end_date: Option<OffsetDateTime>,
    contract_cost: Option<f64>,
    amount_paid_to_date: Option<f64>,
    implementation_status: Option<String>,
    recommendations: Option<String>,
    pmc: Option<String>,
    financial_year: Option<String>,
    sub_county: Option<String>,
    ward: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    images: Vec<String>,
}

#[derive(Debug, FromRow)]
struct ProjectListingRow {
    #[sqlx(flatten)]
    project: ProjectRow,
    comment_count: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(r: ProjectRow) -> Result<Self, Self::Error> {
        let status = r.status.parse()?;
        Ok(Project {
            id: r.id,
            details: ProjectDetails {
                title: r.title,
                description: r.description,
                status,
                budgeted_cost: r.budgeted_cost,
                source_of_funds: r.source_of_funds,
                progress: r.progress,
                department: r.department,
                directorate: r.directorate,
                contract_name: r.contract_name,
                lpo_number: r.lpo_number,
                contract_number: r.contract_number,
                contractor: r.contractor,
                contract_period: r.contract_period,
                contract_start_date: r.contract_start_date,
                contract_end_date: r.contract_end_date,
                contract_cost: r.contract_cost,
                amount_paid_to_date: r.amount_paid_to_date,
                implementation_status: r.implementation_status,
                recommendations: r.recommendations,
                pmc: r.pmc,
                financial_year: r.financial_year,
                sub_county: r.sub_county,
                ward: r.ward,
                latitude: r.latitude,
                longitude: r.longitude,
                images: r.images,
            },
            staff_id: r.staff_id,
            created_by_id: r.created_by_id,
            last_edited_by_id: r.last_edited_by_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn push_details(sep: &mut Separated<'_, '_, Postgres, &'static str>, d: ProjectDetails) {
    sep.push_bind(d.title)
        .push_bind(d.description)
        .push_bind(d.status.as_str())
        .push_bind(d.budgeted_cost)
        .push_bind(d.source_of_funds)
        .push_bind(d.progress)
        .push_bind(d.department)
        .push_bind(d.directorate)
        .push_bind(d.contract_name)
        .push_bind(d.lpo_number)
        .push_bind(d.contract_number)
        .push_bind(d.contractor)
        .push_bind(d.contract_period)
        .push_bind(d.contract_start_date)
        .push_bind(d.contract_end_date)
        .push_bind(d.contract_cost)
        .push_bind(d.amount_paid_to_date)
        .push_bind(d.implementation_status)
        .push_bind(d.recommendations)
        .push_bind(d.pmc)
        .push_bind(d.financial_year)
        .push_bind(d.sub_county)
        .push_bind(d.ward)
        .push_bind(d.latitude)
        .push_bind(d.longitude)
        .push_bind(d.images);
}

/// `%needle%` for ILIKE, with the pattern metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

pub struct PgProjectRepo {
    pool: PgPool,
}

impl PgProjectRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepo {
    async fn create(&self, project: NewProject) -> Result<Project, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO projects (id, staff_id, created_by_id, last_edited_by_id, {DETAIL_COLUMNS}) VALUES ("
        ));
        let mut sep = qb.separated(", ");
        sep.push_bind(Uuid::new_v4())
            .push_bind(project.staff_id)
            .push_bind(project.created_by_id)
            .push_bind(project.created_by_id);
        push_details(&mut sep, project.details);
        qb.push(format!(") RETURNING {PROJECT_COLUMNS}"));

        let row = qb
            .build_query_as::<ProjectRow>()
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Project::try_from)
        .transpose()
    }

    async fn list(&self, filter: &ProjectFilter) -> Result<Vec<ProjectListing>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROJECT_COLUMNS}, \
             (SELECT COUNT(*) FROM comments c WHERE c.project_id = projects.id) AS comment_count \
             FROM projects WHERE TRUE"
        ));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(staff_id) = filter.staff_id {
            qb.push(" AND staff_id = ").push_bind(staff_id);
        }
        if let Some(search) = filter.search.as_deref() {
            let pattern = like_pattern(search);
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        for (column, wanted) in [
            ("sub_county", &filter.sub_county),
            ("ward", &filter.ward),
            ("department", &filter.department),
            ("financial_year", &filter.financial_year),
        ] {
            if let Some(v) = wanted {
                qb.push(format!(" AND LOWER(BTRIM({column})) = LOWER(BTRIM("))
                    .push_bind(v.clone())
                    .push("))");
            }
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb
            .build_query_as::<ProjectListingRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| {
                Ok(ProjectListing {
                    project: r.project.try_into()?,
                    comment_count: r.comment_count,
                })
            })
            .collect()
    }

    async fn update(&self, project: &Project) -> Result<Project, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "UPDATE projects SET (staff_id, last_edited_by_id, {DETAIL_COLUMNS}) = ("
        ));
        let mut sep = qb.separated(", ");
        sep.push_bind(project.staff_id)
            .push_bind(project.last_edited_by_id);
        push_details(&mut sep, project.details.clone());
        qb.push("), updated_at = NOW() WHERE id = ")
            .push_bind(project.id)
            .push(format!(" RETURNING {PROJECT_COLUMNS}"));

        qb.build_query_as::<ProjectRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Project does not exist"))?
            .try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let done = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

// ---- comments ----

const COMMENT_COLUMNS: &str =
    "id, project_id, user_id, user_name, content, parent_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct CommentRow {
    id: Uuid,
    project_id: Uuid,
    user_id: Option<Uuid>,
    user_name: String,
    content: String,
    parent_id: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Comment {
            id: r.id,
            project_id: r.project_id,
            user_id: r.user_id,
            user_name: r.user_name,
            content: r.content,
            parent_id: r.parent_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub struct PgCommentRepo {
    pool: PgPool,
}

impl PgCommentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepo {
    async fn create(&self, comment: NewComment) -> Result<Comment, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            INSERT INTO comments (id, project_id, user_id, user_name, content, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(comment.project_id)
        .bind(comment.user_id)
        .bind(&comment.user_name)
        .bind(&comment.content)
        .bind(comment.parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE project_id = $1 ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_content(&self, id: Uuid, content: &str) -> Result<Comment, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            UPDATE comments SET content = $2, updated_at = NOW()
             WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Comment does not exist"))?;
        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let done = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("water"), "%water%");
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn detail_columns_are_a_suffix_of_project_columns() {
        assert!(PROJECT_COLUMNS.ends_with(DETAIL_COLUMNS.trim_start_matches("title")));
        assert_eq!(DETAIL_COLUMNS.split(',').count(), 26);
    }
}
