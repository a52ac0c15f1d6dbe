use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    Ongoing,
    Completed,
    Stalled,
    UnderProcurement,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::NotStarted,
        ProjectStatus::Ongoing,
        ProjectStatus::Completed,
        ProjectStatus::Stalled,
        ProjectStatus::UnderProcurement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "not_started",
            ProjectStatus::Ongoing => "ongoing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Stalled => "stalled",
            ProjectStatus::UnderProcurement => "under_procurement",
        }
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::NotStarted
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        ProjectStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| AppError::validation(format!("Unknown project status '{s}'")))
    }
}

/// Descriptive, budget, contract and location fields of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub budgeted_cost: Option<f64>,
    pub source_of_funds: Option<String>,
    pub progress: Option<i32>,
    pub department: Option<String>,
    pub directorate: Option<String>,
    pub contract_name: Option<String>,
    pub lpo_number: Option<String>,
    pub contract_number: Option<String>,
    pub contractor: Option<String>,
    pub contract_period: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub contract_start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub contract_end_date: Option<OffsetDateTime>,
    pub contract_cost: Option<f64>,
    pub amount_paid_to_date: Option<f64>,
    pub implementation_status: Option<String>,
    pub recommendations: Option<String>,
    pub pmc: Option<String>,
    pub financial_year: Option<String>,
    pub sub_county: Option<String>,
    pub ward: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Vec<String>,
}

impl ProjectDetails {
    pub fn check_contract_dates(&self) -> Result<(), AppError> {
        if let (Some(start), Some(end)) = (self.contract_start_date, self.contract_end_date) {
            if end < start {
                return Err(AppError::validation(
                    "Contract end date must not precede the start date",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub details: ProjectDetails,
    pub staff_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub last_edited_by_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub details: ProjectDetails,
    pub staff_id: Uuid,
    pub created_by_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ProjectListing {
    pub project: Project,
    pub comment_count: i64,
}

/// Request body for create and update. Absent fields are left untouched on
/// update; on create only `title` is mandatory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budgeted_cost: Option<f64>,
    pub source_of_funds: Option<String>,
    pub progress: Option<i32>,
    pub department: Option<String>,
    pub directorate: Option<String>,
    pub contract_name: Option<String>,
    pub lpo_number: Option<String>,
    pub contract_number: Option<String>,
    pub contractor: Option<String>,
    pub contract_period: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub contract_start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub contract_end_date: Option<OffsetDateTime>,
    pub contract_cost: Option<f64>,
    pub amount_paid_to_date: Option<f64>,
    pub implementation_status: Option<String>,
    pub recommendations: Option<String>,
    pub pmc: Option<String>,
    pub financial_year: Option<String>,
    pub sub_county: Option<String>,
    pub ward: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Option<Vec<String>>,
    pub staff_id: Option<Uuid>,
}

impl ProjectInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(AppError::validation("Title must not be empty"));
            }
        }
        if let Some(p) = self.progress {
            if !(0..=100).contains(&p) {
                return Err(AppError::validation("Progress must be between 0 and 100"));
            }
        }
        for (name, value) in [
            ("budgetedCost", self.budgeted_cost),
            ("contractCost", self.contract_cost),
            ("amountPaidToDate", self.amount_paid_to_date),
        ] {
            if matches!(value, Some(v) if !v.is_finite() || v < 0.0) {
                return Err(AppError::validation(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if matches!(self.latitude, Some(v) if !(-90.0..=90.0).contains(&v)) {
            return Err(AppError::validation("Latitude must be between -90 and 90"));
        }
        if matches!(self.longitude, Some(v) if !(-180.0..=180.0).contains(&v)) {
            return Err(AppError::validation("Longitude must be between -180 and 180"));
        }
        Ok(())
    }

    /// Builds the details of a new project; `title` is required.
    pub fn into_details(self) -> Result<ProjectDetails, AppError> {
        self.validate()?;
        let title = match self.title {
            Some(t) => t.trim().to_string(),
            None => return Err(AppError::validation("Title is required")),
        };
        let mut details = ProjectDetails {
            title,
            description: None,
            status: ProjectStatus::default(),
            budgeted_cost: None,
            source_of_funds: None,
            progress: None,
            department: None,
            directorate: None,
            contract_name: None,
            lpo_number: None,
            contract_number: None,
            contractor: None,
            contract_period: None,
            contract_start_date: None,
            contract_end_date: None,
            contract_cost: None,
            amount_paid_to_date: None,
            implementation_status: None,
            recommendations: None,
            pmc: None,
            financial_year: None,
            sub_county: None,
            ward: None,
            latitude: None,
            longitude: None,
            images: Vec::new(),
        };
        ProjectInput { title: None, ..self }.apply(&mut details);
        details.check_contract_dates()?;
        Ok(details)
    }

    /// Validates the input, then applies it to `d` only if the merged
    /// details are still consistent.
    pub fn merge_into(self, d: &mut ProjectDetails) -> Result<(), AppError> {
        self.validate()?;
        let mut merged = d.clone();
        self.apply(&mut merged);
        merged.check_contract_dates()?;
        *d = merged;
        Ok(())
    }

    /// Overwrites every field that is present in the input.
    pub fn apply(self, d: &mut ProjectDetails) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { d.$field = Some(v); })*
            };
        }
        if let Some(title) = self.title {
            d.title = title.trim().to_string();
        }
        if let Some(status) = self.status {
            d.status = status;
        }
        if let Some(images) = self.images {
            d.images = images;
        }
        set!(
            description,
            budgeted_cost,
            source_of_funds,
            progress,
            department,
            directorate,
            contract_name,
            lpo_number,
            contract_number,
            contractor,
            contract_period,
            contract_start_date,
            contract_end_date,
            contract_cost,
            amount_paid_to_date,
            implementation_status,
            recommendations,
            pmc,
            financial_year,
            sub_county,
            ward,
            latitude,
            longitude,
        );
    }
}

/// Directory filters, combined with AND. Text search is a case-insensitive
/// substring match over title or description; location and department
/// filters are case-insensitive equality; status and staff are exact.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
    pub sub_county: Option<String>,
    pub ward: Option<String>,
    pub department: Option<String>,
    pub financial_year: Option<String>,
    pub staff_id: Option<Uuid>,
}

impl ProjectFilter {
    pub fn owned_by(staff_id: Uuid) -> Self {
        Self {
            staff_id: Some(staff_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, p: &Project) -> bool {
        let d = &p.details;
        if matches!(self.status, Some(s) if s != d.status) {
            return false;
        }
        if self.staff_id.is_some() && self.staff_id != p.staff_id {
            return false;
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = d.title.to_lowercase().contains(&needle)
                || d
                    .description
                    .as_deref()
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        eq_ignore_case(&self.sub_county, &d.sub_county)
            && eq_ignore_case(&self.ward, &d.ward)
            && eq_ignore_case(&self.department, &d.department)
            && eq_ignore_case(&self.financial_year, &d.financial_year)
    }
}

fn eq_ignore_case(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(w), Some(a)) => w.trim().to_lowercase() == a.trim().to_lowercase(),
        (Some(_), None) => false,
    }
}

/// Dashboard aggregates over a set of projects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub total: usize,
    pub by_status: BTreeMap<ProjectStatus, usize>,
    pub total_budgeted_cost: f64,
    pub total_contract_cost: f64,
    pub total_paid_to_date: f64,
}

impl ProjectSummary {
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Self {
        let mut by_status: BTreeMap<ProjectStatus, usize> =
            ProjectStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut summary = ProjectSummary {
            total: 0,
            by_status: BTreeMap::new(),
            total_budgeted_cost: 0.0,
            total_contract_cost: 0.0,
            total_paid_to_date: 0.0,
        };
        for p in projects {
            let d = &p.details;
            summary.total += 1;
            *by_status.entry(d.status).or_default() += 1;
            summary.total_budgeted_cost += d.budgeted_cost.unwrap_or(0.0);
            summary.total_contract_cost += d.contract_cost.unwrap_or(0.0);
            summary.total_paid_to_date += d.amount_paid_to_date.unwrap_or(0.0);
        }
        summary.by_status = by_status;
        summary
    }
}
