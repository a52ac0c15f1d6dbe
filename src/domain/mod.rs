pub mod access;
pub mod comment;
pub mod project;
pub mod user;

pub use access::{Access, CurrentUser};
pub use comment::{build_threads, Comment, CommentThread, NewComment};
pub use project::{
    NewProject, Project, ProjectDetails, ProjectFilter, ProjectInput, ProjectListing,
    ProjectStatus, ProjectSummary,
};
pub use user::{normalize_email, NewUser, Role, User, UserStats};
