mod auth;
mod config;
mod jobs;
mod server;
mod state;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use auth::{issue_session_token, verify_session_token, SessionClaims, SESSION_TOKEN_TTL_DAYS};
pub use config::{ServiceConfig, OAUTH_SCOPES};
pub use jobs::{start_batch_jobs, JobsControl, UserJob};
pub use server::run_server;
