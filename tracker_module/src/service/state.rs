use std::sync::Arc;

use crate::records::RecordStore;
use crate::session::SessionStore;
use crate::slack::SlackClient;

use super::config::ServiceConfig;

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) config: Arc<ServiceConfig>,
    pub(super) slack: Arc<SlackClient>,
    pub(super) sessions: Arc<SessionStore>,
    pub(super) records: Arc<dyn RecordStore>,
}
