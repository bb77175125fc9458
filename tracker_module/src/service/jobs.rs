//! Time-triggered batch jobs: the short-interval full resync and the
//! once-daily digest broadcast.
//!
//! Each cycle snapshots the known users into an explicit queue of per-user
//! job units and drains it sequentially; a unit's failure is logged and the
//! rest of the queue still runs. A parallel or rate-limited executor can
//! replace the drain loop without touching `run_user_job`.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::digest::{build_digest, DIGEST_TOP_CONVERSATIONS};
use crate::notifier::send_digest;
use crate::records::RecordStore;
use crate::session::SessionStore;
use crate::slack::SlackClient;
use crate::sync::sync_user_dms;

use super::config::ServiceConfig;
use super::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("cron expression must have 6 fields, got {0}")]
    InvalidCron(usize),
    #[error("cron parse error: {0}")]
    Parse(#[from] cron::error::Error),
    #[error("cron expression has no future run")]
    NoNextRun,
}

/// First scheduled instant strictly after `after`.
pub(crate) fn next_run_after(
    expression: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let fields = expression.split_whitespace().count();
    if fields != 6 {
        return Err(ScheduleError::InvalidCron(fields));
    }
    let schedule = CronSchedule::from_str(expression)?;
    schedule.after(&after).next().ok_or(ScheduleError::NoNextRun)
}

/// A single unit of batch work for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserJob {
    Resync,
    DeliverDigest,
}

/// Handle over the spawned job loops.
pub struct JobsControl {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobsControl {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub fn start_batch_jobs(
    config: Arc<ServiceConfig>,
    slack: Arc<SlackClient>,
    sessions: Arc<SessionStore>,
    records: Arc<dyn RecordStore>,
) -> JobsControl {
    let stop = Arc::new(AtomicBool::new(false));
    let handles = vec![
        spawn_job_loop(
            UserJob::Resync,
            config.sync_cron.clone(),
            stop.clone(),
            slack.clone(),
            sessions.clone(),
            records.clone(),
        ),
        spawn_job_loop(
            UserJob::DeliverDigest,
            config.digest_cron.clone(),
            stop.clone(),
            slack,
            sessions,
            records,
        ),
    ];
    JobsControl { stop, handles }
}

fn spawn_job_loop(
    job: UserJob,
    expression: String,
    stop: Arc<AtomicBool>,
    slack: Arc<SlackClient>,
    sessions: Arc<SessionStore>,
    records: Arc<dyn RecordStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let now = Utc::now();
            let next = match next_run_after(&expression, now) {
                Ok(next) => next,
                Err(err) => {
                    error!("{:?} job disabled ({}): {}", job, expression, err);
                    break;
                }
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            if stop.load(Ordering::Relaxed) {
                break;
            }
            run_cycle(job, &slack, &sessions, records.as_ref()).await;
        }
    })
}

/// Run one batch cycle over every known user, sequentially.
async fn run_cycle(
    job: UserJob,
    slack: &SlackClient,
    sessions: &SessionStore,
    records: &dyn RecordStore,
) {
    let queue: Vec<String> = sessions.user_ids();
    info!("running {:?} cycle for {} user(s)", job, queue.len());
    for user_id in queue {
        if let Err(err) = run_user_job(job, &user_id, slack, sessions, records).await {
            error!("{:?} failed for user {}: {}", job, user_id, err);
        }
    }
}

/// Execute one job unit. A session that vanished between the snapshot and
/// now is a silent skip, not an error.
pub(crate) async fn run_user_job(
    job: UserJob,
    user_id: &str,
    slack: &SlackClient,
    sessions: &SessionStore,
    records: &dyn RecordStore,
) -> Result<(), BoxError> {
    let session = match sessions.get(user_id) {
        Some(session) => session,
        None => return Ok(()),
    };
    match job {
        UserJob::Resync => {
            sync_user_dms(slack, &session, records).await?;
        }
        UserJob::DeliverDigest => {
            let stored = records.get(user_id)?;
            let digest = build_digest(&stored, Utc::now().date_naive(), DIGEST_TOP_CONVERSATIONS);
            send_digest(slack, &session, &digest).await?;
        }
    }
    Ok(())
}
