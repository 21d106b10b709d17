//! Cron-driven repeated runs.

use crate::error::{Result, UpdaterError};
use crate::{log_debug, log_info};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// Parse a cron expression. Five fields are read with minute precision, six or seven
/// fields include seconds (and a year).
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let trimmed = expression.trim();
    let normalized = match trimmed.split_whitespace().count() {
        5 => format!("0 {trimmed}"),
        _ => trimmed.to_string(),
    };
    Schedule::from_str(&normalized)
        .map_err(|e| UpdaterError::Schedule(format!("{expression:?}: {e}")))
}

/// Fires a job on every tick of a cron schedule
pub struct Scheduler {
    expression: String,
    schedule: Schedule,
}

impl Scheduler {
    pub fn new(expression: &str) -> Result<Self> {
        Ok(Self {
            expression: expression.trim().to_string(),
            schedule: parse_schedule(expression)?,
        })
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// Await `job` at every tick until Ctrl-C. Ticks that pass while a job is running
    /// are skipped, never queued.
    pub async fn run<F, Fut>(&self, mut job: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        log_info!("Scheduled dependency updates: {}", self.expression);
        loop {
            let Some(next) = self.next_run() else {
                log_info!("Schedule {} has no upcoming runs", self.expression);
                return Ok(());
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            log_debug!("Next run at {} (in {:?})", next.to_rfc3339(), wait);
            tracing::info!(next = %next.to_rfc3339(), wait_secs = wait.as_secs(), "waiting for tick");

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    log_info!("Scheduler stopped");
                    return Ok(());
                }
            }

            job().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_expression_gets_seconds() {
        let schedule = parse_schedule("*/15 * * * *").expect("valid expression");
        let next = schedule.upcoming(Utc).next().expect("has upcoming run");
        assert_eq!(next.timestamp() % 60, 0);
        assert_eq!(next.format("%M").to_string().parse::<u32>().unwrap_or(1) % 15, 0);
    }

    #[test]
    fn test_six_field_expression_is_kept() {
        assert!(parse_schedule("30 0 3 * * Mon").is_ok());
    }

    #[test]
    fn test_invalid_expression() {
        let err = parse_schedule("every day").expect_err("should not parse");
        assert!(matches!(err, UpdaterError::Schedule(_)));
        assert!(Scheduler::new("61 * * * *").is_err());
    }
}
