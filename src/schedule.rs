use tracing::{error, info};

use crate::config::JobConfig;
use crate::models::{ScrapeRunResult, SearchFilters};
use crate::orchestrator::ScrapeOrchestrator;

/// One configured recurring search.
#[derive(Debug, Clone)]
pub struct SearchJob {
    pub site: String,
    pub term: String,
    pub filters: SearchFilters,
}

impl From<&JobConfig> for SearchJob {
    fn from(job: &JobConfig) -> Self {
        Self {
            site: job.site.clone(),
            term: job.term.clone(),
            filters: job.filters(),
        }
    }
}

/// Whether a finished run warrants attention: any notable change event, or a
/// degraded run that may be hiding one.
pub fn should_alert(result: &ScrapeRunResult) -> bool {
    result.degraded || result.events.iter().any(|e| e.is_notable())
}

/// Runs jobs one after another; site pacing happens inside the fetch path,
/// so concurrency across jobs would only fight the rate governor.
pub async fn run_jobs(
    orchestrator: &ScrapeOrchestrator,
    jobs: &[SearchJob],
) -> Vec<ScrapeRunResult> {
    let mut results = Vec::with_capacity(jobs.len());
    for job in jobs {
        info!(site = %job.site, term = %job.term, "running job");
        match orchestrator.run(&job.site, &job.term, &job.filters).await {
            Ok(result) => {
                if should_alert(&result) {
                    info!(run_id = %result.run_id, "job produced alerts");
                }
                results.push(result);
            }
            Err(err) => {
                error!(site = %job.site, term = %job.term, %err, "job failed");
            }
        }
    }
    results
}
