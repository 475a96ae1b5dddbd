use std::sync::Arc;

use relay_core::ResultRecord;
use tracing::{debug, warn};

use crate::traits::ResultStore;

/// Body returned to callers when no terminal result exists yet.
pub const NO_STATUS_FOUND: &str = "No status found.";

/// Read side of the pipeline: looks up the persisted result of a request.
#[derive(Clone)]
pub struct StatusQuery {
    results: Arc<dyn ResultStore>,
}

impl StatusQuery {
    #[must_use]
    pub fn new(results: Arc<dyn ResultStore>) -> Self {
        Self { results }
    }

    /// Returns the stored result for `request_id`, or `None` when there is
    /// none yet.
    ///
    /// Store failures are logged and reported as absent, so a caller polling
    /// for status sees "not yet" rather than an error.
    pub async fn get_status(&self, request_id: &str) -> Option<ResultRecord> {
        match self.results.get(request_id).await {
            Ok(record) => {
                debug!(request_id, found = record.is_some(), "Status lookup");
                record
            }
            Err(e) => {
                warn!(request_id, error = %e, "Status lookup failed, reporting no status");
                None
            }
        }
    }
}
