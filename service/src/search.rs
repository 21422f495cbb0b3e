//! The multi-criteria search pipeline.
//!
//! Order of operations: structured predicates are pushed down to storage,
//! dynamic attribute filters and the stay-window availability check run over
//! the candidates, then geo filtering, sorting, and pagination. Every search
//! is logged fire-and-forget; a logging failure never fails the search.

use chrono::Utc;
use fieldkit_engine::{query, Page, SearchCriteria, SearchHit};
use futures::future::try_join_all;
use std::sync::Arc;

use crate::context::ActorContext;
use crate::error::Result;
use crate::external::AvailabilityProvider;
use crate::repo::{InstanceRepo, SearchLogEntry, SearchLogRepo};

const SEARCH_TYPE: &str = "multi_criteria";

/// Runs searches and records them.
pub struct SearchService {
    instances: Arc<dyn InstanceRepo>,
    availability: Arc<dyn AvailabilityProvider>,
    logs: Arc<dyn SearchLogRepo>,
}

impl SearchService {
    pub fn new(
        instances: Arc<dyn InstanceRepo>,
        availability: Arc<dyn AvailabilityProvider>,
        logs: Arc<dyn SearchLogRepo>,
    ) -> Self {
        Self {
            instances,
            availability,
            logs,
        }
    }

    /// Run the full pipeline and return one page of hits.
    pub async fn search(
        &self,
        ctx: &ActorContext,
        criteria: &SearchCriteria,
    ) -> Result<Page<SearchHit>> {
        let candidates = self.instances.fetch_candidates(criteria).await?;

        let mut candidates: Vec<_> = candidates
            .into_iter()
            .filter(|c| query::matches_field_filters(c, &criteria.field_filters))
            .collect();

        if let Some(stay) = criteria.stay {
            // One batch call when the search is scoped to a container. An
            // empty batch set defers to per-candidate checks: providers
            // without batch support report nothing, and when the container
            // is genuinely fully booked both paths agree.
            let batch = match &criteria.container_id {
                Some(container_id) => Some(
                    self.availability
                        .available_instance_ids(
                            container_id,
                            stay.check_in,
                            stay.check_out,
                            stay.guest_count,
                        )
                        .await?,
                ),
                None => None,
            };

            match batch {
                Some(available) if !available.is_empty() => {
                    candidates.retain(|c| available.contains(&c.id));
                }
                _ => {
                    let checks = candidates.iter().map(|c| {
                        self.availability
                            .is_available(&c.id, stay.check_in, stay.check_out)
                    });
                    let results = try_join_all(checks).await?;
                    let mut keep = results.into_iter();
                    candidates.retain(|_| keep.next().unwrap_or(false));
                }
            }
        }

        let geo_applied = criteria.geo.is_some();
        let mut hits = query::apply_geo(candidates, criteria.geo.as_ref());
        query::sort_hits(&mut hits, criteria.sort, geo_applied);
        let page = query::paginate(hits, criteria.page, criteria.page_size);

        self.log_search(ctx, criteria, page.total);

        Ok(page)
    }

    /// Append a search log entry without blocking or failing the search.
    fn log_search(&self, ctx: &ActorContext, criteria: &SearchCriteria, total: usize) {
        let criteria_json = match serde_json::to_value(criteria) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("search criteria not serializable: {}", e);
                return;
            }
        };

        let entry = SearchLogEntry {
            user_id: ctx.user_id.to_string(),
            search_type: SEARCH_TYPE.to_string(),
            criteria: criteria_json,
            result_count: total as i64,
            page_number: criteria.page as i32,
            page_size: criteria.page_size as i32,
            logged_at: Utc::now(),
        };

        let logs = Arc::clone(&self.logs);
        tokio::spawn(async move {
            if let Err(e) = logs.append(&entry).await {
                tracing::warn!("search log append failed: {}", e);
            }
        });
    }
}
