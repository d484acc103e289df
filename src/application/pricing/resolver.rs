//! Tariff resolution: which plan applies to a site over which sub-window

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{
    DomainError, DomainResult, EffectiveWindow, RepositoryProvider, SiteTariffAssignment,
    TariffPlan,
};

/// An assignment, its plan, and the part of the period it governs
#[derive(Debug, Clone)]
pub struct ResolvedAssignment {
    pub assignment: SiteTariffAssignment,
    pub plan: Arc<TariffPlan>,
    pub window: EffectiveWindow,
}

pub struct TariffResolver {
    repos: Arc<dyn RepositoryProvider>,
}

impl TariffResolver {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Assignments of `site_id` intersecting `[start, end)`, ascending by
    /// `effective_from`, each clipped to the period. Empty windows are dropped.
    pub async fn resolve(
        &self,
        site_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<ResolvedAssignment>> {
        let assignments = self
            .repos
            .assignments()
            .find_overlapping(site_id, start, end)
            .await?;

        let mut plans: HashMap<Uuid, Arc<TariffPlan>> = HashMap::new();
        let mut resolved = Vec::with_capacity(assignments.len());
        let mut previous_end: Option<DateTime<Utc>> = None;

        for assignment in assignments {
            let Some(window) = EffectiveWindow::clip(
                start,
                end,
                assignment.effective_from,
                assignment.effective_to,
            ) else {
                continue;
            };

            if previous_end.is_some_and(|prev| window.start < prev) {
                warn!(
                    site_id = %site_id,
                    assignment_id = %assignment.id,
                    "Overlapping tariff assignments; readings in the overlap are priced twice"
                );
            }
            previous_end = Some(window.end);

            let plan = match plans.get(&assignment.plan_id) {
                Some(plan) => Arc::clone(plan),
                None => {
                    let plan = self
                        .repos
                        .tariffs()
                        .find_plan(assignment.plan_id)
                        .await?
                        .ok_or_else(|| {
                            DomainError::not_found(
                                "TariffPlan",
                                "id",
                                assignment.plan_id.to_string(),
                            )
                        })?;
                    let plan = Arc::new(plan);
                    plans.insert(assignment.plan_id, Arc::clone(&plan));
                    plan
                }
            };

            debug!(
                site_id = %site_id,
                plan = %plan.code,
                window_start = %window.start,
                window_end = %window.end,
                "Resolved tariff window"
            );
            resolved.push(ResolvedAssignment {
                assignment,
                plan,
                window,
            });
        }

        Ok(resolved)
    }
}
