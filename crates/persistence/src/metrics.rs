//! Query latency and pool gauges exported through the `metrics` facade.
//!
//! Nothing here fails without an installed recorder; the calls become no-ops.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

const QUERY_HISTOGRAM: &str = "db_query_duration_seconds";

/// Records how long the repository query `query_name` took.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(QUERY_HISTOGRAM, "query" => query_name.to_owned()).record(duration_secs);
}

/// Snapshot of pool occupancy. Sampled on each `/metrics` scrape.
pub fn record_pool_metrics(pool: &PgPool) {
    let total = pool.size();
    let idle = pool.num_idle() as u32;
    let in_use = total.saturating_sub(idle);

    gauge!("db_pool_connections", "state" => "in_use").set(f64::from(in_use));
    gauge!("db_pool_connections", "state" => "idle").set(f64::from(idle));
    gauge!("db_pool_size").set(f64::from(total));
}

/// Starts a clock when created and reports it on [`QueryTimer::record`].
///
/// Repositories name queries after the operation, e.g. `claim_due_campaigns`
/// or `debit_credits`, so one label set maps to one SQL statement.
pub struct QueryTimer {
    query_name: String,
    started: Instant,
}

impl QueryTimer {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            started: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(&self.query_name, self.started.elapsed().as_secs_f64());
    }
}
