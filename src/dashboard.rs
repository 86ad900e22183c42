use crate::cache::TtlCache;
use crate::config::{AppConfig, ColumnMapping};
use crate::db::{self, DataSource};
use crate::errors::{AppError, AppResult};
use crate::export;
use crate::metrics::{self, DashboardMetrics};
use crate::models::{ConnectionStatus, FilterOptions, FilterSelection, QueryResultTable, RideRecord};
use crate::query_store::NamedQueryStore;
use crate::report::ReportEmbed;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub options: FilterOptions,
    pub selection: FilterSelection,
    pub metrics: DashboardMetrics,
    pub revenue_display: String,
    pub avg_distance_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRun {
    pub run_id: String,
    pub table: QueryResultTable,
    pub elapsed_ms: u64,
}

impl QueryRun {
    pub fn download(&self) -> export::CsvDownload {
        export::download(&self.table)
    }
}

pub struct Dashboard {
    config: AppConfig,
    mapping: ColumnMapping,
    source: Box<dyn DataSource>,
    base_table: TtlCache<Vec<RideRecord>>,
}

impl Dashboard {
    pub fn new(config: AppConfig, source: Box<dyn DataSource>) -> Self {
        let mapping = config.schema.mapping();
        let base_table = TtlCache::new(config.dashboard.cache_ttl());
        Self {
            config,
            mapping,
            source,
            base_table,
        }
    }

    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let source = db::open_source(&config)?;
        Ok(Self::new(config, source))
    }

    /// Banner state. A failure here is reported, never raised.
    pub fn connection_status(&self) -> ConnectionStatus {
        match self.source.check_connection() {
            Ok(()) => {
                tracing::info!(source = %self.source.describe(), "database connection ok");
                ConnectionStatus::connected()
            }
            Err(error) => {
                tracing::warn!(source = %self.source.describe(), error = %error, "database connection failed");
                ConnectionStatus::failed(error.detail())
            }
        }
    }

    pub fn base_table(&self) -> AppResult<Arc<Vec<RideRecord>>> {
        self.base_table
            .get_or_reload(|| db::load_base_table(self.source.as_ref(), &self.mapping))
    }

    /// Drops the cached base table so the next read goes back to the database.
    pub fn refresh(&self) {
        self.base_table.invalidate();
    }

    pub fn filter_options(&self) -> AppResult<FilterOptions> {
        Ok(FilterOptions::from_records(&self.base_table()?))
    }

    /// Filter choices are restricted to observed values; `None` keeps every value selected.
    pub fn view(&self, vehicle_types: Option<Vec<String>>, booking_statuses: Option<Vec<String>>) -> AppResult<DashboardView> {
        let records = self.base_table()?;
        let options = FilterOptions::from_records(&records);
        let selection = FilterSelection::restricted(&options, vehicle_types, booking_statuses);
        let metrics = metrics::compute(&records, &selection, &self.config.dashboard.success_status);

        Ok(DashboardView {
            revenue_display: metrics::format_revenue(&self.config.dashboard.currency_symbol, metrics.kpis.total_revenue),
            avg_distance_display: metrics::format_optional(metrics.kpis.avg_ride_distance),
            options,
            selection,
            metrics,
        })
    }

    /// Re-read on every call so edits to the file show up without a restart.
    pub fn named_queries(&self) -> AppResult<NamedQueryStore> {
        NamedQueryStore::load(&self.config.dashboard.queries_path)
    }

    /// Runs the text as typed. Blank input is a no-op, mirroring a disabled run button.
    pub fn run_query(&self, sql: &str) -> AppResult<Option<QueryRun>> {
        if sql.trim().is_empty() {
            return Ok(None);
        }

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        tracing::info!(run_id = %run_id, "running ad hoc query");

        match self.source.execute(sql) {
            Ok(table) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(run_id = %run_id, rows = table.row_count(), elapsed_ms, "ad hoc query finished");
                Ok(Some(QueryRun {
                    run_id,
                    table,
                    elapsed_ms,
                }))
            }
            Err(error) => {
                tracing::warn!(run_id = %run_id, error = %error, "ad hoc query failed");
                Err(error)
            }
        }
    }

    pub fn run_named_query(&self, label: &str) -> AppResult<Option<QueryRun>> {
        let store = self.named_queries()?;
        if !store.contains(label) {
            return Err(AppError::NotFound(format!("named query '{}'", label)));
        }
        self.run_query(store.lookup(label))
    }

    pub fn report_embed(&self) -> ReportEmbed {
        self.config.report.embed()
    }
}
