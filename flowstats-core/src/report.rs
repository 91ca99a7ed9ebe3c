//! Report entry point
//!
//! [`ReportService`] turns a request (form, dimension string, period selector,
//! optional custom dates) into a [`Report`]: it validates the request,
//! resolves the period, and runs the matching aggregation. Errors from either
//! stage are returned unchanged.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::Locale;
use crate::period::{DateInterval, PeriodResolver, PeriodSelector};
use crate::stats::{AggregationContext, Dimension, ReportRows, StatsAggregator};
use crate::steps::StepDirectory;
use crate::types::TablePrefix;

/// One computed report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub form_id: i64,
    /// Canonical period selector (`last_1_months` for "1" or `last_month`)
    pub period: String,
    /// Resolved half-open UTC interval
    pub interval: DateInterval,
    /// Dimension-tagged rows, in report order
    #[serde(flatten)]
    pub rows: ReportRows,
}

impl Report {
    pub fn dimension(&self) -> Dimension {
        self.rows.dimension()
    }
}

/// The `{success, data}` envelope the plugin's AJAX handler answered with.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl Envelope<serde_json::Value> {
    /// Envelope for a report result: the report on success, the message on
    /// failure.
    pub fn from_result(result: &Result<Report>) -> Result<Self> {
        Ok(match result {
            Ok(report) => Envelope {
                success: true,
                data: serde_json::to_value(report)?,
            },
            Err(e) => Envelope {
                success: false,
                data: serde_json::Value::String(e.to_string()),
            },
        })
    }
}

/// Validates report requests and runs them against one site's tables.
pub struct ReportService<'a> {
    db: &'a Database,
    prefix: TablePrefix,
    steps: &'a dyn StepDirectory,
    resolver: PeriodResolver,
    locale: Locale,
}

impl<'a> ReportService<'a> {
    pub fn new(
        db: &'a Database,
        prefix: TablePrefix,
        steps: &'a dyn StepDirectory,
        resolver: PeriodResolver,
    ) -> Self {
        Self {
            db,
            prefix,
            steps,
            resolver,
            locale: Locale::default(),
        }
    }

    /// Use `locale` for month labels.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Compute a report as of now.
    pub fn get_report(
        &self,
        form_id: i64,
        dimension: &str,
        period: &str,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
    ) -> Result<Report> {
        self.get_report_at(form_id, dimension, period, custom_start, custom_end, Utc::now())
    }

    /// Compute a report as if the current time were `now`.
    pub fn get_report_at(
        &self,
        form_id: i64,
        dimension: &str,
        period: &str,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Report> {
        tracing::info!(form_id, dimension, period, "Report requested");

        if form_id <= 0 {
            return Err(Error::InvalidForm(form_id));
        }
        let dimension: Dimension = dimension.parse()?;
        let interval = self
            .resolver
            .resolve_at(period, custom_start, custom_end, now)?;

        let aggregator = StatsAggregator::new(AggregationContext {
            db: self.db,
            prefix: &self.prefix,
            steps: self.steps,
            locale: self.locale,
            utc_offset: self.resolver.offset(),
        });
        let rows = aggregator.aggregate(dimension, form_id, &interval)?;

        Ok(Report {
            form_id,
            period: period.parse::<PeriodSelector>()?.as_str(),
            interval,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StaticStepDirectory;
    use crate::types::{ActivityEvent, Entry, EntryStatus, LogValue, WorkflowStep};
    use chrono::TimeZone;

    const FORM: i64 = 3;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 20, 12, 0, 0).unwrap()
    }

    fn fixture() -> (Database, StaticStepDirectory) {
        let db = Database::open_in_memory().unwrap();
        let prefix = TablePrefix::default();
        db.migrate(&prefix).unwrap();
        for id in 1..=3 {
            db.upsert_entry(
                &prefix,
                &Entry {
                    id,
                    form_id: FORM,
                    status: EntryStatus::Active,
                },
            )
            .unwrap();
        }
        let ended = |entry, secs, d: (i32, u32, u32)| {
            ActivityEvent::workflow_ended(
                entry,
                FORM,
                LogValue::Complete,
                Some(secs),
                Utc.with_ymd_and_hms(d.0, d.1, d.2, 10, 0, 0).unwrap(),
            )
        };
        db.insert_activity_events(
            &prefix,
            &[
                ended(1, 1800, (2024, 4, 2)),
                ended(2, 3600, (2024, 3, 5)),
                ended(3, 7200, (2024, 3, 28)),
            ],
        )
        .unwrap();

        let steps = StaticStepDirectory::new()
            .with_form(FORM, vec![WorkflowStep::new(1, "Review", "approval")]);
        (db, steps)
    }

    fn service<'a>(db: &'a Database, steps: &'a StaticStepDirectory) -> ReportService<'a> {
        ReportService::new(db, TablePrefix::default(), steps, PeriodResolver::utc())
    }

    #[test]
    fn test_month_report() {
        let (db, steps) = fixture();
        let report = service(&db, &steps)
            .get_report_at(FORM, "month", "all", None, None, now())
            .unwrap();

        assert_eq!(report.dimension(), Dimension::Month);
        match &report.rows {
            ReportRows::Month(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].month_key, "2024-04");
                assert_eq!(rows[0].total_completed, 1);
                assert_eq!(rows[0].avg_duration_hours, 0.5);
                assert_eq!(rows[1].month_key, "2024-03");
                assert_eq!(rows[1].total_completed, 2);
                assert_eq!(rows[1].avg_duration_hours, 1.5);
            }
            other => panic!("unexpected rows: {other:?}"),
        }
    }

    #[test]
    fn test_request_validation_order() {
        let (db, steps) = fixture();
        let service = service(&db, &steps);

        assert!(matches!(
            service.get_report_at(0, "nonsense", "bogus", None, None, now()),
            Err(Error::InvalidForm(0))
        ));
        assert!(matches!(
            service.get_report_at(FORM, "nonsense", "bogus", None, None, now()),
            Err(Error::InvalidDimension(_))
        ));
        assert!(matches!(
            service.get_report_at(FORM, "month", "bogus", None, None, now()),
            Err(Error::InvalidPeriod(_))
        ));
        assert!(matches!(
            service.get_report_at(FORM, "month", "custom", Some("2024-03-01"), None, now()),
            Err(Error::MissingDateRange(_))
        ));
    }

    #[test]
    fn test_custom_period_includes_end_day() {
        let (db, steps) = fixture();
        let report = service(&db, &steps)
            .get_report_at(FORM, "month", "custom", Some("2024-03-01"), Some("2024-03-28"), now())
            .unwrap();
        assert_eq!(report.rows.len(), 1);
        match report.rows {
            ReportRows::Month(rows) => assert_eq!(rows[0].total_completed, 2),
            other => panic!("unexpected rows: {other:?}"),
        }
    }

    #[test]
    fn test_repeated_requests_are_identical() {
        let (db, steps) = fixture();
        let service = service(&db, &steps);
        let first = service
            .get_report_at(FORM, "step", "last_3_months", None, None, now())
            .unwrap();
        let second = service
            .get_report_at(FORM, "step", "last_3_months", None, None, now())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_envelope() {
        let (db, steps) = fixture();
        let service = service(&db, &steps).with_locale(Locale::Es);

        let ok = service.get_report_at(FORM, "month", "all", None, None, now());
        let json = serde_json::to_value(Envelope::from_result(&ok).unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["dimension"], "month");
        assert_eq!(json["data"]["rows"][0]["display_name"], "abril 2024");

        let err = service.get_report_at(FORM, "weekday", "all", None, None, now());
        let json = serde_json::to_value(Envelope::from_result(&err).unwrap()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["data"], "invalid report dimension: weekday");
    }
}
