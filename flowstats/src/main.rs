//! flowstats - GravityFlow workflow statistics CLI
//!
//! Report completed, approved and pending workflow tasks for one form,
//! grouped by assignee, step, month, or pending step.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use flowstats_core::format::format_hours;
use flowstats_core::{
    Config, Database, DateInterval, Envelope, FeedStepDirectory, Locale, Report, ReportRows,
    ReportService, TablePrefix,
};

#[derive(Parser, Debug)]
#[command(name = "flowstats")]
#[command(about = "Workflow completion statistics for GravityFlow forms")]
#[command(version)]
struct Args {
    /// Form to report on
    #[arg(long)]
    form: i64,

    /// Grouping: assignee, step, month, or pending_by_step
    #[arg(long, default_value = "assignee")]
    dimension: String,

    /// Period: all, today, last_week, last_N_months (N = 1, 3, 6, 12), or custom
    /// (default: report.default_period from the config)
    #[arg(long)]
    period: Option<String>,

    /// First day of a custom period (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,

    /// Last day of a custom period, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,

    /// Database file (default: database.path from the config)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Network table prefix (default: database.table_prefix from the config)
    #[arg(long)]
    prefix: Option<String>,

    /// Multisite blog id (default: database.blog_id from the config)
    #[arg(long)]
    blog_id: Option<u64>,

    /// Month label language (en, es)
    #[arg(long)]
    locale: Option<String>,

    /// Export format (md = markdown, json = JSON envelope)
    #[arg(long)]
    export: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration and database
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = flowstats_core::logging::init(&config.logging).ok();

    if let Some(other) = args.export.as_deref().filter(|f| !matches!(*f, "json" | "md")) {
        anyhow::bail!("Unknown export format: {}. Use 'md' or 'json'", other);
    }

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| config.database.resolved_path());
    if !db_path.exists() {
        anyhow::bail!("Database not found at {}", db_path.display());
    }
    let db = Database::open(&db_path).context("failed to open database")?;

    let base = args
        .prefix
        .as_deref()
        .unwrap_or(&config.database.table_prefix);
    let blog_id = args.blog_id.unwrap_or(config.database.blog_id);
    let prefix = TablePrefix::for_site(base, blog_id).context("invalid table prefix")?;
    let site_span = flowstats_core::logging::site_span(&prefix, &db_path);
    let _site = site_span.enter();

    let locale = match args.locale.as_deref() {
        Some(s) => s.parse::<Locale>().map_err(anyhow::Error::msg)?,
        None => config.report.locale,
    };
    let resolver = config.report.resolver().context("invalid report configuration")?;
    let period = args
        .period
        .clone()
        .unwrap_or_else(|| config.report.default_period.clone());

    let steps = FeedStepDirectory::new(&db, prefix.clone());
    let service = ReportService::new(&db, prefix, &steps, resolver).with_locale(locale);

    let result = service.get_report(
        args.form,
        &args.dimension,
        &period,
        args.from.as_deref(),
        args.to.as_deref(),
    );

    // The JSON envelope carries failures too
    if args.export.as_deref() == Some("json") {
        let envelope = Envelope::from_result(&result)?;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        // Returning keeps the log guard alive until the error line is flushed
        return result.map(|_| ()).context("failed to compute report");
    }

    let report = result.context("failed to compute report")?;
    match args.export.as_deref() {
        Some("md") => print_markdown(&report),
        _ => print_terminal(&report),
    }
    tracing::debug!(export = ?args.export, rows = report.rows.len(), "Report printed");

    Ok(())
}

fn format_bound(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_interval(interval: &DateInterval) -> String {
    if interval.is_unbounded() {
        return "all time".to_string();
    }
    format!("{} to {}", format_bound(interval.start), format_bound(interval.end))
}

fn print_terminal(report: &Report) {
    let title = format!(
        "Form {} by {} ({})",
        report.form_id,
        report.dimension(),
        report.period
    );

    println!();
    println!("╭{}╮", "─".repeat(64));
    println!("│{:^64}│", title);
    println!("╰{}╯", "─".repeat(64));
    println!("  {}", format_interval(&report.interval));
    println!();

    if report.rows.is_empty() {
        println!("  No activity found for this period.");
        println!();
        return;
    }

    match &report.rows {
        ReportRows::Assignee(rows) => {
            println!("  {:<32} {:>9} {:>9} {:>9}", "ASSIGNEE", "COMPLETED", "APPROVED", "AVG");
            for row in rows {
                println!(
                    "  {:<32} {:>9} {:>9} {:>9}",
                    truncate(&row.display_name, 32),
                    row.total_completed,
                    row.total_approved,
                    format_hours(row.avg_duration_hours)
                );
            }
        }
        ReportRows::Step(rows) => {
            println!("  {:<32} {:<12} {:>9} {:>9}", "STEP", "TYPE", "COMPLETED", "AVG");
            for row in rows {
                println!(
                    "  {:<32} {:<12} {:>9} {:>9}",
                    truncate(&row.display_name, 32),
                    truncate(&row.step_type, 12),
                    row.total_completed,
                    format_hours(row.avg_duration_hours)
                );
            }
        }
        ReportRows::Month(rows) => {
            println!("  {:<32} {:>9} {:>9}", "MONTH", "COMPLETED", "AVG");
            for row in rows {
                println!(
                    "  {:<32} {:>9} {:>9}",
                    row.display_name,
                    row.total_completed,
                    format_hours(row.avg_duration_hours)
                );
            }
        }
        ReportRows::PendingByStep(rows) => {
            println!("  {:<32} {:<12} {:>9}", "STEP", "TYPE", "PENDING");
            for row in rows {
                println!(
                    "  {:<32} {:<12} {:>9}",
                    truncate(&row.display_name, 32),
                    truncate(&row.step_type, 12),
                    row.total_pending
                );
            }
        }
    }
    println!();
}

fn print_markdown(report: &Report) {
    println!("# Form {} by {}", report.form_id, report.dimension());
    println!();
    println!("*Period:* {} ({})", report.period, format_interval(&report.interval));
    println!();

    match &report.rows {
        ReportRows::Assignee(rows) => {
            println!("| Assignee | Type | Completed | Approved | Avg hours |");
            println!("|----------|------|-----------|----------|-----------|");
            for row in rows {
                println!(
                    "| {} | {} | {} | {} | {:.1} |",
                    row.display_name,
                    row.assignee_type.as_str(),
                    row.total_completed,
                    row.total_approved,
                    row.avg_duration_hours
                );
            }
        }
        ReportRows::Step(rows) => {
            println!("| Step | Type | Completed | Avg hours |");
            println!("|------|------|-----------|-----------|");
            for row in rows {
                println!(
                    "| {} | {} | {} | {:.1} |",
                    row.display_name, row.step_type, row.total_completed, row.avg_duration_hours
                );
            }
        }
        ReportRows::Month(rows) => {
            println!("| Month | Completed | Avg hours |");
            println!("|-------|-----------|-----------|");
            for row in rows {
                println!(
                    "| {} | {} | {:.1} |",
                    row.display_name, row.total_completed, row.avg_duration_hours
                );
            }
        }
        ReportRows::PendingByStep(rows) => {
            println!("| Step | Type | Pending |");
            println!("|------|------|---------|");
            for row in rows {
                println!(
                    "| {} | {} | {} |",
                    row.display_name, row.step_type, row.total_pending
                );
            }
        }
    }
    println!();
    println!("---");
    println!("*Generated by flowstats*");
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
