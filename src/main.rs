use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ride_insights_lib::dashboard::DashboardView;
use ride_insights_lib::export::CsvDownload;
use ride_insights_lib::metrics::format_optional;
use ride_insights_lib::models::QueryResultTable;
use ride_insights_lib::query_store::NO_SELECTION;
use ride_insights_lib::{init_tracing, to_client_error, AppConfig, Dashboard};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ride-insights")]
#[command(about = "Ride analytics dashboard: KPIs, charts data, named and ad hoc SQL")]
#[command(version)]
struct Cli {
    #[arg(long, short, global = true, value_name = "PATH", help = "Config file (defaults to ./ride-insights.yaml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check database connectivity")]
    Status,
    #[command(about = "List the vehicle types and booking statuses available as filters")]
    Filters,
    #[command(about = "Show KPIs and chart series for a filter selection")]
    Summary {
        #[arg(long = "vehicle", value_name = "TYPE", help = "Vehicle type to include (repeatable; default all)")]
        vehicles: Vec<String>,
        #[arg(long = "status", value_name = "STATUS", help = "Booking status to include (repeatable; default all)")]
        statuses: Vec<String>,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "List predefined queries from the named query file")]
    Queries {
        #[arg(long, value_name = "LABEL", help = "Print the SQL of one query")]
        show: Option<String>,
    },
    #[command(about = "Run SQL against the database and export the result as CSV")]
    Run {
        #[arg(long, conflicts_with = "named", help = "SQL text to run verbatim")]
        sql: Option<String>,
        #[arg(long, value_name = "LABEL", help = "Run a predefined query by label")]
        named: Option<String>,
        #[arg(long, value_name = "PATH", help = "Save the result CSV to this file or directory")]
        out: Option<PathBuf>,
        #[arg(long, help = "Print CSV to stdout instead of a table")]
        csv: bool,
    },
    #[command(about = "Show the embedded report URL")]
    Report {
        #[arg(long, help = "Print iframe markup instead of the bare URL")]
        html: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Err(error) = init_tracing(&config.log_dir) {
        eprintln!("warning: file logging disabled: {}", error);
    }
    let dashboard = Dashboard::from_config(config).context("opening data source")?;

    let code = match cli.command {
        Commands::Status => {
            let status = dashboard.connection_status();
            println!("{}", status.message);
            exit_code(status.connected)
        }
        Commands::Filters => match dashboard.filter_options() {
            Ok(options) => {
                println!("Vehicle Type: {}", options.vehicle_types.join(", "));
                println!("Booking Status: {}", options.booking_statuses.join(", "));
                ExitCode::SUCCESS
            }
            Err(error) => report_failure(error),
        },
        Commands::Summary {
            vehicles,
            statuses,
            format,
        } => {
            let banner = dashboard.connection_status();
            if !banner.connected {
                eprintln!("{}", banner.message);
            }
            let vehicles = (!vehicles.is_empty()).then_some(vehicles);
            let statuses = (!statuses.is_empty()).then_some(statuses);
            match dashboard.view(vehicles, statuses) {
                Ok(view) => {
                    match format {
                        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                        OutputFormat::Text => print_view(&view),
                    }
                    ExitCode::SUCCESS
                }
                Err(error) => report_failure(error),
            }
        }
        Commands::Queries { show } => {
            let store = dashboard.named_queries()?;
            match show {
                Some(label) => println!("{}", store.lookup(&label)),
                None => {
                    for choice in store.choices() {
                        println!("{}", choice);
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Commands::Run { sql, named, out, csv } => {
            let outcome = match (sql, named) {
                (Some(sql), _) => dashboard.run_query(&sql),
                (None, Some(label)) if label != NO_SELECTION => dashboard.run_named_query(&label),
                _ => Ok(None),
            };
            match outcome {
                Ok(Some(run)) => {
                    let download = run.download();
                    if csv {
                        print!("{}", download.body);
                    } else {
                        print_table(&run.table);
                    }
                    eprintln!("{} rows in {} ms", run.table.row_count(), run.elapsed_ms);
                    if let Some(path) = export_target(out.as_deref(), &download) {
                        download.save(&path)?;
                        eprintln!("Saved {} to {}", download.mime_type, path.display());
                    }
                    ExitCode::SUCCESS
                }
                Ok(None) => {
                    eprintln!("Nothing to run: provide --sql or --named");
                    ExitCode::SUCCESS
                }
                Err(error) => report_failure(error),
            }
        }
        Commands::Report { html } => {
            let embed = dashboard.report_embed();
            if html {
                println!("{}", embed.iframe_html());
            } else {
                println!("{}", embed.url);
            }
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Nothing is written unless the caller asked for a file.
fn export_target(out: Option<&Path>, download: &CsvDownload) -> Option<PathBuf> {
    out.map(|path| download.target_path(path))
}

fn report_failure(error: impl std::fmt::Display) -> ExitCode {
    eprintln!("{}", to_client_error(error));
    ExitCode::FAILURE
}

fn print_view(view: &DashboardView) {
    let kpis = &view.metrics.kpis;
    println!("Key Metrics");
    println!("  Total Rides:            {}", kpis.total_rides);
    println!("  Completed Rides:        {}", kpis.completed_rides);
    println!("  Total Revenue:          {}", view.revenue_display);
    println!("  Avg Ride Distance (km): {}", view.avg_distance_display);

    println!("\nRide Volume Over Time");
    for day in &view.metrics.ride_volume {
        println!("  {}  {}", day.date, day.rides);
    }

    println!("\nBooking Status Breakdown");
    for entry in &view.metrics.status_breakdown {
        println!("  {:<28} {}", entry.status, entry.rides);
    }

    println!("\nRevenue by Payment Method");
    for entry in &view.metrics.revenue_by_payment {
        println!("  {:<28} {:.2}", entry.payment_method, entry.revenue);
    }

    println!("\nAverage Ratings Comparison");
    for (label, value) in view.metrics.ratings.series() {
        println!("  {:<28} {}", label, format_optional(value));
    }
}

fn print_table(table: &QueryResultTable) {
    let rendered = table
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_display_string()).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let widths = table
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            rendered
                .iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect::<Vec<_>>();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(&table.columns));
    println!("{}", widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>().join("-+-"));
    for row in &rendered {
        println!("{}", line(row));
    }
}

#[cfg(test)]
mod tests {
    use super::{export_target, Cli, Commands};
    use clap::Parser;
    use ride_insights_lib::export::{download, CSV_FILE_NAME};
    use ride_insights_lib::models::QueryResultTable;

    #[test]
    fn run_without_out_saves_nothing() {
        let cli = Cli::try_parse_from(["ride-insights", "run", "--sql", "SELECT 1", "--csv"]).expect("parse");
        let Commands::Run { out, csv, .. } = cli.command else {
            panic!("expected run subcommand");
        };
        assert!(csv);
        assert!(out.is_none());
        assert_eq!(export_target(out.as_deref(), &download(&QueryResultTable::default())), None);
    }

    #[test]
    fn run_with_directory_out_uses_default_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = export_target(Some(dir.path()), &download(&QueryResultTable::default()));
        assert_eq!(target, Some(dir.path().join(CSV_FILE_NAME)));
    }

    #[test]
    fn sql_and_named_conflict() {
        assert!(Cli::try_parse_from(["ride-insights", "run", "--sql", "SELECT 1", "--named", "x"]).is_err());
    }
}
