//! `slots` CLI — inspect availability declarations from the command line.
//!
//! Declarations are read as the scheduling service's JSON (an array of
//! declaration records) from a file or stdin. Output is pretty-printed JSON.
//!
//! ## Usage
//!
//! ```sh
//! # Split one day into available/unavailable ranges per host
//! slots day -i declarations.json --date 2026-03-16 --centers C1,C2
//!
//! # The same for the Monday-Sunday week containing a date
//! slots week -i declarations.json --date 2026-03-18 --centers C1
//!
//! # Which declarations occur on a date (no center filtering)
//! cat declarations.json | slots occurs --date 2026-03-17
//!
//! # Bookable 45-minute slots in the clinic's timezone, minus booked time
//! slots slots -i declarations.json --date 2026-03-16 --centers C1 \
//!     --duration 45 --tz America/New_York --appointments appts.json
//!
//! # Staff and center rosters
//! slots staff -i declarations.json --centers C1 --date 2026-03-16
//! slots centers -i declarations.json
//!
//! # Ask the availability service (AVAILABILITY_API_URL etc. from the environment)
//! slots fetch --center C1 --date 2026-03-16 --duration 30 --mode online
//! ```

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use availability_engine::dst::DstPolicy;
use availability_engine::dto::{
    normalize_appointments, normalize_declarations, AppointmentDto, DeclarationDto,
};
use availability_engine::filter::{filter_by_centers, occurring_on};
use availability_engine::model::{Appointment, AvailabilityDeclaration, DateWindow, TimeRange};
use availability_engine::schedule::DaySchedule;
use availability_engine::slots::consultant_availability;
use availability_engine::{
    day_schedule, project_centers, project_staff, week_schedule, DeliveryMode, EngineConfig,
    HttpScheduleClient, SlotGenerator, SlotQuery,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "slots",
    version,
    about = "Inspect clinic availability declarations and bookable slots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where declarations come from and where output goes.
#[derive(Args)]
struct Files {
    /// Declarations JSON file (reads from stdin if omitted)
    #[arg(short, long)]
    input: Option<String>,
    /// Output file (writes to stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split one day into typed time ranges per host
    Day {
        #[command(flatten)]
        files: Files,
        /// Date to show (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Comma-separated center ids; none selected shows nothing
        #[arg(long, value_delimiter = ',')]
        centers: Vec<String>,
    },
    /// Split the Monday-Sunday week containing a date
    Week {
        #[command(flatten)]
        files: Files,
        /// Any date in the week (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_delimiter = ',')]
        centers: Vec<String>,
    },
    /// List the declarations whose rule occurs on a date
    Occurs {
        #[command(flatten)]
        files: Files,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Cut a day's available consultant ranges into bookable slots
    Slots {
        #[command(flatten)]
        files: Files,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_delimiter = ',')]
        centers: Vec<String>,
        /// Service duration in minutes
        #[arg(long)]
        duration: u32,
        /// IANA timezone of the center's wall-clock times
        #[arg(long, default_value = "UTC")]
        tz: String,
        /// Appointments JSON file; overlapping slots are withheld
        #[arg(long)]
        appointments: Option<String>,
    },
    /// Staff roster for the selected centers
    Staff {
        #[command(flatten)]
        files: Files,
        #[arg(long, value_delimiter = ',')]
        centers: Vec<String>,
        /// Only consider declarations occurring on this date
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Centers referenced by the declarations
    Centers {
        #[command(flatten)]
        files: Files,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Query the availability service for one center and day
    Fetch {
        #[arg(long)]
        center: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        consultant: Option<String>,
        #[arg(long)]
        designation: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Online,
    InPerson,
}

impl From<ModeArg> for DeliveryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Online => DeliveryMode::Online,
            ModeArg::InPerson => DeliveryMode::InPerson,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Day { files, date, centers } => {
            let decls = load_declarations(files.input.as_deref())?;
            let day = day_schedule(&decls, date, &centers);
            write_json(files.output.as_deref(), &day_json(&day))?;
        }
        Commands::Week { files, date, centers } => {
            let decls = load_declarations(files.input.as_deref())?;
            let week = week_schedule(&decls, DateWindow::week_of(date), &centers);
            let days: Vec<Value> = week.iter().map(day_json).collect();
            write_json(files.output.as_deref(), &Value::Array(days))?;
        }
        Commands::Occurs { files, date } => {
            let decls = load_declarations(files.input.as_deref())?;
            let ids: Vec<String> = occurring_on(&decls, date)
                .into_iter()
                .map(|d| d.id)
                .collect();
            write_json(files.output.as_deref(), &json!({ "date": date, "declarations": ids }))?;
        }
        Commands::Slots {
            files,
            date,
            centers,
            duration,
            tz,
            appointments,
        } => {
            if duration == 0 {
                bail!("--duration must be at least 1 minute");
            }
            let tz: Tz = tz
                .parse()
                .map_err(|e| anyhow::anyhow!("Unknown timezone '{}': {}", tz, e))?;
            let decls = load_declarations(files.input.as_deref())?;
            let booked = match appointments.as_deref() {
                Some(path) => load_appointments(path)?,
                None => Vec::new(),
            };

            let day = day_schedule(&decls, date, &centers);
            let ranges: Vec<TimeRange> = day.rows.into_iter().flat_map(|row| row.ranges).collect();
            let consultants =
                consultant_availability(&ranges, date, tz, duration, &booked, DstPolicy::default());
            write_json(files.output.as_deref(), &serde_json::to_value(consultants)?)?;
        }
        Commands::Staff { files, centers, date } => {
            let decls = load_declarations(files.input.as_deref())?;
            let events = on_date(filter_by_centers(&decls, &centers), date);
            let staff = project_staff(&[], &events);
            write_json(files.output.as_deref(), &serde_json::to_value(staff)?)?;
        }
        Commands::Centers { files, date } => {
            let decls = load_declarations(files.input.as_deref())?;
            let centers = project_centers(&on_date(decls, date));
            write_json(files.output.as_deref(), &serde_json::to_value(centers)?)?;
        }
        Commands::Fetch {
            center,
            date,
            duration,
            consultant,
            designation,
            mode,
            output,
        } => {
            let config = EngineConfig::from_env();
            if !config.is_configured() {
                bail!("Availability service not configured: set AVAILABILITY_API_URL and SCHEDULE_API_URL");
            }
            let client = HttpScheduleClient::new(&config)
                .context("Failed to build availability client")?;
            let generator = SlotGenerator::new(Arc::new(client), config.timezone);

            let mut query = SlotQuery::for_center(center, DateWindow::day(date), duration);
            if let Some(id) = consultant {
                query = query.with_consultant(id);
            }
            if let Some(designation) = designation {
                query = query.with_designation(designation);
            }
            if let Some(mode) = mode {
                query = query.with_delivery_mode(mode.into());
            }

            info!("Fetching slots for {}", date);
            let state = generator.fetch_and_wait(query).await;
            if let Some(error) = state.error {
                bail!("Failed to load slots: {}", error);
            }
            write_json(output.as_deref(), &serde_json::to_value(state.consultants)?)?;
        }
    }

    Ok(())
}

fn on_date(
    decls: Vec<AvailabilityDeclaration>,
    date: Option<NaiveDate>,
) -> Vec<AvailabilityDeclaration> {
    match date {
        Some(date) => occurring_on(&decls, date),
        None => decls,
    }
}

fn day_json(day: &DaySchedule) -> Value {
    let rows: Vec<Value> = day
        .rows
        .iter()
        .map(|row| {
            json!({
                "hostType": row.host.host_type,
                "hostId": row.host.host_id,
                "ranges": row.ranges.iter().map(range_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "date": day.date, "rows": rows })
}

fn range_json(range: &TimeRange) -> Value {
    json!({
        "start": range.start_time.to_string(),
        "end": range.end_time.to_string(),
        "available": range.is_available,
        "title": range.title,
        "declarationId": range.source.id,
    })
}

fn load_declarations(path: Option<&str>) -> Result<Vec<AvailabilityDeclaration>> {
    let raw = read_input(path)?;
    let dtos: Vec<DeclarationDto> =
        serde_json::from_str(&raw).context("Failed to parse declarations JSON")?;
    let total = dtos.len();
    let decls = normalize_declarations(dtos);
    debug!("Loaded {} of {} declarations", decls.len(), total);
    Ok(decls)
}

fn load_appointments(path: &str) -> Result<Vec<Appointment>> {
    let raw = read_input(Some(path))?;
    let dtos: Vec<AppointmentDto> =
        serde_json::from_str(&raw).context("Failed to parse appointments JSON")?;
    Ok(normalize_appointments(dtos))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json(path: Option<&str>, value: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            std::fs::write(path, content + "\n")
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
