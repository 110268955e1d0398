//! Pulse CLI - Command-line interface for Habit Pulse
//!
//! Commands:
//! - add / complete / toggle: manage habits in a JSON store file
//! - import: merge a habit export into the store
//! - report: progress report from the store or from an export file
//! - summary: aggregate statistics
//! - reminder: attach a reminder schedule to a habit
//! - remind: upcoming reminder times
//! - validate: validate a habit export
//! - doctor: diagnose configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use habit_pulse::analyzer::{parse_utc_offset, FixedClock};
use habit_pulse::pipeline::{habits_to_report, PulseProcessor};
use habit_pulse::reminder::{Reminder, ReminderSchedule};
use habit_pulse::schema::{ExportParser, SCHEMA_VERSION};
use habit_pulse::store::HabitStore;
use habit_pulse::types::{Habit, HabitFrequency};
use habit_pulse::{HabitError, PRODUCER_NAME, PULSE_VERSION};

/// Pulse - streaks, completion rates and reminders for habit tracking
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Track habits and compute streak statistics", long_about = None)]
struct Cli {
    /// Habit store file
    #[arg(long, global = true, default_value = "habits.json")]
    store: PathBuf,

    /// Reference day (YYYY-MM-DD); defaults to the current day
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// User's UTC offset (e.g. "+02:00", "UTC")
    #[arg(long, global = true, default_value = "UTC")]
    utc_offset: String,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a habit to the store
    Add {
        /// Habit name
        #[arg(long)]
        name: String,

        /// Recurrence
        #[arg(long, default_value = "daily")]
        frequency: FrequencyArg,

        /// Reminder time (HH:MM)
        #[arg(long)]
        reminder: Option<String>,

        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Mark a habit completed
    Complete {
        /// Habit id
        #[arg(long)]
        habit: u64,

        /// Completion day (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Notes attached to the completion
        #[arg(long)]
        notes: Option<String>,
    },

    /// Toggle a habit's completion for a day
    Toggle {
        /// Habit id
        #[arg(long)]
        habit: u64,

        /// Day to toggle (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Merge a habit export into the store
    Import {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print a progress report
    Report {
        /// Report on an export file instead of the store (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// Print aggregate statistics
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Attach a reminder to a habit
    Reminder {
        /// Habit id
        #[arg(long)]
        habit: u64,

        /// Recurrence
        #[arg(long, default_value = "daily")]
        kind: ReminderKindArg,

        /// Time of day (HH:MM); the minute is used for hourly reminders
        #[arg(long)]
        time: String,

        /// Weekdays for weekly and custom reminders (e.g. mon,thu)
        #[arg(long, value_delimiter = ',')]
        weekdays: Vec<String>,

        /// Day of month for monthly reminders
        #[arg(long)]
        day: Option<u32>,
    },

    /// List upcoming reminders
    Remind {
        /// Number of upcoming times per habit
        #[arg(long, default_value = "1")]
        count: usize,
    },

    /// Validate a habit export
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl From<FrequencyArg> for HabitFrequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => HabitFrequency::Daily,
            FrequencyArg::Weekly => HabitFrequency::Weekly,
            FrequencyArg::Monthly => HabitFrequency::Monthly,
            FrequencyArg::Custom => HabitFrequency::Custom,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReminderKindArg {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Custom,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Resolved global options
struct Context {
    store_path: PathBuf,
    today: Option<NaiveDate>,
    utc_offset: String,
}

impl Context {
    fn processor(&self) -> Result<PulseProcessor<FixedClock>, PulseCliError> {
        let offset = parse_utc_offset(&self.utc_offset)?;
        let clock = match self.today {
            Some(date) => FixedClock::on_local(date, &offset),
            None => FixedClock(Utc::now()),
        };
        let mut processor = PulseProcessor::with_clock(clock, offset);

        if self.store_path.exists() {
            let json = fs::read_to_string(&self.store_path)?;
            processor.load_store(&json)?;
            debug!(path = %self.store_path.display(), "loaded store");
        }
        Ok(processor)
    }

    fn save(&self, processor: &PulseProcessor<FixedClock>) -> Result<(), PulseCliError> {
        fs::write(&self.store_path, processor.save_store()?)?;
        info!(path = %self.store_path.display(), "saved store");
        Ok(())
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    let ctx = Context {
        store_path: cli.store,
        today: cli.today,
        utc_offset: cli.utc_offset,
    };

    match cli.command {
        Commands::Add {
            name,
            frequency,
            reminder,
            description,
        } => cmd_add(&ctx, name, frequency.into(), reminder, description),

        Commands::Complete { habit, date, notes } => {
            let mut processor = ctx.processor()?;
            let day = date.unwrap_or_else(|| processor.analyzer().today());
            processor.store_mut().mark_completed(habit, day, notes)?;
            ctx.save(&processor)?;
            println!("Habit {habit} completed on {day}");
            Ok(())
        }

        Commands::Toggle { habit, date } => {
            let mut processor = ctx.processor()?;
            let day = date.unwrap_or_else(|| processor.analyzer().today());
            let done = processor.store_mut().toggle_completion(habit, day)?;
            ctx.save(&processor)?;
            let state = if done { "completed" } else { "not completed" };
            println!("Habit {habit} is now {state} on {day}");
            Ok(())
        }

        Commands::Import { input } => {
            let mut processor = ctx.processor()?;
            let count = processor.import_export(&read_input(&input)?)?;
            ctx.save(&processor)?;
            println!("Imported {count} habits");
            Ok(())
        }

        Commands::Report { input, format } => cmd_report(&ctx, input.as_deref(), format),

        Commands::Summary { json } => cmd_summary(&ctx, json),

        Commands::Reminder {
            habit,
            kind,
            time,
            weekdays,
            day,
        } => cmd_reminder(&ctx, habit, kind, &time, &weekdays, day),

        Commands::Remind { count } => cmd_remind(&ctx, count),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { json } => cmd_doctor(&ctx, json),
    }
}

fn cmd_add(
    ctx: &Context,
    name: String,
    frequency: HabitFrequency,
    reminder: Option<String>,
    description: Option<String>,
) -> Result<(), PulseCliError> {
    let mut processor = ctx.processor()?;

    let mut habit = Habit::new(name, frequency, Utc::now());
    if let Some(time) = reminder {
        habit = habit.with_reminder(parse_time(&time)?);
    }
    if let Some(description) = description {
        habit = habit.with_description(description);
    }

    let id = processor.store_mut().insert_habit(habit);
    ctx.save(&processor)?;
    println!("Added habit {id}");
    Ok(())
}

fn cmd_report(ctx: &Context, input: Option<&Path>, format: OutputFormat) -> Result<(), PulseCliError> {
    let pretty = match input {
        Some(path) => habits_to_report(read_input(path)?, ctx.today, ctx.utc_offset.clone())?,
        None => ctx.processor()?.report()?,
    };

    match format {
        OutputFormat::JsonPretty => println!("{pretty}"),
        OutputFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(&pretty)?;
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(())
}

fn cmd_summary(ctx: &Context, json: bool) -> Result<(), PulseCliError> {
    let processor = ctx.processor()?;
    let summary = processor.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Statistics as of {}", processor.analyzer().today());
        println!("=========================");
        println!("Active habits:           {}", summary.total_habits);
        println!("Completed today:         {}", summary.completed_today);
        println!("Total completions:       {}", summary.total_completions);
        println!("Average completion rate: {:.1}%", summary.average_completion_rate);
        println!("Longest streak:          {}", summary.longest_streak);
        println!("Best current streak:     {}", summary.best_current_streak);
    }
    Ok(())
}

fn cmd_reminder(
    ctx: &Context,
    habit_id: u64,
    kind: ReminderKindArg,
    time: &str,
    weekdays: &[String],
    day: Option<u32>,
) -> Result<(), PulseCliError> {
    let mut processor = ctx.processor()?;
    let time = parse_time(time)?;
    let weekdays = weekdays
        .iter()
        .map(|w| {
            w.parse::<Weekday>()
                .map_err(|_| HabitError::DateParseError(format!("weekday '{w}'")))
        })
        .collect::<Result<Vec<Weekday>, HabitError>>()?;

    let schedule = match kind {
        ReminderKindArg::Hourly => ReminderSchedule::Hourly { minute: time.minute() },
        ReminderKindArg::Daily => ReminderSchedule::Daily { time },
        ReminderKindArg::Weekly => ReminderSchedule::Weekly {
            weekday: weekdays.first().copied().ok_or(PulseCliError::MissingArgument("--weekdays"))?,
            time,
        },
        ReminderKindArg::Monthly => ReminderSchedule::Monthly {
            day: day.ok_or(PulseCliError::MissingArgument("--day"))?,
            time,
        },
        ReminderKindArg::Custom => ReminderSchedule::Custom { weekdays, time },
    };

    let id = processor
        .store_mut()
        .insert_reminder(Reminder::new(habit_id, schedule))?;
    ctx.save(&processor)?;
    println!("Added reminder {id} to habit {habit_id}");
    Ok(())
}

fn cmd_remind(ctx: &Context, count: usize) -> Result<(), PulseCliError> {
    let processor = ctx.processor()?;

    for (entry, times) in processor.upcoming_reminders(count) {
        let times: Vec<String> = times
            .iter()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .collect();
        println!("{} ({}): {}", entry.habit.name, entry.habit.id, times.join(", "));
    }
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), PulseCliError> {
    let habits = ExportParser::parse_auto(&read_input(input)?)?;
    let results = ExportParser::validate_all(&habits);

    let report = ValidationReport {
        total_habits: habits.len(),
        valid_habits: habits.len() - results.len(),
        invalid_habits: results.len(),
        errors: results
            .iter()
            .flat_map(|r| {
                r.errors.iter().map(move |e| ValidationErrorDetail {
                    index: r.index,
                    habit_id: r.habit_id,
                    error: e.to_string(),
                })
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total habits:   {}", report.total_habits);
        println!("Valid habits:   {}", report.valid_habits);
        println!("Invalid habits: {}", report.invalid_habits);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Habit {} (index {}): {}", err.habit_id, err.index, err.error);
            }
        }
    }

    if report.invalid_habits > 0 {
        Err(PulseCliError::ValidationFailed(report.invalid_habits))
    } else {
        Ok(())
    }
}

fn cmd_doctor(ctx: &Context, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "pulse_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Habit Pulse version {}", PULSE_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Export schema: {}", SCHEMA_VERSION),
        },
    ];

    checks.push(match parse_utc_offset(&ctx.utc_offset) {
        Ok(offset) => DoctorCheck {
            name: "utc_offset".to_string(),
            status: CheckStatus::Ok,
            message: format!("Using UTC offset {}", offset),
        },
        Err(e) => DoctorCheck {
            name: "utc_offset".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    checks.push(if ctx.store_path.exists() {
        match fs::read_to_string(&ctx.store_path) {
            Ok(content) => match HabitStore::from_json(&content) {
                Ok(store) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Store file valid ({} active habits)",
                        store.total_active_habits()
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid store JSON: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read store file: {}", e),
            },
        }
    } else {
        DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Warning,
            message: "Store file does not exist (it is created on first write)".to_string(),
        }
    });

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (ready for '--input -')"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, HabitError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| HabitError::DateParseError(format!("time '{value}': {e}")))
}

fn read_input(path: &Path) -> Result<String, PulseCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Habit(HabitError),
    Json(serde_json::Error),
    MissingArgument(&'static str),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<HabitError> for PulseCliError {
    fn from(e: HabitError) -> Self {
        PulseCliError::Habit(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Habit(HabitError::HabitNotFound(id)) => CliError {
                code: "HABIT_NOT_FOUND".to_string(),
                message: format!("No habit with id {id}"),
                hint: Some("Run 'pulse report' to list habit ids".to_string()),
            },
            PulseCliError::Habit(HabitError::ReminderNotFound(id)) => CliError {
                code: "REMINDER_NOT_FOUND".to_string(),
                message: format!("No reminder with id {id}"),
                hint: None,
            },
            PulseCliError::Habit(HabitError::InvalidTimezone(offset)) => CliError {
                code: "INVALID_UTC_OFFSET".to_string(),
                message: format!("Cannot parse UTC offset '{offset}'"),
                hint: Some("Use a form like +02:00, -0530 or UTC".to_string()),
            },
            PulseCliError::Habit(e) => CliError {
                code: "HABIT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pulse validate' on the input for details".to_string()),
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::MissingArgument(flag) => CliError {
                code: "MISSING_ARGUMENT".to_string(),
                message: format!("This reminder kind needs {flag}"),
                hint: Some("Run 'pulse reminder --help' for the flags each kind uses".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} habits failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_habits: usize,
    valid_habits: usize,
    invalid_habits: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    habit_id: u64,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
