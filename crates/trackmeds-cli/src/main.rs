mod watch;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trackmeds_common::{Medication, MedicationId, SystemClock, TimeOfDay};
use trackmeds_config::ConfigLoader;
use trackmeds_db::SqliteKvStore;
use trackmeds_notify::{ActionId, FireSpec, LocalNotifier};
use trackmeds_scheduler::{
    EventContext, MedicationUpdate, NewMedication, ReminderApp, RouteOutcome,
};

#[derive(Parser)]
#[command(
    name = "trackmeds",
    version,
    about = "TrackMeds - medication reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); overrides config.yml
    #[arg(long, env = "TRACKMEDS_LOG_LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a medication and schedule its reminders
    Add {
        name: String,
        dosage: String,
        /// Daily reminder time (HH:MM); repeat for several
        #[arg(long = "time", required = true)]
        times: Vec<String>,
    },

    /// List medications
    List,

    /// Show one medication
    Show { id: String },

    /// Change a medication's name, dosage, or times
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        dosage: Option<String>,
        /// Replaces every reminder time when given
        #[arg(long = "time")]
        times: Vec<String>,
    },

    /// Turn reminders on for a medication
    Enable { id: String },

    /// Turn reminders off for a medication
    Disable { id: String },

    /// Delete a medication and its reminders
    Delete { id: String },

    /// Show recorded responses
    History {
        /// Only this medication
        id: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the schedule and list live triggers
    Triggers,

    /// Answer a reminder as if its notification button was pressed
    Respond {
        id: String,
        /// The reminder's scheduled time (HH:MM)
        time: String,
        #[arg(value_enum)]
        response: Response,
    },

    /// Deliver reminders as they come due and read responses from stdin
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Response {
    Confirm,
    Snooze,
    Skip,
}

impl From<Response> for ActionId {
    fn from(response: Response) -> Self {
        match response {
            Response::Confirm => ActionId::Confirm,
            Response::Snooze => ActionId::Snooze,
            Response::Skip => ActionId::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = ConfigLoader::new()?;
    let config = config_loader.load()?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .init();

    config_loader.ensure_dirs(&config)?;
    let db_path = config_loader.database_path(&config);
    let kv = Arc::new(
        SqliteKvStore::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?,
    );
    let notifier = Arc::new(LocalNotifier::new());
    let clock = Arc::new(SystemClock);

    let app = ReminderApp::new(config, kv, notifier.clone(), clock.clone())
        .with_prompts(Arc::new(watch::ConsolePrompts));

    let result = run(cli.command, &app, notifier, clock).await;
    app.shutdown().await?;
    result
}

async fn run(
    command: Commands,
    app: &ReminderApp,
    notifier: Arc<LocalNotifier>,
    clock: Arc<SystemClock>,
) -> Result<()> {
    match command {
        Commands::Add {
            name,
            dosage,
            times,
        } => {
            let med = app
                .medications
                .add_medication(NewMedication {
                    name,
                    dosage,
                    times,
                })
                .await?;
            println!("Added {}", med.id);
            print_medication(&med);
        }
        Commands::List => {
            let meds = app.medications.medications().await;
            if meds.is_empty() {
                println!("No medications. Add one with `trackmeds add`.");
            }
            for med in &meds {
                print_medication(med);
            }
        }
        Commands::Show { id } => {
            let med = app.medications.medication(&MedicationId::from_str(id)).await?;
            print_medication(&med);
            println!("  added {}", med.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        }
        Commands::Edit {
            id,
            name,
            dosage,
            times,
        } => {
            let update = MedicationUpdate {
                name,
                dosage,
                times: (!times.is_empty()).then_some(times),
            };
            let med = app
                .medications
                .update_medication(&MedicationId::from_str(id), update)
                .await?;
            print_medication(&med);
        }
        Commands::Enable { id } => {
            let med = app
                .medications
                .set_enabled(&MedicationId::from_str(id), true)
                .await?;
            print_medication(&med);
        }
        Commands::Disable { id } => {
            let med = app
                .medications
                .set_enabled(&MedicationId::from_str(id), false)
                .await?;
            print_medication(&med);
        }
        Commands::Delete { id } => {
            let id = MedicationId::from_str(id);
            app.medications.delete_medication(&id).await?;
            println!("Deleted {id}");
        }
        Commands::History { id, json } => {
            let history = match id {
                Some(id) => app.medications.history_for(&MedicationId::from_str(id)).await,
                None => app.store.history_or_empty().await,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.is_empty() {
                println!("No responses recorded.");
            } else {
                for entry in &history {
                    println!(
                        "{}  {}  {:<8} {}",
                        entry.action_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                        entry.scheduled_time,
                        entry.action,
                        entry.medication_id
                    );
                }
            }
        }
        Commands::Triggers => {
            app.init().await?;
            let triggers = app.scheduler.scheduled_triggers().await?;
            if triggers.is_empty() {
                println!("No reminders scheduled.");
            }
            for trigger in &triggers {
                let kind = match trigger.fire {
                    FireSpec::Daily { .. } => "daily",
                    FireSpec::Once { .. } => "once",
                };
                println!(
                    "{:<48} {:<5} next {}",
                    trigger.id,
                    kind,
                    trigger.fire.fire_at().with_timezone(&Local).format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Respond { id, time, response } => {
            let time: TimeOfDay = time.parse()?;
            let event =
                watch::response_event(app, &MedicationId::from_str(id), time, response.into())
                    .await;
            match app.router.dispatch(event, EventContext::Background).await {
                RouteOutcome::Dropped(e) => return Err(e.into()),
                outcome => println!("{}", watch::describe(&outcome)),
            }
        }
        Commands::Watch => watch::run(app, notifier, clock).await?,
    }

    Ok(())
}

fn print_medication(med: &Medication) {
    let times: Vec<String> = med.times.iter().map(ToString::to_string).collect();
    println!(
        "{}  {}  [{}]  {}",
        med.id,
        med.summary(),
        times.join(", "),
        if med.enabled { "enabled" } else { "disabled" }
    );
}
