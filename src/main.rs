use anyhow::{bail, Context};
use calwatch::config::Config;
use calwatch::monitor::{LogNotifier, Monitor};
use calwatch::renderer::{ChromiumRenderer, PageRenderer};
use calwatch::service::ScheduleService;
use calwatch::store::DataManager;
use calwatch::logging;
use calwatch::types::{member_url, serialize_events, ScheduleMode};
use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "calwatch")]
#[command(about = "Watches freecalend.com member calendars and notifies on changes")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the periodic monitor loop (runs until Ctrl-C)
    Run,
    /// Show today's schedule for a user; no target lists registered users
    Check { target: Option<String> },
    /// Show the full future schedule for a user; no target lists users
    Calendar { target: Option<String> },
    /// Register a user to monitor
    AddUser {
        /// Numeric member id from the calendar URL
        id: String,
        /// Display name
        name: String,
    },
    /// Unregister a user (by id or name substring)
    RemoveUser { target: String },
    /// Show monitor configuration and registry size
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let data = Arc::new(Mutex::new(DataManager::load(&config.data_dir)?));

    match cli.command {
        Commands::Run => run_monitor(config, data).await?,
        Commands::Check { target } => {
            query_schedule(&config, &data, target, ScheduleMode::TodayOnly).await?
        }
        Commands::Calendar { target } => {
            query_schedule(&config, &data, target, ScheduleMode::AllFuture).await?
        }
        Commands::AddUser { id, name } => {
            if !id.chars().all(|c| c.is_ascii_digit()) || id.is_empty() {
                bail!("user id must be numeric, got '{id}'");
            }
            data.lock().unwrap().add_user(&id, &name);
            println!("✅ now monitoring {name} ({id})");
        }
        Commands::RemoveUser { target } => {
            let mut dm = data.lock().unwrap();
            let Some(user) = dm.find_user(&target).cloned() else {
                bail!("user '{target}' not found");
            };
            let name = dm.remove_user(&user.id).unwrap_or(user.name);
            println!("🗑️ stopped monitoring {name} ({})", user.id);
        }
        Commands::Status => {
            let dm = data.lock().unwrap();
            println!("monitored users:       {}", dm.user_count());
            println!("check interval:        {}h", config.check_interval_hours);
            println!("access pacing:         {}s", config.access_interval_seconds);
            println!(
                "notification target:   {}",
                config.notification_target.as_deref().unwrap_or("(not set)")
            );
        }
    }
    Ok(())
}

async fn run_monitor(config: Config, data: Arc<Mutex<DataManager>>) -> anyhow::Result<()> {
    let renderer = Arc::new(ChromiumRenderer::new(config.screenshots_dir.clone()));
    let service = Arc::new(ScheduleService::new(
        renderer.clone() as Arc<dyn PageRenderer>
    ));
    let monitor = Arc::new(Monitor::new(service, data, Arc::new(LogNotifier), &config));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let loop_monitor = monitor.clone();
    let loop_task = tokio::spawn(async move { loop_monitor.run(shutdown_rx).await });

    info!("monitor started; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    let _ = shutdown_tx.send(true);
    if let Err(e) = loop_task.await {
        error!(error = %e, "monitor task did not finish cleanly");
    }
    renderer.close().await;
    Ok(())
}

async fn query_schedule(
    config: &Config,
    data: &Arc<Mutex<DataManager>>,
    target: Option<String>,
    mode: ScheduleMode,
) -> anyhow::Result<()> {
    let Some(target) = target else {
        print_user_list(data);
        return Ok(());
    };

    let Some(user) = data.lock().unwrap().find_user(&target).cloned() else {
        bail!("user '{target}' not found");
    };

    let renderer = Arc::new(ChromiumRenderer::new(config.screenshots_dir.clone()));
    let service = ScheduleService::new(renderer.clone() as Arc<dyn PageRenderer>);
    let result = service.refresh(&user.id, &user.name, mode).await;
    renderer.close().await;

    match result {
        Ok(events) => {
            let heading = match mode {
                ScheduleMode::TodayOnly => "today's schedule",
                ScheduleMode::AllFuture => "upcoming schedule",
            };
            println!("📅 {} {heading} ({})", user.name, member_url(&user.id));
            if events.is_empty() {
                let placeholder = match mode {
                    ScheduleMode::TodayOnly => "今日の予定はありません。",
                    ScheduleMode::AllFuture => "登録されている今後の予定はありません。",
                };
                println!("{placeholder}");
            } else {
                for event in &events {
                    println!("{event}");
                }
            }
            // Full-schedule queries update the stored fingerprint, same as
            // a batch check would
            if mode == ScheduleMode::AllFuture {
                let text = serialize_events(&events);
                let mut dm = data.lock().unwrap();
                if dm.has_changed(&user.id, &text) {
                    dm.save_all();
                }
            }
            Ok(())
        }
        Err(e) => bail!("failed to fetch schedule for {}: {e}", user.name),
    }
}

fn print_user_list(data: &Arc<Mutex<DataManager>>) {
    let dm = data.lock().unwrap();
    if dm.user_count() == 0 {
        println!("no users registered; use `calwatch add-user <id> <name>`");
        return;
    }
    println!("📋 monitored users:");
    for user in dm.users() {
        println!("  {}: {}", user.id, user.name);
    }
}
