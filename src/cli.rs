use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use crate::api::ApiClient;
use crate::audio::AlarmEngineHandle;
use crate::camera::SystemVideoDevices;
use crate::channel::{AnalysisEndpoint, WebSocketConnector};
use crate::export::{write_bulk, ReportFilter, SessionReport, BULK_FILE_NAME};
use crate::models::{SessionMode, User};
use crate::monitor::{MonitorController, MonitorEvent, NoticeKind};
use crate::render::{FrameBuffer, FrameRenderer, FrameSurface, PngFileSurface};
use crate::settings::{MonitorSettings, SettingsStore};

/// Operator console for the drowsiness monitoring service
#[derive(Parser, Debug)]
#[command(name = "drowsiness-monitor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: ~/.drowsiness-monitor/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// API base url for this run, e.g. http://localhost:8000
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the access token
    Login {
        username: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored access token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List active drivers that can be monitored
    Drivers,

    /// Watch a driver's analysis stream and sound alarms
    Monitor(MonitorArgs),

    /// Export stored analysis reports as CSV
    Reports(ReportsArgs),
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Driver id to replay through the analysis service
    #[arg(long, conflicts_with = "realtime", required_unless_present = "realtime")]
    driver: Option<i64>,

    /// Live self-test using the logged-in user's camera feed
    #[arg(long)]
    realtime: bool,

    /// Write the session report into this directory when done
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Write the latest frame to this PNG file
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Keep watching after the analysis completes, until Ctrl-C
    #[arg(long)]
    stay_open: bool,
}

#[derive(Args, Debug)]
struct ReportsArgs {
    /// Match first name, last name or username
    #[arg(long)]
    name: Option<String>,

    /// First day to include (YYYY-MM-DD, Lima time)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD, Lima time)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Output file
    #[arg(long, default_value = BULK_FILE_NAME)]
    out: PathBuf,

    /// Print matching reports instead of writing a file
    #[arg(long)]
    list: bool,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let store = SettingsStore::new(cli.settings.unwrap_or_else(SettingsStore::default_path))?;
    let mut settings = store.effective();
    if let Some(api) = cli.api {
        settings.api_base_url = api;
    }

    match cli.command {
        Command::Login { username, password } => login(&store, &settings, &username, password).await,
        Command::Logout => {
            store.set_access_token(None)?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            let user = api_client(&settings)?.current_user().await?;
            println!("{} ({}) - {:?}, {:?}", user.full_name(), user.username, user.role, user.status);
            Ok(())
        }
        Command::Drivers => drivers(&settings).await,
        Command::Monitor(args) => monitor(&settings, args).await,
        Command::Reports(args) => reports(&settings, args).await,
    }
}

fn api_client(settings: &MonitorSettings) -> Result<ApiClient> {
    ApiClient::new(&settings.api_base_url, settings.access_token.clone())
        .context("failed to create API client")
}

async fn login(
    store: &SettingsStore,
    settings: &MonitorSettings,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };
    let mut client = api_client(settings)?;
    let token = client
        .login(username, &password)
        .await
        .context("login failed")?;
    store.set_access_token(Some(token.access_token))?;
    println!("Logged in as {username}. Token saved to {}", store.path().display());
    Ok(())
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn drivers(settings: &MonitorSettings) -> Result<()> {
    let drivers = api_client(settings)?.list_active_drivers().await?;
    if drivers.is_empty() {
        println!("No active drivers.");
    }
    for driver in drivers {
        let video = if driver.has_video_source() { "video" } else { "no video" };
        println!("{:>5}  {:<20} {:<30} {video}", driver.id, driver.username, driver.full_name());
    }
    Ok(())
}

async fn monitor(settings: &MonitorSettings, args: MonitorArgs) -> Result<()> {
    let client = api_client(settings)?;
    let (subject, mode) = if args.realtime {
        (client.current_user().await?, SessionMode::Realtime)
    } else {
        let id = args
            .driver
            .ok_or_else(|| anyhow!("either --driver or --realtime is required"))?;
        (find_driver(&client, id).await?, SessionMode::Recorded)
    };

    let endpoint = match &settings.ws_base_url {
        Some(ws_base) => AnalysisEndpoint::new(ws_base)?,
        None => AnalysisEndpoint::from_api_base(&settings.api_base_url)?,
    };
    let surface: Box<dyn FrameSurface> = match args.frames.or_else(|| settings.frame_output.clone()) {
        Some(path) => Box::new(PngFileSurface::new(path)),
        None => Box::new(FrameBuffer::default()),
    };
    let mut controller = MonitorController::new(
        endpoint,
        Arc::new(WebSocketConnector),
        Arc::new(AlarmEngineHandle::new(settings.alarm_sound(), settings.alarm_volume)),
        Arc::new(SystemVideoDevices::new()),
        FrameRenderer::new(surface),
        settings.malformed_payloads,
    );
    let mut events = controller.subscribe();

    controller.open_session(subject.clone(), mode).await?;
    println!(
        "Monitoring {} ({}). Press Ctrl-C to stop.",
        subject.full_name(),
        mode.as_str()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if ends_watch(&event, args.stay_open) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => log::warn!("skipped {skipped} monitor events"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    let snapshot = controller.snapshot();
    controller.close_session().await?;
    println!(
        "Final: blinks {}, microsleeps {}, yawns {}, yawn time {}s",
        snapshot.blinks, snapshot.microsleeps, snapshot.yawns, snapshot.yawn_duration_secs
    );

    if let Some(dir) = args.export_dir {
        let path = SessionReport::today(&subject, mode, snapshot).write_to(&dir)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

async fn find_driver(client: &ApiClient, id: i64) -> Result<User> {
    let driver = client
        .list_active_drivers()
        .await?
        .into_iter()
        .find(|driver| driver.id == id)
        .ok_or_else(|| anyhow!("no active driver with id {id}"))?;
    if !driver.has_video_source() {
        bail!("driver {} has no video assigned", driver.username);
    }
    Ok(driver)
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::SnapshotUpdated(snapshot) => println!(
            "blinks {:>4}  microsleeps {:>6}  yawns {:>3}  yawn time {:>6}s",
            snapshot.blinks, snapshot.microsleeps, snapshot.yawns, snapshot.yawn_duration_secs
        ),
        MonitorEvent::AlarmFired { trigger } => println!("ALARM {trigger:?}"),
        MonitorEvent::Notice(notice) if notice.kind.is_error() => eprintln!("error: {}", notice.message),
        MonitorEvent::Notice(notice) => println!("{}", notice.message),
        MonitorEvent::ChannelStateChanged(state) => log::info!("channel {}", state.as_str()),
        MonitorEvent::FramePainted | MonitorEvent::SessionClosed { .. } => {}
    }
}

fn ends_watch(event: &MonitorEvent, stay_open: bool) -> bool {
    match event {
        MonitorEvent::SessionClosed { .. } => true,
        MonitorEvent::Notice(notice) => {
            !stay_open && matches!(notice.kind, NoticeKind::Completed | NoticeKind::ConnectionClosed)
        }
        _ => false,
    }
}

async fn reports(settings: &MonitorSettings, args: ReportsArgs) -> Result<()> {
    let reports = api_client(settings)?.list_reports().await?;
    let filter = ReportFilter {
        name: args.name,
        from: args.from,
        to: args.to,
    };
    let selected = filter.apply(&reports);

    if args.list {
        for report in &selected {
            println!(
                "{:>5}  {:<20} blinks {:>4}  microsleeps {:>6}  yawns {:>3}  {}",
                report.id,
                report.username,
                report.blinks_detected,
                report.microsleeps,
                report.yawns_detected,
                report.created_at.as_deref().unwrap_or("-")
            );
        }
        return Ok(());
    }

    if selected.is_empty() {
        bail!("no reports match the filter");
    }
    write_bulk(selected.iter().copied(), &args.out)?;
    println!("{} report(s) written to {}", selected.len(), args.out.display());
    Ok(())
}
