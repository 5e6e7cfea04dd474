#![warn(missing_docs)]
//! # chemviz binary
//!
//! Terminal front end for the chemical equipment analytics dashboard.

use std::fmt::Write as _;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chemviz_app::{AppConfig, AppError, Dashboard, HttpTransport};
use chemviz_auth::ProbeVerdict;
use chemviz_core::ThemePreference;
use chemviz_prefs::{JsonFilePreferenceStore, PreferenceStore, TerminalAmbient, ThemeCell};
use chemviz_ui::{DashboardView, StageStatus, UiAuthState, UiState};
use chemviz_upload::{FileRef, UploadResolution};
use clap::{Parser, Subcommand, ValueHint};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "chemviz",
    version = env!("CHEMVIZ_VERSION"),
    about = "Chemical equipment analytics dashboard",
    long_about = None
)]
struct Cli {
    /// Analytics service base URL (overrides CHEMVIZ_API_URL)
    #[arg(long, global = true, value_hint = ValueHint::Url)]
    api_url: Option<String>,

    /// Preference file (overrides CHEMVIZ_PREFS_PATH)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    prefs: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        /// Account identifier
        #[arg(long)]
        user: String,
        /// Account secret
        #[arg(long, env = "CHEMVIZ_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the session and cached statistics
    Logout,
    /// Show session state and the latest statistics
    Status,
    /// Upload an equipment CSV and show the resulting statistics
    Upload {
        /// CSV file to upload
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    /// Print the PDF report URL or download the report
    ExportPdf {
        /// Download the report to this file instead of printing its URL
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// Show or flip the color theme
    Theme {
        /// Switch between light and dark
        #[arg(long)]
        toggle: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let mut config = AppConfig::from_env()?;
    if let Some(base) = cli.api_url.as_deref() {
        config = config.with_api_base(base)?;
    }
    if let Some(path) = cli.prefs {
        config = config.with_prefs_path(path);
    }
    tracing::debug!(
        api = %config.endpoints.base(),
        prefs = %config.prefs_path.display(),
        "configuration loaded"
    );

    let store: Arc<dyn PreferenceStore> = Arc::new(JsonFilePreferenceStore::open(&config.prefs_path)?);
    let transport = HttpTransport::new(config.endpoints.clone(), config.probe_timeout)?;
    let mut dashboard = Dashboard::start(
        config.endpoints,
        store,
        Arc::new(ThemeCell::new()),
        &TerminalAmbient::from_env(),
    );

    match cli.command {
        Command::Login { user, password } => {
            let verdict = dashboard.login(&user, &password, &transport)?;
            if verdict == ProbeVerdict::AdmittedUnverified {
                eprintln!("warning: server did not confirm the credentials; session admitted unverified");
            }
            print!("{}", render(&dashboard.ui_state()));
        }
        Command::Logout => {
            dashboard.logout();
            println!("logged out");
        }
        Command::Status => print!("{}", render(&dashboard.ui_state())),
        Command::Upload { file } => {
            let file = file.map(FileRef::from_path).transpose()?;
            let resolution = dashboard.submit_file(file, &transport)?;
            print!("{}", render(&dashboard.ui_state()));
            return Ok(match resolution {
                UploadResolution::Succeeded | UploadResolution::Ignored => ExitCode::SUCCESS,
                UploadResolution::Failed(_) | UploadResolution::SessionExpired => ExitCode::FAILURE,
            });
        }
        Command::ExportPdf { output: None } => {
            let url = dashboard.export_pdf_url().ok_or(AppError::NoReport)?;
            println!("{url}");
        }
        Command::ExportPdf { output: Some(path) } => {
            let report = dashboard.download_report(&transport)?;
            std::fs::write(&path, &report).map_err(|source| AppError::Output {
                path: path.clone(),
                source,
            })?;
            println!("report saved to {} ({} bytes)", path.display(), report.len());
        }
        Command::Theme { toggle } => {
            let theme = if toggle {
                dashboard.toggle_theme()
            } else {
                dashboard.theme()
            };
            println!("theme: {theme}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

struct Palette {
    heading: &'static str,
    accent: &'static str,
    muted: &'static str,
    reset: &'static str,
}

impl Palette {
    fn for_theme(theme: ThemePreference) -> Self {
        if !io::stdout().is_terminal() {
            return Self {
                heading: "",
                accent: "",
                muted: "",
                reset: "",
            };
        }
        match theme {
            ThemePreference::Dark => Self {
                heading: "\x1b[1;97m",
                accent: "\x1b[96m",
                muted: "\x1b[37m",
                reset: "\x1b[0m",
            },
            ThemePreference::Light => Self {
                heading: "\x1b[1;30m",
                accent: "\x1b[34m",
                muted: "\x1b[90m",
                reset: "\x1b[0m",
            },
        }
    }
}

fn render(state: &UiState) -> String {
    let palette = Palette::for_theme(state.theme);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}chemviz {}{} {}[{} theme]{}",
        palette.heading, state.version, palette.reset, palette.muted, state.theme, palette.reset
    );

    let session = match state.auth {
        UiAuthState::Anonymous => "logged out",
        UiAuthState::Authenticating => "logging in",
        UiAuthState::Authenticated => "logged in",
    };
    let _ = writeln!(out, "session: {session}");
    if let Some(notice) = &state.session_notice {
        let _ = writeln!(out, "notice: {notice}");
    }

    if let Some(message) = &state.upload_message {
        let marker = match state.upload {
            StageStatus::Healthy => "ok",
            StageStatus::Degraded => "failed",
            StageStatus::Running => "busy",
            StageStatus::Idle => "idle",
        };
        let _ = writeln!(out, "upload [{marker}]: {message}");
    }

    render_dashboard(&mut out, &state.dashboard, &palette);
    out
}

fn render_dashboard(out: &mut String, view: &DashboardView, palette: &Palette) {
    let _ = writeln!(
        out,
        "\n{}{}{} equipment units across {}{}{} types",
        palette.accent, view.hero_count, palette.reset, palette.accent, view.hero_types, palette.reset
    );
    if !view.has_data() {
        let _ = writeln!(out, "{}upload a CSV to see statistics{}", palette.muted, palette.reset);
        return;
    }

    let _ = writeln!(out);
    for card in &view.cards {
        let _ = writeln!(
            out,
            "  {:<16} {}{:>12}{}  {}{}{}",
            card.title, palette.accent, card.value, palette.reset, palette.muted, card.caption, palette.reset
        );
    }

    let _ = writeln!(out, "\n{}Equipment type distribution{}", palette.heading, palette.reset);
    for row in &view.distribution {
        let bar = "#".repeat((row.share_percent / 5.0).round() as usize);
        let _ = writeln!(
            out,
            "  {:<16} {:>5} {:>6.1}%  {}{}{}",
            row.label, row.count, row.share_percent, palette.accent, bar, palette.reset
        );
    }

    if let Some(batch) = &view.batch_id {
        let _ = writeln!(out, "\n{}batch {batch}{}", palette.muted, palette.reset);
    }
}
