use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{CliArgs, Command, FilterArgs};
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::fetcher::{AuthenticatedFetcher, FetchError, ReqwestTransport, TransportError};
use crate::frameworks;
use crate::output::{self, OutputFormat, ViewMode};
use crate::reports::{self, FilterState, Report, ReportCatalog, ReportSummary, ReportsError, Selection};
use crate::session::{FileCredentialStore, Session, SessionError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no reports file given (use --file or set reports_file in the config)")]
    MissingReportsFile,

    #[error("cannot locate a home directory for {what}; pass it explicitly")]
    NoHomeDir { what: &'static str },

    #[error(transparent)]
    Reports(#[from] ReportsError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Config(String),

    #[error("failed to write output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug)]
struct RunConfig {
    command: Command,
    config_path: Option<PathBuf>,
    base_url: String,
    timeout: usize,
    credentials_path: Option<PathBuf>,
    reports_file: Option<PathBuf>,
    output_format: OutputFormat,
    view_mode: ViewMode,
    no_color: bool,
}

fn build_run_config(
    args: CliArgs,
    cfg: ConfigFile,
    config_path: Option<PathBuf>,
) -> Result<RunConfig, String> {
    let base_url = config::resolve_base_url(args.base_url, &cfg);
    crate::utils::validate_base_url(&base_url)
        .map_err(|e| format!("invalid base URL '{base_url}': {e}"))?;

    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    crate::utils::parse_timeout_seconds(timeout)?;

    let credentials_path = args
        .credentials
        .or(cfg.credentials_file)
        .map(|p| config::expand_tilde(&p))
        .or_else(config::default_credentials_path);

    let file_flag = match &args.command {
        Command::Reports { source, .. }
        | Command::Summary { source }
        | Command::Frameworks { source, .. } => source.file.clone(),
        _ => None,
    };
    let reports_file = file_flag
        .or(cfg.reports_file)
        .map(|p| config::expand_tilde(&p));

    let format_raw = args
        .format
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&format_raw)
        .ok_or_else(|| format!("invalid output format '{format_raw}', expected text or json"))?;

    let view_flag = match &args.command {
        Command::Reports { view_mode, .. } => view_mode.clone(),
        _ => None,
    };
    let view_raw = view_flag
        .or(cfg.view_mode)
        .unwrap_or_else(|| "table".to_string());
    let view_mode = ViewMode::parse(&view_raw)
        .ok_or_else(|| format!("invalid view mode '{view_raw}', expected table or card"))?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    Ok(RunConfig {
        command: args.command,
        config_path,
        base_url,
        timeout,
        credentials_path,
        reports_file,
        output_format,
        view_mode,
        no_color,
    })
}

fn build_filter_state(filters: &FilterArgs) -> Result<FilterState, String> {
    let mut state = FilterState {
        query: filters.search.clone().unwrap_or_default(),
        ..FilterState::default()
    };
    if let Some(raw) = filters.status.as_deref() {
        state.status = raw.parse()?;
    }
    if let Some(raw) = filters.report_type.as_deref() {
        state.report_type = raw.parse()?;
    }
    if let Some(raw) = filters.view.as_deref() {
        state.view = raw.parse()?;
    }
    if let Some(raw) = filters.framework.as_deref() {
        state.framework = raw
            .parse()
            .unwrap_or_else(|never: std::convert::Infallible| match never {});
    }
    Ok(state)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn open_session(run: &RunConfig) -> Result<Arc<Session>, AppError> {
    let path = run
        .credentials_path
        .clone()
        .ok_or(AppError::NoHomeDir {
            what: "the credentials file",
        })?;
    let session = Session::open(Box::new(FileCredentialStore::new(path)))?;
    Ok(Arc::new(session))
}

async fn load_catalog(run: &RunConfig) -> Result<ReportCatalog, AppError> {
    let path = run
        .reports_file
        .as_deref()
        .ok_or(AppError::MissingReportsFile)?;
    let reports = reports::load_reports(path).await?;
    Ok(ReportCatalog::new(reports))
}

async fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let bytes = output::render_json(value).map_err(|source| AppError::Serialize { source })?;
    emit(&bytes).await
}

async fn emit(bytes: &[u8]) -> Result<(), AppError> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(bytes)
        .await
        .map_err(|source| AppError::Output { source })?;
    stdout
        .flush()
        .await
        .map_err(|source| AppError::Output { source })
}

#[derive(Serialize)]
struct ReportsView<'a> {
    filters: Option<String>,
    reports: &'a [&'a Report],
    summary: ReportSummary,
    selected: &'a [String],
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_async(run: RunConfig) -> Result<(), AppError> {
    match run.command.clone() {
        Command::Reports {
            filters,
            select,
            select_all,
            ..
        } => {
            let catalog = load_catalog(&run).await?;
            let state = build_filter_state(&filters).map_err(AppError::Config)?;
            let visible = catalog.filter(&state);

            let mut selection = Selection::default();
            for id in select.iter() {
                selection.toggle(id);
            }
            if select_all {
                selection.toggle_all(&visible);
            }

            match run.output_format {
                OutputFormat::Json => {
                    let view = ReportsView {
                        filters: output::describe_filters(&state),
                        reports: &visible,
                        summary: catalog.summary(),
                        selected: selection.ids(),
                    };
                    emit_json(&view).await
                }
                OutputFormat::Text => {
                    let mut text = String::new();
                    if let Some(desc) = output::describe_filters(&state) {
                        text.push_str(&format!(":: filters   : {desc}\n"));
                    }
                    text.push_str(&format!(
                        ":: showing   : {} of {}\n\n",
                        visible.len(),
                        catalog.reports().len()
                    ));
                    text.push_str(&output::render_reports_text(&visible, run.view_mode));
                    text.push('\n');
                    text.push_str(&output::render_summary_text(&catalog.summary()));
                    if !selection.ids().is_empty() {
                        text.push_str(&format!(
                            "selected ({}): {}\n",
                            selection.ids().len(),
                            selection.ids().join(", ")
                        ));
                    }
                    emit(text.as_bytes()).await
                }
            }
        }
        Command::Summary { .. } => {
            let catalog = load_catalog(&run).await?;
            let summary = catalog.summary();
            match run.output_format {
                OutputFormat::Json => emit_json(&summary).await,
                OutputFormat::Text => emit(output::render_summary_text(&summary).as_bytes()).await,
            }
        }
        Command::Frameworks { from, .. } if from.trim().eq_ignore_ascii_case("api") => {
            let session = open_session(&run)?;
            if session.access_token().is_none() {
                tracing::warn!("not logged in; run `compliance-reports login` first");
            }
            let transport = ReqwestTransport::new(run.timeout)?;
            let fetcher = AuthenticatedFetcher::new(transport, session, &run.base_url);

            let pb = spinner("fetching frameworks");
            let result = frameworks::fetch_frameworks(&fetcher, &run.base_url).await;
            pb.finish_and_clear();
            let list = result?;

            match run.output_format {
                OutputFormat::Json => emit_json(&list).await,
                OutputFormat::Text => emit(output::render_frameworks_text(&list).as_bytes()).await,
            }
        }
        Command::Frameworks { .. } => {
            let catalog = load_catalog(&run).await?;
            match run.output_format {
                OutputFormat::Json => emit_json(catalog.frameworks()).await,
                OutputFormat::Text => {
                    emit(output::render_framework_names_text(catalog.frameworks()).as_bytes())
                        .await
                }
            }
        }
        Command::Login { access, refresh } => {
            let session = open_session(&run)?;
            session.login(access.trim(), refresh.trim())?;
            tracing::info!("credentials stored");
            emit(b"logged in\n").await
        }
        Command::Logout => {
            let session = open_session(&run)?;
            session.invalidate()?;
            emit(b"logged out\n").await
        }
        Command::Init => {
            let path = run
                .config_path
                .clone()
                .or_else(config::default_config_path)
                .ok_or(AppError::NoHomeDir {
                    what: "the config file",
                })?;
            config::ensure_default_config_file(&path).map_err(AppError::Config)?;
            emit(format!("config: {}\n", path.display()).as_bytes()).await
        }
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };
    validation::validate(&args)?;
    init_logging(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg, user_config_path)?;
    if run.no_color {
        colored::control::set_override(false);
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run)).map_err(|e| e.to_string())
}
