use crate::cli::args::{CliArgs, Command, FilterArgs};
use crate::reports::{ReportStatus, ReportType, ReportView, Selector};

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.base_url.as_deref() {
        crate::utils::validate_base_url(raw)
            .map_err(|e| format!("invalid --base-url '{raw}': {e}"))?;
    }
    if let Some(timeout) = args.timeout {
        crate::utils::parse_timeout_seconds(timeout)
            .map_err(|e| format!("invalid --timeout '{timeout}': {e}"))?;
    }
    if let Some(raw) = args.format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --format '{raw}', expected text or json"));
        }
    }
    match &args.command {
        Command::Reports {
            filters, view_mode, ..
        } => {
            validate_filters(filters)?;
            if let Some(raw) = view_mode.as_deref() {
                if crate::output::ViewMode::parse(raw).is_none() {
                    return Err(format!("invalid --view-mode '{raw}', expected table or card"));
                }
            }
        }
        Command::Frameworks { from, .. } => {
            if !matches!(from.trim().to_lowercase().as_str(), "reports" | "api") {
                return Err(format!("invalid --source '{from}', expected reports or api"));
            }
        }
        Command::Login { access, refresh } => {
            if access.trim().is_empty() || refresh.trim().is_empty() {
                return Err("login requires non-empty --access and --refresh tokens".to_string());
            }
        }
        Command::Summary { .. } | Command::Logout | Command::Init => {}
    }
    Ok(())
}

pub fn validate_filters(filters: &FilterArgs) -> Result<(), String> {
    if let Some(raw) = filters.status.as_deref() {
        raw.parse::<Selector<ReportStatus>>()
            .map_err(|e| format!("invalid --status: {e}"))?;
    }
    if let Some(raw) = filters.report_type.as_deref() {
        raw.parse::<Selector<ReportType>>()
            .map_err(|e| format!("invalid --type: {e}"))?;
    }
    if let Some(raw) = filters.view.as_deref() {
        raw.parse::<Selector<ReportView>>()
            .map_err(|e| format!("invalid --view: {e}"))?;
    }
    Ok(())
}
