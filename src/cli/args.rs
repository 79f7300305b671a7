use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "compliance-reports",
    version,
    about = "compliance report browser and reference-data client",
    long_about = "Browse, filter and summarize compliance reports, and fetch framework reference data from the compliance API.\n\nExamples:\n  compliance-reports reports --file reports.json --status ready\n  compliance-reports reports --file reports.json --search soc --view-mode card\n  compliance-reports login --access <TOKEN> --refresh <TOKEN>\n  compliance-reports frameworks --source api --base-url https://api.example.com\n\nTip: Use --config to persist settings and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "format",
        visible_alias = "output-format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.compliance-reports/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "base-url",
        visible_alias = "api",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Compliance API base URL (overrides COMPLIANCE_API_BASE_URL)."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'T',
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        long = "credentials",
        visible_alias = "credentials-file",
        value_name = "FILE",
        global = true,
        help_heading = "Session",
        help = "Credential file (defaults to ~/.compliance-reports/credentials.json)."
    )]
    pub credentials: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List reports matching the given filters.
    Reports {
        #[command(flatten)]
        source: ReportSourceArgs,

        #[command(flatten)]
        filters: FilterArgs,

        #[arg(
            long = "view-mode",
            visible_alias = "vm",
            value_name = "MODE",
            help_heading = "Output",
            help = "Text layout: table or card."
        )]
        view_mode: Option<String>,

        #[arg(
            short = 'x',
            long = "select",
            value_name = "ID",
            action = ArgAction::Append,
            help_heading = "Selection",
            help = "Toggle selection of a report id (repeatable); prints the resulting selection."
        )]
        select: Vec<String>,

        #[arg(
            long = "select-all",
            help_heading = "Selection",
            help = "Toggle selection of every visible report."
        )]
        select_all: bool,
    },

    /// Summarize the whole report collection by status.
    Summary {
        #[command(flatten)]
        source: ReportSourceArgs,
    },

    /// List framework names from the reports file or from the API.
    Frameworks {
        #[command(flatten)]
        source: ReportSourceArgs,

        #[arg(
            short = 'S',
            long = "source",
            value_name = "SOURCE",
            default_value = "reports",
            help_heading = "Input",
            help = "Where frameworks come from: reports or api."
        )]
        from: String,
    },

    /// Store an access/refresh token pair for later API calls.
    Login {
        #[arg(long = "access", value_name = "TOKEN", help = "Access token.")]
        access: String,

        #[arg(long = "refresh", value_name = "TOKEN", help = "Refresh token.")]
        refresh: String,
    },

    /// Forget stored credentials.
    Logout,

    /// Write a default config file if none exists.
    Init,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReportSourceArgs {
    #[arg(
        short = 'f',
        long = "file",
        visible_alias = "reports-file",
        value_name = "FILE",
        help_heading = "Input",
        help = "JSON file holding the report collection."
    )]
    pub file: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(
        short = 'q',
        long = "search",
        visible_alias = "query",
        value_name = "TEXT",
        help_heading = "Filters",
        help = "Case-insensitive search over report id, name, description, frameworks and template."
    )]
    pub search: Option<String>,

    #[arg(
        short = 's',
        long = "status",
        value_name = "STATUS",
        help_heading = "Filters",
        help = "ready, generating, pending, failed or all."
    )]
    pub status: Option<String>,

    #[arg(
        short = 't',
        long = "type",
        value_name = "TYPE",
        help_heading = "Filters",
        help = "readiness, gap_analysis, continuous_monitoring, executive_summary, technical_report, auditor_report or all."
    )]
    pub report_type: Option<String>,

    #[arg(
        short = 'w',
        long = "view",
        value_name = "VIEW",
        help_heading = "Filters",
        help = "executive, technical, auditor or all."
    )]
    pub view: Option<String>,

    #[arg(
        short = 'F',
        long = "framework",
        value_name = "NAME",
        help_heading = "Filters",
        help = "Exact framework name, or all."
    )]
    pub framework: Option<String>,
}
