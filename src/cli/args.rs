use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "collegerec",
    version,
    about = "college recommendation client",
    long_about = "collegerec asks a recommendation service for colleges matching your criteria, prints ranked result cards, and prints two dashboard links filtered to your results when it is safe to do so.\n\nExamples:\n  collegerec --max-price 20000 --min-grad 50 --top-n 15\n  collegerec --msi HSI,HBCU --state TX --focus-pell\n  collegerec --list-states\n  collegerec -o results.html\n\nTip: Use --config to persist your search defaults."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv). RUST_LOG overrides this."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write results and dashboard links to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format (text, json, html). Inferred from the file extension when omitted."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'p',
        long = "max-price",
        value_name = "USD",
        help_heading = "Search",
        help = "Maximum net price per year."
    )]
    pub max_price: Option<u32>,

    #[arg(
        short = 'g',
        long = "min-grad",
        value_name = "PERCENT",
        help_heading = "Search",
        help = "Minimum 6-year graduation rate (0-100)."
    )]
    pub min_grad: Option<u32>,

    #[arg(
        short = 'r',
        long = "min-retention",
        value_name = "PERCENT",
        help_heading = "Search",
        help = "Minimum first-year retention rate (0-100)."
    )]
    pub min_retention: Option<u32>,

    #[arg(
        short = 'N',
        long = "top-n",
        value_name = "N",
        help_heading = "Search",
        help = "Number of results to show (1-200)."
    )]
    pub top_n: Option<u32>,

    #[arg(
        short = 'm',
        long = "msi",
        value_name = "LIST",
        action = ArgAction::Append,
        help_heading = "Search",
        help = "Preferred MSI categories, repeatable or comma-separated (HSI, PBI, AANAPII, ANNHI, HBCU, TRIBAL, NANTI)."
    )]
    pub msi: Vec<String>,

    #[arg(
        short = 's',
        long = "state",
        value_name = "CODE",
        help_heading = "Search",
        help = "Preferred state (two-letter code)."
    )]
    pub state: Option<String>,

    #[arg(
        short = 'P',
        long = "focus-pell",
        help_heading = "Search",
        help = "Rank by Pell recipients' graduation rate."
    )]
    pub focus_pell: bool,

    #[arg(
        short = 'u',
        long = "api",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Service",
        help = "Recommendation service base URL."
    )]
    pub api: Option<String>,

    #[arg(
        short = 'T',
        long = "timeout",
        value_name = "MS",
        help_heading = "Service",
        help = "Per-request timeout in milliseconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "list-states",
        help_heading = "Service",
        help = "Print the state codes known to the service and exit."
    )]
    pub list_states: bool,

    #[arg(
        long = "health",
        help_heading = "Service",
        help = "Check that the service is up and exit."
    )]
    pub health: bool,

    #[arg(
        long = "dashboard-1",
        value_name = "URL",
        help_heading = "Dashboards",
        help = "Base URL of the first dashboard."
    )]
    pub dashboard_1: Option<String>,

    #[arg(
        long = "dashboard-2",
        value_name = "URL",
        help_heading = "Dashboards",
        help = "Base URL of the second dashboard."
    )]
    pub dashboard_2: Option<String>,

    #[arg(
        long = "filter-param",
        value_name = "NAME",
        help_heading = "Dashboards",
        help = "Dashboard filter field that holds institution names."
    )]
    pub filter_param: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Config",
        help = "Path to config file (defaults to ~/.collegerec/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "init-config",
        help_heading = "Config",
        help = "Write a commented default config file if none exists, then exit."
    )]
    pub init_config: bool,
}
