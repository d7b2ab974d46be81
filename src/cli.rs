use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pesa")]
#[command(about = "Categorize M-Pesa statement exports", long_about = None)]
pub struct Cli {
    /// Override pesa home directory (config/data subdirs will be created inside it).
    #[arg(long, env = "PESA_HOME")]
    pub home: Option<PathBuf>,

    /// Category store file. Overrides `categories_path` from config.
    #[arg(long, env = "PESA_CATEGORIES")]
    pub categories: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize and categorize a statement, then print it.
    Import(ImportArgs),
    /// Expense totals per category and a payments summary.
    Summary(SummaryArgs),
    /// Write the categorized statement as CSV.
    Export(ExportArgs),
    /// Move one row to a category and learn its details as a keyword.
    Assign(AssignArgs),

    Category(CategoryArgs),
    Keyword(KeywordArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionFilter {
    All,
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Tsv,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// M-Pesa statement CSV.
    pub file: PathBuf,

    #[arg(long, value_enum, default_value_t = DirectionFilter::All)]
    pub direction: DirectionFilter,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    pub file: PathBuf,

    /// Number of top payment recipients to list (defaults to config value).
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub file: PathBuf,

    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct AssignArgs {
    pub file: PathBuf,

    /// Row number as printed by `import`.
    pub row: usize,

    pub category: String,
}

#[derive(Debug, Args)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub cmd: CategoryCmd,
}

#[derive(Debug, Subcommand)]
pub enum CategoryCmd {
    Add { name: String },
    List,
}

#[derive(Debug, Args)]
pub struct KeywordArgs {
    #[command(subcommand)]
    pub cmd: KeywordCmd,
}

#[derive(Debug, Subcommand)]
pub enum KeywordCmd {
    Add { category: String, keyword: String },
}
