use clap::{Args, Parser, Subcommand};
use entity_field::{ExportFormat, DEFAULT_GROUP_LIMIT};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "entity-field")]
#[command(version, about = "Cluster co-occurring CSV values into groups of linked entities")]
pub struct Cli {
    /// Main entity column (defaults to the first column of each file)
    #[arg(long, short, global = true, env = "ENTITY_FIELD_MAIN")]
    pub main: Option<String>,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "ENTITY_FIELD_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import CSV files and report what was created
    Import(ListArgs),
    /// List groups, largest first
    Groups(ListArgs),
    /// Cross-type link statistics
    Stats(InputArgs),
    /// Export the entities of one type
    Export(ExportArgs),
    /// Drop single entities and/or small groups, then report
    Prune(PruneArgs),
    /// Browse groups interactively
    Ui(InputArgs),
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// CSV files, imported in order into one field
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Number of groups to list
    #[arg(long, default_value_t = DEFAULT_GROUP_LIMIT)]
    pub limit: usize,

    /// Hide groups smaller than this
    #[arg(long, default_value_t = 2)]
    pub min_size: usize,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Entity type to export (defaults to the most linked type)
    #[arg(long = "entity-type", short = 't')]
    pub entity_type: Option<String>,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    pub format: ExportFormat,

    /// Output file (defaults to stdout)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Remove entities that are not linked to anything
    #[arg(long)]
    pub singles: bool,

    /// Remove groups with this many members or fewer
    #[arg(long)]
    pub max_group_size: Option<usize>,

    /// Number of groups to list afterwards
    #[arg(long, default_value_t = DEFAULT_GROUP_LIMIT)]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_args() {
        let cli = Cli::parse_from([
            "entity-field",
            "--main",
            "Person",
            "export",
            "a.csv",
            "b.csv",
            "-t",
            "city",
            "--format",
            "json",
        ]);

        assert_eq!(cli.main.as_deref(), Some("Person"));
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.input.files.len(), 2);
                assert_eq!(args.entity_type.as_deref(), Some("city"));
                assert_eq!(args.format, ExportFormat::Json);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_requires_files() {
        assert!(Cli::try_parse_from(["entity-field", "stats"]).is_err());
    }

    #[test]
    fn test_parse_prune_defaults() {
        let cli = Cli::parse_from(["entity-field", "prune", "a.csv", "--singles"]);

        match cli.command {
            Commands::Prune(args) => {
                assert!(args.singles);
                assert_eq!(args.max_group_size, None);
                assert_eq!(args.limit, DEFAULT_GROUP_LIMIT);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
