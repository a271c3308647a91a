// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io;
use std::path::PathBuf;

use config::{Cli, Commands, ExportArgs, InputArgs, ListArgs, PruneArgs};
use entity_field::{write_export, Field, ImportReport};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.as_str()),
    )
    .init();

    let main_column = cli.main.as_deref();

    match &cli.command {
        Commands::Import(args) => run_import(args, main_column),
        Commands::Groups(args) => run_groups(args, main_column),
        Commands::Stats(args) => run_stats(args, main_column),
        Commands::Export(args) => run_export(args, main_column),
        Commands::Prune(args) => run_prune(args, main_column),
        Commands::Ui(args) => run_ui_mode(args, main_column),
    }
}

/// Import every file, in order, into one fresh field
fn load_field(files: &[PathBuf], main_column: Option<&str>) -> Result<(Field, Vec<ImportReport>)> {
    let mut field = Field::new();
    let mut reports = Vec::new();

    for path in files {
        let report = field
            .import_csv(path, main_column)
            .with_context(|| format!("Failed to import {}", path.display()))?;
        reports.push(report);
    }

    Ok((field, reports))
}

fn run_import(args: &ListArgs, main_column: Option<&str>) -> Result<()> {
    println!("📂 Importing {} file(s)...", args.input.files.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (field, reports) = load_field(&args.input.files, main_column)?;

    for report in &reports {
        println!(
            "\n✓ {} (main column: {})",
            report.source.as_deref().unwrap_or("batch"),
            report.main_column
        );
        println!("  Rows read:         {:>8}", report.rows_read);
        println!("  Rows skipped:      {:>8}", report.rows_skipped);
        println!("  New entities:      {:>8}", report.entities_created);
        println!("  New links:         {:>8}", report.edges_created);
        println!("  Groups created:    {:>8}", report.groups_created);
        println!("  Groups merged:     {:>8}", report.groups_absorbed);
    }

    print_overview(&field);
    print_groups(&field, args.limit, args.min_size);
    Ok(())
}

fn run_groups(args: &ListArgs, main_column: Option<&str>) -> Result<()> {
    let (field, _) = load_field(&args.input.files, main_column)?;
    print_groups(&field, args.limit, args.min_size);
    Ok(())
}

fn run_stats(args: &InputArgs, main_column: Option<&str>) -> Result<()> {
    let (field, _) = load_field(&args.files, main_column)?;

    print_overview(&field);

    println!("\nLinks by type");
    println!("{}", "─".repeat(60));
    println!("{:<20} {:<20} {:>8} {:>9}", "From", "To", "Links", "Distinct");
    let links = field.links_by_type();
    for (from, to, type_links) in links.pairs() {
        println!(
            "{:<20} {:<20} {:>8} {:>9}",
            from,
            to,
            type_links.links,
            type_links.distinct_targets()
        );
    }

    println!("\nTypes");
    println!("{}", "─".repeat(60));
    println!("{:<20} {:>9} {:>8} {:>8} {:>9}", "Type", "Entities", "Links", "Types", "Distinct");
    for summary in field.type_summaries() {
        println!(
            "{:<20} {:>9} {:>8} {:>8} {:>9}",
            summary.entity_type,
            summary.entities,
            summary.link_total,
            summary.link_types,
            summary.distinct_targets
        );
    }
    println!();

    Ok(())
}

fn run_export(args: &ExportArgs, main_column: Option<&str>) -> Result<()> {
    let (field, _) = load_field(&args.input.files, main_column)?;

    let export = match field.export_view(args.entity_type.as_deref()) {
        Some(export) => export,
        None => {
            eprintln!("❌ Nothing to export: no linked entities found");
            std::process::exit(1);
        }
    };
    if export.is_empty() {
        eprintln!("⚠️  No entities of type {}", export.entity_type);
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_export(file, &export, args.format)?;
            println!(
                "✓ Exported {} {} entities to {} ({})",
                export.entities.len(),
                export.entity_type,
                path.display(),
                args.format
            );
        }
        None => write_export(io::stdout().lock(), &export, args.format)?,
    }

    Ok(())
}

fn run_prune(args: &PruneArgs, main_column: Option<&str>) -> Result<()> {
    let (mut field, _) = load_field(&args.input.files, main_column)?;

    if args.singles {
        let removed = field.remove_singles();
        println!("✓ Removed {} single entities", removed);
    }
    if let Some(max_size) = args.max_group_size {
        let removed = field.remove_groups_by_size(max_size);
        println!("✓ Removed {} groups of {} members or fewer", removed, max_size);
    }

    field.audit().context("Field is inconsistent after pruning")?;

    print_overview(&field);
    print_groups(&field, args.limit, 0);
    Ok(())
}

fn print_overview(field: &Field) {
    let stats = field.stats();

    println!("\nField Overview");
    println!("{}", "─".repeat(50));
    println!("Entities:      {:>8}", stats.entities);
    println!("Links:         {:>8}", stats.edges);
    println!("Groups:        {:>8}", stats.groups);
    println!("Ungrouped:     {:>8}", stats.ungrouped);
    println!("Largest group: {:>8}", stats.largest_group);
    println!("Types:         {}", stats.entity_types.join(", "));
    println!("{}", "─".repeat(50));
}

fn print_groups(field: &Field, limit: usize, min_size: usize) {
    let groups: Vec<_> = field
        .list_groups(limit)
        .into_iter()
        .filter(|g| g.size >= min_size)
        .collect();

    println!("\nTop {} group(s)", groups.len());
    println!("{}", "─".repeat(50));
    for group in &groups {
        let types: Vec<String> = group
            .types
            .iter()
            .map(|(t, n)| format!("{}×{}", t, n))
            .collect();
        println!("{:<8} {:>6}  {}", group.name, group.size, types.join(" "));
        println!("         {}", group.sample.join(", "));
    }
    println!();
}

#[cfg(feature = "tui")]
fn run_ui_mode(args: &InputArgs, main_column: Option<&str>) -> Result<()> {
    println!("🖥️  Loading Entity Field UI...\n");

    let (field, _) = load_field(&args.files, main_column)?;
    println!("✓ Loaded {} entities in {} groups\n", field.entity_count(), field.group_count());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(&field);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_args: &InputArgs, _main_column: Option<&str>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin entity-field-server --features server");
    std::process::exit(1);
}
