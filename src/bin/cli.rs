//! Categoria CLI - inspect a category dump as a tree or a table
//!
//! Usage: categoria-cli [OPTIONS] <COMMAND>
//!
//! Reads the JSON the catalog service returns for its category listing
//! (bare array or `{"data": [...]}`), then prints the tree, a flat page,
//! one category, or opens an interactive tree browser. Supports JSON output
//! for scripting.

use categoria_lib::catalog::{parse_records, Category, CategoryId};
use categoria_lib::query::{CategoryQuery, SortDirective, StatusFilter};
use categoria_lib::snapshot::CategorySnapshot;
use categoria_lib::{hierarchy, init_logging, settings, utils};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::{Path, PathBuf};

#[path = "cli/tui.rs"]
mod tui;

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "categoria-cli")]
#[command(version, about = "Category hierarchy inspector", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Category dump to read (default: CATEGORIA_RECORDS, then the records-path setting)
    #[arg(long, short, global = true)]
    input: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress warnings about rejected records
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the category tree
    Tree {
        #[command(flatten)]
        filter: FilterArgs,
        /// Only print the first N levels
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Print one page of the flat category table
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Only children of this category
        #[arg(long)]
        parent: Option<CategoryId>,
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,
        /// Rows per page (default: page-size setting)
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Show one category with its ancestors
    Show {
        id: CategoryId,
    },
    /// Counts, depth, orphans and rejected records
    Stats,
    /// Interactive tree browser
    Browse,
    /// Configuration settings
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Case-insensitive match on name or description
    #[arg(long, short)]
    search: Option<String>,
    /// all, active or inactive
    #[arg(long, default_value = "all")]
    status: StatusFilter,
    /// Sort siblings, e.g. sort_order, name:desc (default: default-sort setting, else input order)
    #[arg(long)]
    sort: Option<SortDirective>,
}

impl FilterArgs {
    fn to_query(&self) -> CategoryQuery {
        CategoryQuery {
            search: self.search.clone(),
            status: self.status,
            sort: self.sort.or_else(settings::default_sort),
            ..CategoryQuery::default()
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show all settings
    #[command(alias = "list")]
    Show,
    /// Get a setting value
    Get {
        /// Setting key
        key: String,
    },
    /// Set a setting value (empty value clears optional keys)
    Set {
        /// Setting key
        key: String,
        /// Setting value
        value: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    // Exit cleanly on broken pipe instead of panicking.
    // println! unwraps write results, so `categoria-cli tree | head` would
    // otherwise panic when head closes its stdin.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe") {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();
    init_logging(if cli.verbose { "categoria_lib=debug,info" } else { "warn" });

    if let Err(e) = run_cli(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<(), String> {
    settings::init(settings::default_data_dir());

    // Commands that need no record dump
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "categoria-cli", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Config { cmd } = cli.command {
        return handle_config(cmd, cli.json);
    }

    let input = resolve_input(cli.input.as_deref())?;
    let snapshot = load_snapshot(&input)?;
    if cli.verbose {
        eprintln!("[verbose] Loaded {} categories from {:?}", snapshot.records().len(), input);
    }
    if !cli.quiet {
        for rejected in snapshot.rejected() {
            eprintln!("warning: record #{} skipped: {}", rejected.index, rejected.error);
        }
    }

    match cli.command {
        Commands::Tree { filter, depth } => handle_tree(&snapshot, &filter, depth, cli.json),
        Commands::List { filter, parent, page, page_size } => {
            let query = CategoryQuery {
                parent_id: parent,
                page,
                page_size: page_size.unwrap_or_else(settings::default_page_size_setting),
                ..filter.to_query()
            };
            handle_list(&snapshot, &query, cli.json)
        }
        Commands::Show { id } => handle_show(&snapshot, id, cli.json),
        Commands::Stats => handle_stats(&snapshot, cli.json),
        Commands::Browse => tui::run_tui(snapshot, input),
        Commands::Config { .. } | Commands::Completions { .. } => unreachable!(),
    }
}

fn resolve_input(explicit: Option<&Path>) -> Result<PathBuf, String> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| settings::get_records_path().map(PathBuf::from))
        .ok_or_else(|| format!(
            "No category dump given: pass --input, set {} or run `categoria-cli config set records-path <file>`",
            settings::RECORDS_ENV
        ))
}

pub(crate) fn load_snapshot(path: &Path) -> Result<CategorySnapshot, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    let raw = parse_records(&content)
        .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;
    Ok(CategorySnapshot::from_raw(&raw))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))
}

// ============================================================================
// Handlers
// ============================================================================

/// Filtered, sorted tree cut to `depth` levels when given
fn tree_output(snapshot: &CategorySnapshot, filter: &FilterArgs, depth: Option<usize>) -> Vec<Category> {
    let forest = snapshot.tree_view(&filter.to_query());
    match depth {
        Some(levels) => hierarchy::truncate_depth(&forest, levels),
        None => forest,
    }
}

fn handle_tree(snapshot: &CategorySnapshot, filter: &FilterArgs, depth: Option<usize>, json: bool) -> Result<(), String> {
    let forest = tree_output(snapshot, filter, depth);

    if json {
        println!("{}", to_json(&forest)?);
        return Ok(());
    }

    if forest.is_empty() {
        println!("No categories match.");
        return Ok(());
    }

    for (level, node) in hierarchy::flatten(&forest) {
        println!("{}", tree_line(node, level));
    }
    Ok(())
}

fn tree_line(node: &Category, level: usize) -> String {
    let marker = if node.has_children() { "▼" } else { "•" };
    let mut line = format!("{}{} {} [{}]", "  ".repeat(level), marker, node.name, node.id);
    if let Some(count) = node.products_count {
        line.push_str(&format!(" ({} products)", count));
    }
    if !node.is_active {
        line.push_str(" (inactive)");
    }
    line
}

fn handle_list(snapshot: &CategorySnapshot, query: &CategoryQuery, json: bool) -> Result<(), String> {
    let page = snapshot.table_page(query);

    if json {
        println!("{}", to_json(&page)?);
        return Ok(());
    }

    println!("{:>6}  {:<28}  {:<24}  {:>6}  {:>5}  {:<8}", "ID", "NAME", "SLUG", "PARENT", "ORDER", "STATUS");
    for category in &page.items {
        println!(
            "{:>6}  {}  {}  {:>6}  {:>5}  {:<8}",
            category.id,
            utils::fit_width(&category.name, 28),
            utils::fit_width(&category.slug, 24),
            category.parent_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            category.sort_order,
            if category.is_active { "active" } else { "inactive" },
        );
    }
    println!(
        "Page {}/{} ({} categories)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    Ok(())
}

fn handle_show(snapshot: &CategorySnapshot, id: CategoryId, json: bool) -> Result<(), String> {
    let detail = snapshot.detail(id).ok_or_else(|| format!("Category {} not found", id))?;

    if json {
        println!("{}", to_json(&detail)?);
        return Ok(());
    }

    let category = &detail.category;
    let path: Vec<&str> = detail
        .ancestors
        .iter()
        .map(|a| a.name.as_str())
        .chain(std::iter::once(category.name.as_str()))
        .collect();

    println!("{} [{}]", category.name, category.id);
    println!("  path:        {}", path.join(" > "));
    println!("  slug:        {}", category.slug);
    println!("  status:      {}", if category.is_active { "active" } else { "inactive" });
    println!("  sort order:  {}", category.sort_order);
    println!("  children:    {}", detail.child_count);
    if let Some(parent) = category.parent_id {
        let resolved = snapshot.get(parent).is_some();
        println!("  parent id:   {}{}", parent, if resolved { "" } else { " (not in this batch, shown as root)" });
    }
    if let Some(count) = category.products_count {
        println!("  products:    {}", count);
    }
    if let Some(description) = &category.description {
        println!("  description: {}", utils::ellipsize(description, 120));
    }
    if let Some(image) = &category.image {
        println!("  image:       {}", image);
    }
    if let Some(created) = category.created_at {
        println!("  created:     {}", created.format("%Y-%m-%d %H:%M"));
    }
    if let Some(updated) = category.updated_at {
        println!("  updated:     {}", updated.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn handle_stats(snapshot: &CategorySnapshot, json: bool) -> Result<(), String> {
    let stats = snapshot.stats();

    if json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    println!("categories: {}", stats.total);
    println!("active:     {}", stats.active);
    println!("inactive:   {}", stats.inactive);
    println!("roots:      {}", stats.roots);
    println!("orphans:    {}", stats.orphans);
    println!("max depth:  {}", stats.max_depth);
    println!("rejected:   {}", stats.rejected);
    Ok(())
}

fn handle_config(cmd: ConfigCommands, json: bool) -> Result<(), String> {
    match cmd {
        ConfigCommands::Show => {
            let current = settings::current();
            if json {
                println!("{}", to_json(&current)?);
            } else {
                println!("records-path: {}", settings::get_records_path().as_deref().unwrap_or("not set"));
                println!("page-size:    {}", settings::default_page_size_setting());
                println!("default-sort: {}", settings::default_sort().map(|s| s.to_string()).unwrap_or_else(|| "input order".to_string()));
                println!("bind-addr:    {}", settings::bind_addr());
                if let Some(path) = settings::config_path() {
                    println!("(stored in {})", path.display());
                }
            }
        }
        ConfigCommands::Get { key } => {
            let value: String = match key.as_str() {
                "records-path" => settings::get_records_path().unwrap_or_else(|| "not set".to_string()),
                "page-size" => settings::default_page_size_setting().to_string(),
                "default-sort" => settings::default_sort().map(|s| s.to_string()).unwrap_or_else(|| "input order".to_string()),
                "bind-addr" => settings::bind_addr(),
                _ => return Err(format!("Unknown config key: {}", key)),
            };

            if json {
                println!("{}", serde_json::json!({ key: value }));
            } else {
                println!("{}", value);
            }
        }
        ConfigCommands::Set { key, value } => {
            match key.as_str() {
                "records-path" => settings::set_records_path(Some(value.clone()))?,
                "page-size" => {
                    let size: usize = value.parse().map_err(|_| format!("Invalid page size: {}", value))?;
                    settings::set_default_page_size(size)?
                }
                "default-sort" => settings::set_default_sort(Some(value.clone()))?,
                "bind-addr" => settings::set_bind_addr(value.clone())?,
                _ => return Err(format!("Unknown config key: {}", key)),
            }
            if !json {
                println!("{} = {}", key, if value.is_empty() { "(cleared)" } else { &value });
            }
        }
    }
    Ok(())
}
