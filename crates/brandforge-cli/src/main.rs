//! BrandForge CLI - brand identity generation from the terminal

use std::path::{Path, PathBuf};

use brandforge_core::config::Config;
use brandforge_core::domain::{AssetType, BusinessInput, GeneratedAsset, Project, Strategy};
use brandforge_core::generation::AssetRequest;
use brandforge_core::health::{self, HealthStatus};
use brandforge_core::service::BrandService;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;

#[derive(Parser)]
#[command(name = "brandforge")]
#[command(author, version, about = "AI brand identity generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new brand project
    New {
        /// Business name
        name: String,

        /// What the business does
        #[arg(short, long)]
        description: String,

        #[arg(long)]
        industry: Option<String>,

        /// Target audience
        #[arg(long)]
        audience: Option<String>,

        /// Core values, comma separated
        #[arg(long, value_delimiter = ',')]
        values: Vec<String>,

        /// Preferred visual style
        #[arg(long)]
        style: Option<String>,

        /// Preferred colors
        #[arg(long)]
        colors: Option<String>,

        /// Business stage (startup, growth, established)
        #[arg(long)]
        stage: Option<String>,

        /// Special requirements
        #[arg(long)]
        requirements: Option<String>,
    },

    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Generate (or regenerate) the brand strategy for a project
    Strategy {
        project_id: String,

        /// Show the stored strategy instead of generating
        #[arg(long)]
        show: bool,

        /// List every stored strategy version
        #[arg(long, conflicts_with = "show")]
        history: bool,
    },

    /// Refine the brand strategy with a free-form request
    Refine { project_id: String, request: String },

    /// Generate a single asset
    Asset {
        project_id: String,

        /// Asset type (e.g. logo, business_card)
        asset_type: String,

        #[arg(long, default_value = "primary")]
        variant: String,

        /// Extra direction for this asset
        #[arg(long)]
        context: Option<String>,
    },

    /// Generate a package of assets
    Package {
        project_id: String,

        /// Asset types, comma separated (defaults to the configured package)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
    },

    /// List generated assets for a project
    Assets { project_id: String },

    /// Export the brand kit to a directory
    Export { project_id: String, dir: PathBuf },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check system health
    Doctor,
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List all projects
    List,
    /// Show project details
    Show { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Reset to defaults
    Reset,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_directive = if cli.quiet {
        "brandforge=warn"
    } else {
        "brandforge=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        report_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Config { action } => cmd_config(action, format),
        Commands::Doctor => cmd_doctor(format, quiet).await,
        command => {
            let config = Config::load()?;
            let service = BrandService::open(&config).await?;
            debug!(can_generate = service.can_generate(), "Service ready");
            dispatch(&service, command, format, quiet).await
        }
    }
}

async fn dispatch(
    service: &BrandService,
    command: Commands,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::New {
            name,
            description,
            industry,
            audience,
            values,
            style,
            colors,
            stage,
            requirements,
        } => {
            let mut input = BusinessInput::new(name, description).with_values(values);
            if let Some(industry) = industry {
                input = input.with_industry(industry);
            }
            if let Some(audience) = audience {
                input = input.with_target_audience(audience);
            }
            if let Some(style) = style {
                input = input.with_style(style);
            }
            if let Some(colors) = colors {
                input = input.with_colors(colors);
            }
            input.business_stage = stage;
            input.special_requirements = requirements;
            cmd_new(service, input, format, quiet).await
        }
        Commands::Projects { action } => match action {
            ProjectAction::List => cmd_projects_list(service, format).await,
            ProjectAction::Show { id } => cmd_projects_show(service, &id, format).await,
        },
        Commands::Strategy {
            project_id,
            show,
            history,
        } => {
            if history {
                let versions = service.strategy_history(&project_id).await?;
                if format == OutputFormat::Json {
                    return print_json(&versions);
                }
                for s in &versions {
                    println!(
                        "v{:<3} {}  confidence {:.2}  refinements {}",
                        s.version,
                        s.updated_at.format("%Y-%m-%d %H:%M"),
                        s.overall_confidence,
                        s.refinements.len()
                    );
                }
                return Ok(());
            }
            let strategy = if show {
                service.get_strategy(&project_id).await?
            } else {
                if !quiet && format == OutputFormat::Text {
                    println!("Generating brand strategy...");
                }
                service.generate_strategy(&project_id).await?
            };
            print_strategy(&strategy, format)
        }
        Commands::Refine {
            project_id,
            request,
        } => {
            let strategy = service.refine_strategy(&project_id, &request).await?;
            print_strategy(&strategy, format)
        }
        Commands::Asset {
            project_id,
            asset_type,
            variant,
            context,
        } => {
            let mut request = AssetRequest::new(parse_asset_type(&asset_type)?).with_variant(variant);
            if let Some(context) = context {
                request = request.with_context(context);
            }
            if !quiet && format == OutputFormat::Text {
                println!("Generating {}...", request.asset_type.label());
            }
            let asset = service.generate_asset(&project_id, request).await?;
            if format == OutputFormat::Json {
                return print_json(&asset_summary(&asset));
            }
            print_asset_line(&asset);
            Ok(())
        }
        Commands::Package { project_id, types } => {
            let parsed = types
                .iter()
                .map(|t| parse_asset_type(t))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let requested = (!parsed.is_empty()).then_some(parsed.as_slice());
            if !quiet && format == OutputFormat::Text {
                let count = requested.map_or(service.package_types().len(), <[AssetType]>::len);
                println!("Generating package of {} asset(s)...", count);
            }
            let package = service.generate_package(&project_id, requested).await?;
            if format == OutputFormat::Json {
                let assets: Vec<_> = package.assets.iter().map(asset_summary).collect();
                return print_json(&json!({
                    "project_id": package.project_id,
                    "assets": assets,
                    "placeholders": package.placeholder_count(),
                }));
            }
            for asset in &package.assets {
                print_asset_line(asset);
            }
            if !quiet {
                println!();
                println!(
                    "{} asset(s), {} placeholder(s)",
                    package.len(),
                    package.placeholder_count()
                );
            }
            Ok(())
        }
        Commands::Assets { project_id } => {
            let assets = service.list_assets(&project_id).await?;
            if format == OutputFormat::Json {
                let summaries: Vec<_> = assets.iter().map(asset_summary).collect();
                return print_json(&summaries);
            }
            if assets.is_empty() {
                if !quiet {
                    println!("No assets yet. Generate some with: brandforge package {}", project_id);
                }
                return Ok(());
            }
            for asset in &assets {
                print_asset_line(asset);
            }
            Ok(())
        }
        Commands::Export { project_id, dir } => {
            cmd_export(service, &project_id, &dir, format, quiet).await
        }
        Commands::Config { action } => cmd_config(action, format),
        Commands::Doctor => cmd_doctor(format, quiet).await,
    }
}

async fn cmd_new(
    service: &BrandService,
    input: BusinessInput,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let project = service.create_project(input).await?;

    if format == OutputFormat::Json {
        return print_json(&project);
    }
    if quiet {
        println!("{}", project.id);
    } else {
        println!("Created project: {}", project.business_name());
        println!("  ID: {}", project.id);
        println!("  Status: {}", project.status.as_str());
        println!();
        println!("Next: brandforge strategy {}", project.id);
    }
    Ok(())
}

async fn cmd_projects_list(service: &BrandService, format: OutputFormat) -> anyhow::Result<()> {
    let projects = service.list_projects().await?;

    if format == OutputFormat::Json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects found. Create one with: brandforge new <name> -d <description>");
        return Ok(());
    }
    println!("{:<36}  {:<24}  {:<12}  CREATED", "ID", "NAME", "STATUS");
    for p in &projects {
        println!(
            "{:<36}  {:<24}  {:<12}  {}",
            p.id,
            truncate(p.business_name(), 24),
            p.status.as_str(),
            p.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn cmd_projects_show(
    service: &BrandService,
    id: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let project = service.get_project(id).await?;
    let strategy = service.store().get_strategy(id).await?;
    let assets = service.list_assets(id).await?;

    if format == OutputFormat::Json {
        let summaries: Vec<_> = assets.iter().map(asset_summary).collect();
        return print_json(&json!({
            "project": project,
            "strategy": strategy,
            "assets": summaries,
        }));
    }

    print_project(&project);
    match &strategy {
        Some(s) => println!(
            "  Strategy: v{} (confidence {:.2})",
            s.version, s.overall_confidence
        ),
        None => println!("  Strategy: none"),
    }
    println!("  Assets: {}", assets.len());
    Ok(())
}

async fn cmd_export(
    service: &BrandService,
    project_id: &str,
    dir: &Path,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let summary = service.export(project_id, dir).await?;

    if format == OutputFormat::Json {
        return print_json(&json!({
            "directory": summary.directory,
            "files": summary.files,
            "assets": summary.assets,
            "placeholders": summary.placeholders,
        }));
    }
    if quiet {
        println!("{}", summary.directory.display());
        return Ok(());
    }
    println!("Exported brand kit to {}", summary.directory.display());
    for file in &summary.files {
        println!("  {}", file.display());
    }
    if summary.placeholders > 0 {
        println!(
            "{} of {} asset(s) are placeholders",
            summary.placeholders, summary.assets
        );
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            if format == OutputFormat::Json {
                return print_json(&json!({ "key": key, "value": value }));
            }
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("Set {} = {}", key, config.get(&key)?);
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let entries = config.list()?;
            if format == OutputFormat::Json {
                let map: serde_json::Map<_, _> = entries
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                return print_json(&map);
            }
            for (key, value) in entries {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            println!("Configuration reset to defaults");
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let report = health::doctor(&config).await;

    if format == OutputFormat::Json {
        return print_json(&json!({
            "report": report,
            "system": health::system_info(&config),
        }));
    }

    if !quiet {
        println!("BrandForge Health Check");
        println!("=======================");
        println!();
    }
    for check in &report.checks {
        let marker = match check.status {
            HealthStatus::Ok => "[OK]",
            HealthStatus::Warning | HealthStatus::Error => "[!!]",
        };
        println!(
            "{} {}: {}",
            marker,
            check.name,
            check.message.as_deref().unwrap_or("")
        );
    }
    if !quiet {
        println!();
        println!("Overall: {}", report.overall_status.as_str());
    }

    if report.overall_status == HealthStatus::Error {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

fn print_project(project: &Project) {
    println!("{}", project.business_name());
    println!("  ID: {}", project.id);
    println!("  Status: {}", project.status.as_str());
    println!("  Description: {}", project.input.business_description);
    if !project.input.industry.is_empty() {
        println!("  Industry: {}", project.input.industry);
    }
    println!("  Created: {}", project.created_at.format("%Y-%m-%d %H:%M"));
}

fn print_strategy(strategy: &Strategy, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(strategy);
    }
    println!("Brand strategy for {} (v{})", strategy.business_name, strategy.version);
    println!("  Confidence: {:.2}", strategy.overall_confidence);
    println!("  Archetype: {}", strategy.brand_archetype());
    println!("  Essence: {}", strategy.brand_essence());
    println!("  Traits: {}", strategy.primary_traits().join(", "));
    println!("  Style: {} / {}", strategy.design_style(), strategy.visual_mood());
    println!("  Palette: {}", strategy.palette().join(", "));
    println!("  Typography: {}", strategy.typography());
    let tagline = strategy.tagline();
    if !tagline.is_empty() {
        println!("  Tagline: {}", tagline);
    }
    if let Some(last) = strategy.refinements.last() {
        println!("  Last refinement: {}", last);
    }
    Ok(())
}

fn print_asset_line(asset: &GeneratedAsset) {
    let status = if asset.is_placeholder() {
        format!("placeholder after {} attempt(s)", asset.metadata.attempts)
    } else {
        "ok".to_string()
    };
    println!(
        "{:<18} {:<10} {:<10} {}  {}",
        asset.asset_type.as_str(),
        asset.metadata.variant,
        asset.asset_type.spec().dimensions(),
        asset.image.mime_type(),
        status
    );
}

/// Asset without its inline image data
fn asset_summary(asset: &GeneratedAsset) -> serde_json::Value {
    json!({
        "id": asset.id,
        "asset_type": asset.asset_type,
        "variant": asset.metadata.variant,
        "mime_type": asset.image.mime_type(),
        "placeholder": asset.is_placeholder(),
        "attempts": asset.metadata.attempts,
        "quality_score": asset.metadata.quality_score,
        "last_error": asset.metadata.last_error,
        "created_at": asset.created_at,
    })
}

fn parse_asset_type(s: &str) -> anyhow::Result<AssetType> {
    AssetType::parse(s.trim()).ok_or_else(|| {
        let known: Vec<_> = AssetType::ALL.iter().map(|t| t.as_str()).collect();
        anyhow::anyhow!("Unknown asset type '{}'. Valid types: {}", s, known.join(", "))
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<brandforge_core::Error>() {
        Some(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            if let Some(hint) = e.suggestion() {
                eprintln!("  Try: {}", hint);
            }
        }
        None => eprintln!("Error: {:#}", error),
    }
}
