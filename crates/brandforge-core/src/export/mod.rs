//! Brand kit export
//!
//! Writes a self-contained directory for a project:
//!
//! ```text
//! <dir>/
//! ├── assets/
//! │   ├── logo.png
//! │   └── business_card.png
//! ├── strategy.json
//! ├── guidelines.md
//! ├── palette.css
//! └── manifest.json
//! ```
//!
//! Only the latest asset per type and variant is exported.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::domain::{AssetType, GeneratedAsset, Project, Strategy};
use crate::error::{Error, Result};
use crate::image::parse_hex_color;

pub const ASSETS_DIR: &str = "assets";
pub const STRATEGY_FILE: &str = "strategy.json";
pub const GUIDELINES_FILE: &str = "guidelines.md";
pub const PALETTE_FILE: &str = "palette.css";
pub const MANIFEST_FILE: &str = "manifest.json";

/// What an export wrote
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub directory: PathBuf,
    /// Written files, relative to `directory`
    pub files: Vec<PathBuf>,
    pub assets: usize,
    pub placeholders: usize,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    brand_name: &'a str,
    project_id: &'a str,
    status: &'a str,
    strategy_version: u32,
    overall_confidence: f64,
    consistency_seed: &'a str,
    exported_at: String,
    average_quality_score: f64,
    assets: Vec<ManifestAsset<'a>>,
}

#[derive(Debug, Serialize)]
struct ManifestAsset<'a> {
    id: &'a str,
    asset_type: AssetType,
    variant: &'a str,
    file: String,
    mime_type: &'a str,
    placeholder: bool,
    attempts: u32,
    quality_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_digest: Option<&'a str>,
}

/// Write the brand kit for `project` into `dir`, creating it if needed
pub fn write_brand_kit(
    dir: &Path,
    project: &Project,
    strategy: &Strategy,
    assets: &[GeneratedAsset],
) -> Result<ExportSummary> {
    fs::create_dir_all(dir.join(ASSETS_DIR))?;

    let selected = latest_assets(assets);
    let mut files = Vec::with_capacity(selected.len() + 4);
    let mut manifest_assets = Vec::with_capacity(selected.len());

    for asset in &selected {
        let bytes = asset.image.to_bytes().map_err(|e| {
            Error::Export(format!("asset {} could not be decoded: {}", asset.id, e))
        })?;
        let relative = Path::new(ASSETS_DIR).join(asset_file_name(asset));
        fs::write(dir.join(&relative), bytes)?;

        manifest_assets.push(ManifestAsset {
            id: &asset.id,
            asset_type: asset.asset_type,
            variant: &asset.metadata.variant,
            file: relative.to_string_lossy().replace('\\', "/"),
            mime_type: asset.image.mime_type(),
            placeholder: asset.is_placeholder(),
            attempts: asset.metadata.attempts,
            quality_score: asset.metadata.quality_score,
            payload_digest: asset.signature().map(|s| s.payload_digest.as_str()),
        });
        files.push(relative);
    }

    write_file(dir, STRATEGY_FILE, &serde_json::to_string_pretty(strategy)?, &mut files)?;
    write_file(dir, GUIDELINES_FILE, &render_guidelines(project, strategy, &selected), &mut files)?;
    write_file(dir, PALETTE_FILE, &render_palette_css(strategy), &mut files)?;

    let placeholders = selected.iter().filter(|a| a.is_placeholder()).count();
    let manifest = Manifest {
        brand_name: project.business_name(),
        project_id: &project.id,
        status: project.status.as_str(),
        strategy_version: strategy.version,
        overall_confidence: strategy.overall_confidence,
        consistency_seed: &strategy.consistency_seed,
        exported_at: Utc::now().to_rfc3339(),
        average_quality_score: average_quality(&selected),
        assets: manifest_assets,
    };
    write_file(dir, MANIFEST_FILE, &serde_json::to_string_pretty(&manifest)?, &mut files)?;

    info!(
        project_id = %project.id,
        directory = %dir.display(),
        assets = selected.len(),
        placeholders,
        "Brand kit exported"
    );

    Ok(ExportSummary {
        directory: dir.to_path_buf(),
        files,
        assets: selected.len(),
        placeholders,
    })
}

fn write_file(dir: &Path, name: &str, contents: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    fs::write(dir.join(name), contents)?;
    files.push(PathBuf::from(name));
    Ok(())
}

/// Latest asset per (type, variant file slug), ordered by type then slug
///
/// Variants that sanitize to the same slug would share a file, so they share a slot.
fn latest_assets(assets: &[GeneratedAsset]) -> Vec<&GeneratedAsset> {
    let mut ordered: Vec<&GeneratedAsset> = assets.iter().collect();
    ordered.sort_by_key(|a| a.created_at);

    let mut latest: BTreeMap<(AssetType, String), &GeneratedAsset> = BTreeMap::new();
    for asset in ordered {
        latest.insert((asset.asset_type, variant_slug(&asset.metadata.variant)), asset);
    }
    latest.into_values().collect()
}

fn average_quality(assets: &[&GeneratedAsset]) -> f64 {
    if assets.is_empty() {
        return 0.0;
    }
    let total: f64 = assets.iter().map(|a| a.metadata.quality_score).sum();
    (total / assets.len() as f64 * 1000.0).round() / 1000.0
}

/// File-name suffix for a variant; empty for the primary one
fn variant_slug(variant: &str) -> String {
    let slug = sanitize(variant);
    if slug == "primary" { String::new() } else { slug }
}

/// `logo.png` for the primary variant, `logo-horizontal.png` otherwise
pub fn asset_file_name(asset: &GeneratedAsset) -> String {
    let ext = asset.image.format().extension();
    let variant = variant_slug(&asset.metadata.variant);
    if variant.is_empty() {
        format!("{}.{}", asset.asset_type.as_str(), ext)
    } else {
        format!("{}-{}.{}", asset.asset_type.as_str(), variant, ext)
    }
}

fn sanitize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn hex(color: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// CSS custom properties for the brand palette
pub fn render_palette_css(strategy: &Strategy) -> String {
    let primary: Vec<[u8; 3]> = strategy
        .primary_colors()
        .iter()
        .filter_map(|c| parse_hex_color(c))
        .collect();
    let supporting: Vec<[u8; 3]> = strategy
        .palette()
        .iter()
        .filter_map(|c| parse_hex_color(c))
        .filter(|c| !primary.contains(c))
        .collect();

    let mut css = format!("/* {} brand palette */\n\n:root {{\n", strategy.business_name);
    if primary.is_empty() {
        let _ = writeln!(css, "  --brand-primary-1: {};", hex(strategy.brand_color()));
    }
    for (i, color) in primary.iter().enumerate() {
        let _ = writeln!(css, "  --brand-primary-{}: {};", i + 1, hex(*color));
    }
    for (i, color) in supporting.iter().enumerate() {
        let _ = writeln!(css, "  --brand-secondary-{}: {};", i + 1, hex(*color));
    }
    css.push_str("}\n\n");
    css.push_str(".brand-primary { color: var(--brand-primary-1); }\n");
    css.push_str(".brand-bg-primary { background-color: var(--brand-primary-1); }\n");
    css
}

/// Human-readable brand guidelines
pub fn render_guidelines(project: &Project, strategy: &Strategy, assets: &[&GeneratedAsset]) -> String {
    let mut md = format!("# {} Brand Guidelines\n\n", project.business_name());

    let tagline = strategy.tagline();
    if !tagline.is_empty() {
        let _ = writeln!(md, "> {}\n", tagline);
    }

    md.push_str("## Brand Overview\n\n");
    push_field(&mut md, "Essence", &strategy.brand_essence());
    push_field(&mut md, "Archetype", &strategy.brand_archetype());
    push_field(&mut md, "Personality", &strategy.primary_traits().join(", "));
    push_field(&mut md, "Industry", &project.input.industry);
    push_field(&mut md, "Audience", &project.input.target_audience);

    md.push_str("\n## Visual Identity\n\n");
    push_field(&mut md, "Design style", &strategy.design_style());
    push_field(&mut md, "Visual mood", &strategy.visual_mood());
    push_field(&mut md, "Typography", &strategy.typography());
    let palette = strategy.palette();
    if palette.is_empty() {
        push_field(&mut md, "Colors", &hex(strategy.brand_color()));
    } else {
        push_field(&mut md, "Colors", &palette.join(", "));
    }

    md.push_str("\n## Assets\n\n");
    if assets.is_empty() {
        md.push_str("No assets generated yet.\n");
    }
    for asset in assets {
        let note = if asset.is_placeholder() {
            " (placeholder, regenerate before use)"
        } else {
            ""
        };
        let _ = writeln!(
            md,
            "- {} ({}): `{}/{}`{}",
            asset.asset_type.label(),
            asset.asset_type.spec().dimensions(),
            ASSETS_DIR,
            asset_file_name(asset),
            note
        );
    }

    md.push_str("\n## Usage\n\n");
    md.push_str("Do:\n\n");
    for rule in [
        "Use the approved color palette",
        "Keep consistent spacing around the logo",
        "Follow the typography hierarchy",
        "Ensure high contrast for readability",
    ] {
        let _ = writeln!(md, "- {}", rule);
    }
    md.push_str("\nDon't:\n\n");
    for rule in [
        "Distort or stretch the logo",
        "Introduce colors outside the palette",
        "Place the logo on busy backgrounds",
        "Use low-resolution exports",
    ] {
        let _ = writeln!(md, "- {}", rule);
    }

    let _ = writeln!(
        md,
        "\n---\nStrategy version {} · confidence {:.2} · seed `{}`",
        strategy.version, strategy.overall_confidence, strategy.consistency_seed
    );
    md
}

fn push_field(md: &mut String, label: &str, value: &str) {
    if !value.trim().is_empty() {
        let _ = writeln!(md, "- **{}**: {}", label, value);
    }
}
