use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

/// One generated asset as the manifest records it: the display name from
/// frontmatter (or the positional fallback) and the bundle-relative file.
#[derive(Debug, Clone, Serialize)]
pub struct AssetEntry {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Written last, after every asset succeeded. camelCase keys on disk.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub id: String,
    pub title: String,
    pub source: String,
    pub profile: String,
    pub dimensions: Dimensions,
    pub hero: String,
    pub flow: Option<String>,
    pub gifs: Vec<AssetEntry>,
    pub info: Vec<AssetEntry>,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
}

/// Lowercase, collapse any run outside `[a-z0-9-]` to one hyphen, trim edge
/// hyphens. Empty or missing input gets the positional fallback.
pub fn sanitize_name(name: Option<&str>, fallback: &str) -> String {
    static UNSAFE_RUN: OnceLock<Regex> = OnceLock::new();
    let unsafe_run = UNSAFE_RUN
        .get_or_init(|| Regex::new("[^a-z0-9-]+").expect("name sanitizer regex should compile"));

    let Some(raw) = name else {
        return fallback.to_owned();
    };
    let lowered = raw.to_lowercase();
    let collapsed = unsafe_run.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

pub fn build_summary(
    title: &str,
    id: &str,
    source: &str,
    profile: &str,
    has_info: bool,
    gifs: &[AssetEntry],
) -> String {
    let mut lines = vec![
        format!("# {title}"),
        String::new(),
        format!("- Visual ID: `{id}`"),
        format!("- Source markdown: `{source}`"),
        format!("- Profile: `{profile}`"),
        "- Generated assets:".to_owned(),
        "  - `hero.png`".to_owned(),
    ];

    if has_info {
        lines.push("  - `content.png`".to_owned());
        lines.push("  - `info/*.png`".to_owned());
    }
    if !gifs.is_empty() {
        lines.push("  - `flow.gif`".to_owned());
        for gif in gifs {
            lines.push(format!("  - `{}`", gif.file));
        }
    }

    let mut summary = lines.join("\n");
    summary.push('\n');
    summary
}

/// Markdown block a lesson can paste in: hero always, plus the primary GIF
/// and the first info slide when present. Paths are relative to where lesson
/// files live in the course tree, three levels above the generated root.
pub fn build_embed_snippet(
    title: &str,
    id: &str,
    first_gif: Option<&str>,
    has_info: bool,
) -> String {
    let mut lines = vec![format!(
        "![{title} Hero](../../../assets/generated/{id}/hero.png)"
    )];
    if let Some(file) = first_gif {
        lines.push(format!(
            "![{title} Flow](../../../assets/generated/{id}/{file})"
        ));
    }
    if has_info {
        lines.push(format!(
            "![{title} Concept Summary](../../../assets/generated/{id}/info/info-01.png)"
        ));
    }

    let mut snippet = lines.join("\n");
    snippet.push('\n');
    snippet
}

pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let mut json =
        serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    json.push('\n');
    fs::write(path, json)
        .with_context(|| format!("failed to write manifest {}", path.display()))?;
    Ok(())
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_unsafe_runs() {
        assert_eq!(sanitize_name(Some("My Flow! #1"), "flow-1"), "my-flow-1");
        assert_eq!(sanitize_name(Some("GitOps  Loop"), "flow-1"), "gitops-loop");
        assert_eq!(sanitize_name(Some("--edge--"), "flow-1"), "edge");
    }

    #[test]
    fn sanitize_falls_back_for_empty_or_missing_names() {
        assert_eq!(sanitize_name(Some(""), "flow-2"), "flow-2");
        assert_eq!(sanitize_name(Some("!!!"), "info-3"), "info-3");
        assert_eq!(sanitize_name(None, "flow-4"), "flow-4");
    }

    #[test]
    fn summary_lists_assets_conditionally() {
        let gifs = vec![AssetEntry {
            name: "incident".to_owned(),
            file: "incident.gif".to_owned(),
        }];
        let summary = build_summary("Lesson", "week-01", "lessons/week-01.md", "industrial-control", true, &gifs);
        assert!(summary.contains("# Lesson"));
        assert!(summary.contains("- Visual ID: `week-01`"));
        assert!(summary.contains("  - `content.png`"));
        assert!(summary.contains("  - `flow.gif`"));
        assert!(summary.contains("  - `incident.gif`"));

        let bare = build_summary("Lesson", "week-01", "lessons/week-01.md", "industrial-control", false, &[]);
        assert!(!bare.contains("content.png"));
        assert!(!bare.contains("flow.gif"));
        assert!(bare.contains("  - `hero.png`"));
    }

    #[test]
    fn embed_snippet_references_primary_assets() {
        let snippet = build_embed_snippet("Lesson", "week-01", Some("incident.gif"), true);
        let lines: Vec<&str> = snippet.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("week-01/hero.png"));
        assert!(lines[1].contains("week-01/incident.gif"));
        assert!(lines[2].contains("week-01/info/info-01.png"));

        let hero_only = build_embed_snippet("Lesson", "week-01", None, false);
        assert_eq!(hero_only.lines().count(), 1);
    }

    #[test]
    fn manifest_serializes_with_camel_case_timestamp_key() {
        let manifest = Manifest {
            id: "week-01".to_owned(),
            title: "Lesson".to_owned(),
            source: "lessons/week-01.md".to_owned(),
            profile: "industrial-control".to_owned(),
            dimensions: Dimensions {
                width: 1960,
                height: 1104,
            },
            hero: "hero.png".to_owned(),
            flow: None,
            gifs: Vec::new(),
            info: Vec::new(),
            generated_at: "2026-01-01T00:00:00+00:00".to_owned(),
        };

        let json = serde_json::to_value(&manifest).expect("manifest should serialize");
        assert_eq!(json["hero"], "hero.png");
        assert_eq!(json["flow"], serde_json::Value::Null);
        assert_eq!(json["generatedAt"], "2026-01-01T00:00:00+00:00");
        assert_eq!(json["dimensions"]["width"], 1960);
        assert!(json["info"].as_array().expect("info array").is_empty());
    }
}
