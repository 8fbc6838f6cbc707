use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::payload::RenderRequest;

pub const DEFAULT_INFO_SCENE: &str = "info-summary";
pub const DEFAULT_GIF_FRAMES: u32 = 24;
pub const DEFAULT_GIF_FPS: u32 = 8;

/// One lesson markdown document, reduced to the fields the visual build
/// consumes. Immutable for the run.
#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub visuals: VisualsSpec,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Frontmatter {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    visuals: VisualsSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisualsSpec {
    pub profile: Option<String>,
    pub hero: Option<HeroSpec>,
    #[serde(default, rename = "infoSlides")]
    pub info_slides: Vec<InfoSlideSpec>,
    #[serde(default)]
    pub gifs: Vec<GifSpec>,
}

/// Hero frontmatter carries a scene plus arbitrary extra fields handed to the
/// scene untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct HeroSpec {
    pub scene: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfoSlideSpec {
    pub scene: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GifSpec {
    pub scene: String,
    pub variant: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
    pub frames: Option<u32>,
    pub fps: Option<u32>,
    pub name: Option<String>,
}

impl HeroSpec {
    /// Hero request: lesson title first, then the hero's own fields so an
    /// explicit hero title wins.
    pub fn to_request(&self, profile: &str, lesson_title: &str) -> RenderRequest {
        let mut request = RenderRequest::new(self.scene.clone(), profile)
            .with_field("title", json!(lesson_title));
        for (key, value) in &self.extra {
            request.extra.insert(key.clone(), value.clone());
        }
        request
    }
}

impl InfoSlideSpec {
    pub fn scene(&self) -> &str {
        self.scene.as_deref().unwrap_or(DEFAULT_INFO_SCENE)
    }

    pub fn to_request(&self, profile: &str, lesson_title: &str) -> RenderRequest {
        let title = self
            .title
            .clone()
            .unwrap_or_else(|| format!("{lesson_title} Summary"));
        let mut request = RenderRequest::new(self.scene(), profile)
            .with_field("title", json!(title))
            .with_field("bullets", json!(self.bullets));
        if let Some(subtitle) = &self.subtitle {
            request = request.with_field("subtitle", json!(subtitle));
        }
        request
    }
}

impl GifSpec {
    pub fn frame_count(&self) -> u32 {
        self.frames.unwrap_or(DEFAULT_GIF_FRAMES)
    }

    pub fn fps(&self) -> u32 {
        self.fps.unwrap_or(DEFAULT_GIF_FPS)
    }

    pub fn to_request(&self, profile: &str, lesson_title: &str) -> RenderRequest {
        let title = self.title.clone().unwrap_or_else(|| lesson_title.to_owned());
        let mut request = RenderRequest::new(self.scene.clone(), profile)
            .with_field("title", json!(title))
            .with_field("bullets", json!(self.bullets));
        if let Some(variant) = &self.variant {
            request = request.with_field("variant", json!(variant));
        }
        if let Some(subtitle) = &self.subtitle {
            request = request.with_field("subtitle", json!(subtitle));
        }
        if let Some(frames) = self.frames {
            request = request.with_field("frames", json!(frames));
        }
        if let Some(fps) = self.fps {
            request = request.with_field("fps", json!(fps));
        }
        request
    }
}

pub fn load_lesson(path: &Path) -> Result<Lesson> {
    let markdown = fs::read_to_string(path)
        .with_context(|| format!("failed to read lesson markdown {}", path.display()))?;
    let frontmatter = parse_frontmatter(&markdown, path)?;

    let id = match frontmatter.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => file_stem(path)?,
    };
    let title = match frontmatter.title {
        Some(title) if !title.trim().is_empty() => title,
        _ => id.clone(),
    };

    Ok(Lesson {
        id,
        title,
        visuals: frontmatter.visuals,
        source: path.to_path_buf(),
    })
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            anyhow!(
                "lesson path {} has no usable UTF-8 file stem for an id",
                path.display()
            )
        })
}

/// Frontmatter is the YAML block between a leading `---` line and the next
/// `---` line. A document without one gets an empty frontmatter, so the run
/// fails later on the missing hero scene rather than here.
fn parse_frontmatter(markdown: &str, path: &Path) -> Result<Frontmatter> {
    let Some(block) = frontmatter_block(markdown) else {
        return Ok(Frontmatter::default());
    };
    if block.trim().is_empty() {
        return Ok(Frontmatter::default());
    }

    serde_yaml::from_str(block).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse frontmatter yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })
}

fn frontmatter_block(markdown: &str) -> Option<&str> {
    let rest = markdown.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let mut offset = 0;
    loop {
        let line_end = rest[offset..].find('\n').map(|index| offset + index);
        let line = match line_end {
            Some(end) => &rest[offset..end],
            None => &rest[offset..],
        };
        if line.trim_end() == "---" {
            return Some(&rest[..offset]);
        }
        match line_end {
            Some(end) => offset = end + 1,
            None => return None,
        }
    }
}
