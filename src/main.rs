mod bundle;
mod capture;
mod encoding;
mod host;
mod lesson;
mod payload;
mod scenes;
mod sequencer;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use crate::bundle::{AssetEntry, Dimensions, Manifest};
use crate::capture::{CaptureDriver, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::host::RenderHost;
use crate::lesson::Lesson;
use crate::payload::DEFAULT_PROFILE;
use crate::scenes::SceneConfig;

#[derive(Debug, Parser)]
#[command(name = "course-visuals")]
#[command(about = "Render course lesson visuals (hero, info slides, flow GIFs) from markdown frontmatter")]
struct Cli {
    /// Lesson markdown file with a `visuals` frontmatter block.
    lesson: PathBuf,

    /// Directory served to the headless browser as the scene studio frontend.
    #[arg(long, default_value = "studio")]
    studio_root: PathBuf,

    /// Scene configuration file. Defaults to <studio-root>/config/scenes.yaml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for generated visual bundles.
    #[arg(long, default_value = "assets/generated")]
    output_root: PathBuf,

    /// Loopback port for the render host.
    #[arg(long, default_value_t = 4179)]
    port: u16,

    /// Loopback port for the chromedriver instance.
    #[arg(long, default_value_t = 9515)]
    webdriver_port: u16,

    /// Layout settle delay before still captures, in milliseconds.
    #[arg(long, default_value_t = 120)]
    settle_ms: u64,

    /// Settle delay before animation frame captures; shorter than stills
    /// because frame throughput dominates GIF render time.
    #[arg(long, default_value_t = 60)]
    frame_settle_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Argument mistakes exit with status 1 alongside every other failure;
    // help and version requests stay successful.
    let cli = Cli::try_parse().unwrap_or_else(|error| {
        let code = match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        };
        let _ = error.print();
        std::process::exit(code);
    });
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.lesson.is_file() {
        bail!("lesson markdown not found: {}", cli.lesson.display());
    }

    let lesson = lesson::load_lesson(&cli.lesson)?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.studio_root.join("config").join("scenes.yaml"));
    let scenes = scenes::load_scene_config(&config_path)?;

    let profile = lesson
        .visuals
        .profile
        .clone()
        .unwrap_or_else(|| DEFAULT_PROFILE.to_owned());

    // Every scene reference is checked before the browser starts, so a typo
    // in frontmatter fails the run without partial bundle output.
    let hero = lesson
        .visuals
        .hero
        .as_ref()
        .ok_or_else(|| anyhow!("missing visuals.hero.scene in frontmatter"))?;
    scenes.require_profile(&profile)?;
    scenes.require_scene(&hero.scene)?;
    for slide in &lesson.visuals.info_slides {
        scenes.require_scene(slide.scene())?;
    }
    for gif in &lesson.visuals.gifs {
        scenes.require_scene(&gif.scene)?;
    }

    let bundle_dir = cli.output_root.join(&lesson.id);
    let info_dir = bundle_dir.join("info");
    fs::create_dir_all(&info_dir)
        .with_context(|| format!("failed to create bundle directory {}", info_dir.display()))?;

    let render_host = RenderHost::start(&cli.studio_root, cli.port)?;
    let driver = match CaptureDriver::launch(render_host.base_url()?, cli.webdriver_port).await {
        Ok(driver) => driver,
        Err(error) => {
            render_host.stop();
            return Err(error);
        }
    };

    // The session and host are released whether or not rendering succeeded;
    // the render error still wins over any teardown error.
    let render_result = render_bundle(&cli, &lesson, &scenes, &profile, &driver, &bundle_dir).await;
    let close_result = driver.close().await;
    render_host.stop();
    render_result?;
    close_result?;

    println!("Generated visual bundle at {}", bundle_dir.display());
    Ok(())
}

async fn render_bundle(
    cli: &Cli,
    lesson: &Lesson,
    scenes: &SceneConfig,
    profile: &str,
    driver: &CaptureDriver,
    bundle_dir: &Path,
) -> Result<()> {
    let settle = Duration::from_millis(cli.settle_ms);
    let frame_settle = Duration::from_millis(cli.frame_settle_ms);
    let info_dir = bundle_dir.join("info");

    let hero = lesson
        .visuals
        .hero
        .as_ref()
        .ok_or_else(|| anyhow!("missing visuals.hero.scene in frontmatter"))?;
    let hero_request = hero.to_request(profile, &lesson.title);
    driver
        .capture_png(scenes, &hero_request, settle, &bundle_dir.join("hero.png"))
        .await?;
    eprintln!("captured hero.png");

    let mut info_outputs: Vec<AssetEntry> = Vec::new();
    for (index, slide) in lesson.visuals.info_slides.iter().enumerate() {
        let position = index + 1;
        let request = slide.to_request(profile, &lesson.title);
        let numeric = format!("info-{position:02}.png");
        let display_name = slide
            .name
            .clone()
            .unwrap_or_else(|| format!("info-{position}"));
        let named = format!(
            "{}.png",
            bundle::sanitize_name(slide.name.as_deref(), &format!("info-{position}"))
        );

        let numeric_path = info_dir.join(&numeric);
        driver
            .capture_png(scenes, &request, settle, &numeric_path)
            .await?;
        if named != numeric {
            let named_path = info_dir.join(&named);
            fs::copy(&numeric_path, &named_path).with_context(|| {
                format!("failed to copy info slide to {}", named_path.display())
            })?;
        }
        eprintln!("captured info/{numeric}");

        info_outputs.push(AssetEntry {
            name: display_name,
            file: format!("info/{named}"),
        });
    }

    // Convention: the first info slide doubles as the lesson's content image.
    if !info_outputs.is_empty() {
        let content_path = bundle_dir.join("content.png");
        fs::copy(info_dir.join("info-01.png"), &content_path)
            .with_context(|| format!("failed to copy {}", content_path.display()))?;
    }

    let mut gif_outputs: Vec<AssetEntry> = Vec::new();
    for (index, gif) in lesson.visuals.gifs.iter().enumerate() {
        let position = index + 1;
        let name = bundle::sanitize_name(gif.name.as_deref(), &format!("flow-{position}"));
        let file_name = format!("{name}.gif");
        let gif_path = bundle_dir.join(&file_name);
        let base = gif.to_request(profile, &lesson.title);

        // Frames stage into a run-unique temp dir inside the bundle; the
        // TempDir guard removes it on success and on every error path.
        let frames_dir = tempfile::Builder::new()
            .prefix(".frames-")
            .tempdir_in(bundle_dir)
            .context("failed to create frame staging directory")?;
        sequencer::capture_frames(
            driver,
            scenes,
            &base,
            gif.frame_count(),
            frame_settle,
            frames_dir.path(),
        )
        .await?;
        encoding::encode_gif(frames_dir.path(), gif.fps(), &gif_path)?;
        eprintln!("encoded {file_name}");

        gif_outputs.push(AssetEntry {
            name,
            file: file_name,
        });
    }

    // Same first-is-primary convention for the flow animation.
    if let Some(first) = gif_outputs.first() {
        let flow_path = bundle_dir.join("flow.gif");
        fs::copy(bundle_dir.join(&first.file), &flow_path)
            .with_context(|| format!("failed to copy {}", flow_path.display()))?;
    }

    let source = lesson.source.display().to_string();
    bundle::write_text(
        &bundle_dir.join("summary.md"),
        &bundle::build_summary(
            &lesson.title,
            &lesson.id,
            &source,
            profile,
            !info_outputs.is_empty(),
            &gif_outputs,
        ),
    )?;
    bundle::write_text(
        &bundle_dir.join("embed-snippet.md"),
        &bundle::build_embed_snippet(
            &lesson.title,
            &lesson.id,
            gif_outputs.first().map(|gif| gif.file.as_str()),
            !info_outputs.is_empty(),
        ),
    )?;

    let manifest = Manifest {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        source,
        profile: profile.to_owned(),
        dimensions: Dimensions {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        },
        hero: "hero.png".to_owned(),
        flow: gif_outputs.first().map(|gif| gif.file.clone()),
        gifs: gif_outputs,
        info: info_outputs,
        generated_at: chrono::Utc::now().to_rfc3339(),
    };
    bundle::write_manifest(&bundle_dir.join("manifest.json"), &manifest)?;

    Ok(())
}
