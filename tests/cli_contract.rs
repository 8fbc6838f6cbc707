use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

const SCENES_YAML: &str = r##"
profiles:
  industrial-control:
    accent: "#FF6A00"
scenes:
  gitops-loop: GitOpsLoopScene
  info-summary: InfoSummaryScene
"##;

fn write_studio(root: &Path) {
    let config_dir = root.join("studio").join("config");
    fs::create_dir_all(&config_dir).expect("studio config dir should create");
    fs::write(config_dir.join("scenes.yaml"), SCENES_YAML).expect("scenes.yaml should write");
    fs::write(root.join("studio").join("index.html"), "<html></html>")
        .expect("index.html should write");
}

fn run_visuals(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_course-visuals"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("course-visuals command should run")
}

#[test]
fn missing_lesson_argument_fails_with_usage() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_visuals(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr was: {stderr}");
}

#[test]
fn nonexistent_lesson_file_fails() {
    let dir = tempdir().expect("tempdir should create");
    write_studio(dir.path());

    let output = run_visuals(dir.path(), &["lessons/does-not-exist.md"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("lesson markdown not found"),
        "stderr was: {stderr}"
    );
}

#[test]
fn missing_hero_scene_fails_before_any_output() {
    let dir = tempdir().expect("tempdir should create");
    write_studio(dir.path());
    fs::write(
        dir.path().join("lesson.md"),
        "---\nid: no-hero\ntitle: No Hero\n---\nbody\n",
    )
    .expect("lesson should write");

    let output = run_visuals(dir.path(), &["lesson.md", "--output-root", "generated"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing visuals.hero.scene"),
        "stderr was: {stderr}"
    );
    assert!(
        !dir.path().join("generated").join("no-hero").exists(),
        "no bundle directory may exist after a validation failure"
    );
}

#[test]
fn unknown_profile_fails_before_bundle_creation() {
    let dir = tempdir().expect("tempdir should create");
    write_studio(dir.path());
    fs::write(
        dir.path().join("lesson.md"),
        "---\nid: bad-profile\nvisuals:\n  profile: neon\n  hero:\n    scene: gitops-loop\n---\n",
    )
    .expect("lesson should write");

    let output = run_visuals(dir.path(), &["lesson.md", "--output-root", "generated"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unknown profile 'neon'"),
        "stderr was: {stderr}"
    );
    assert!(
        !dir.path().join("generated").join("bad-profile").exists(),
        "no bundle directory may exist after a validation failure"
    );
}

#[test]
fn unknown_gif_scene_fails_eagerly() {
    let dir = tempdir().expect("tempdir should create");
    write_studio(dir.path());
    fs::write(
        dir.path().join("lesson.md"),
        concat!(
            "---\n",
            "id: bad-scene\n",
            "visuals:\n",
            "  hero:\n",
            "    scene: gitops-loop\n",
            "  gifs:\n",
            "    - scene: not-a-scene\n",
            "---\n",
        ),
    )
    .expect("lesson should write");

    let output = run_visuals(dir.path(), &["lesson.md", "--output-root", "generated"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unknown scene 'not-a-scene'"),
        "stderr was: {stderr}"
    );
    assert!(
        !dir.path().join("generated").join("bad-scene").exists(),
        "no bundle directory may exist after a validation failure"
    );
}

#[test]
fn missing_scene_config_fails_with_its_path() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(
        dir.path().join("lesson.md"),
        "---\nvisuals:\n  hero:\n    scene: gitops-loop\n---\n",
    )
    .expect("lesson should write");

    let output = run_visuals(dir.path(), &["lesson.md"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to read scene config"),
        "stderr was: {stderr}"
    );
}
