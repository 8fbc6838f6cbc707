use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use url::Url;

use crate::payload::{encode_payload, RenderRequest};
use crate::scenes::SceneConfig;

pub const CANVAS_WIDTH: u32 = 1960;
pub const CANVAS_HEIGHT: u32 = 1104;

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY: Duration = Duration::from_millis(100);
const FONT_POLL_ATTEMPTS: u32 = 50;
const FONT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owned headless-browser session. One instance serves every capture in a
/// run; captures must stay sequential because navigation state is shared.
pub struct CaptureDriver {
    client: Option<Client>,
    chromedriver: Option<Child>,
    base_url: Url,
}

impl CaptureDriver {
    /// Spawns chromedriver on `webdriver_port` and opens a headless session
    /// sized to the fixed canvas. chromedriver needs a moment to start
    /// listening, so the first connect is retried briefly.
    pub async fn launch(base_url: Url, webdriver_port: u16) -> Result<Self> {
        let mut chromedriver = spawn_chromedriver(webdriver_port)?;

        let client = match connect_with_retry(webdriver_port).await {
            Ok(client) => client,
            Err(error) => {
                let _ = chromedriver.kill();
                let _ = chromedriver.wait();
                return Err(error);
            }
        };

        if let Err(error) = client.set_window_rect(0, 0, CANVAS_WIDTH, CANVAS_HEIGHT).await {
            let _ = client.clone().close().await;
            let _ = chromedriver.kill();
            let _ = chromedriver.wait();
            return Err(anyhow!("failed to size browser window to {CANVAS_WIDTH}x{CANVAS_HEIGHT}: {error}"));
        }

        Ok(Self {
            client: Some(client),
            chromedriver: Some(chromedriver),
            base_url,
        })
    }

    /// Captures one still: validates the scene, navigates with the encoded
    /// payload, waits out the settle interval and font loading, then writes a
    /// full-viewport PNG. Errors are fatal for the visual; there is no retry.
    pub async fn capture_png(
        &self,
        scenes: &SceneConfig,
        request: &RenderRequest,
        settle: Duration,
        output: &Path,
    ) -> Result<()> {
        scenes.require_scene(&request.scene)?;
        let client = self.client()?;

        let url = self.render_url(request)?;
        client
            .goto(url.as_str())
            .await
            .with_context(|| format!("failed to open render page for scene '{}'", request.scene))?;

        tokio::time::sleep(settle).await;
        wait_for_fonts(client)
            .await
            .with_context(|| format!("failed to poll font readiness for scene '{}'", request.scene))?;

        let png = client
            .screenshot()
            .await
            .with_context(|| format!("failed to capture scene '{}'", request.scene))?;
        fs::write(output, &png)
            .with_context(|| format!("failed to write capture to {}", output.display()))?;
        Ok(())
    }

    fn render_url(&self, request: &RenderRequest) -> Result<Url> {
        let token = encode_payload(request)?;
        let mut url = self.base_url.clone();
        url.query_pairs_mut().clear().append_pair("payload", &token);
        Ok(url)
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("capture driver session already closed"))
    }

    /// Ends the WebDriver session and stops chromedriver. `Drop` covers the
    /// chromedriver child on early-error paths, but a graceful close is
    /// preferred so the browser exits cleanly.
    pub async fn close(mut self) -> Result<()> {
        let result = match self.client.take() {
            Some(client) => client
                .close()
                .await
                .context("failed to end webdriver session"),
            None => Ok(()),
        };
        self.kill_chromedriver();
        result
    }

    fn kill_chromedriver(&mut self) {
        if let Some(mut child) = self.chromedriver.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for CaptureDriver {
    fn drop(&mut self) {
        self.kill_chromedriver();
    }
}

fn spawn_chromedriver(port: u16) -> Result<Child> {
    Command::new("chromedriver")
        .arg(format!("--port={port}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                anyhow!(
                    "chromedriver executable not found on PATH. Install a chromedriver matching the local Chrome/Chromium major version."
                )
            } else {
                anyhow!("failed to spawn chromedriver on port {port}: {error}")
            }
        })
}

async fn connect_with_retry(webdriver_port: u16) -> Result<Client> {
    let webdriver_url = format!("http://127.0.0.1:{webdriver_port}");
    let mut capabilities = serde_json::map::Map::new();
    capabilities.insert(
        "goog:chromeOptions".to_owned(),
        json!({
            "args": [
                "--headless=new",
                "--force-device-scale-factor=1",
                "--hide-scrollbars",
                format!("--window-size={CANVAS_WIDTH},{CANVAS_HEIGHT}"),
            ]
        }),
    );

    let mut last_error = None;
    for _ in 0..CONNECT_ATTEMPTS {
        match ClientBuilder::native()
            .capabilities(capabilities.clone())
            .connect(&webdriver_url)
            .await
        {
            Ok(client) => return Ok(client),
            Err(error) => {
                last_error = Some(error);
                tokio::time::sleep(CONNECT_RETRY).await;
            }
        }
    }

    let detail = last_error
        .map(|error| error.to_string())
        .unwrap_or_else(|| "no connection attempt was made".to_owned());
    bail!("failed to connect to webdriver at {webdriver_url}: {detail}");
}

/// Mirrors awaiting `document.fonts.ready` in the page: polls until the font
/// set reports loaded. The status settles even on pages without webfonts, so
/// the poll normally ends in one or two rounds; after the cap we proceed with
/// whatever glyphs are available. A failed script execution is fatal; it
/// means the page itself is broken, not that fonts are slow.
async fn wait_for_fonts(client: &Client) -> Result<()> {
    for _ in 0..FONT_POLL_ATTEMPTS {
        let value = client
            .execute("return document.fonts.status === 'loaded';", vec![])
            .await
            .context("failed to evaluate font readiness in the render page")?;
        if value.as_bool().unwrap_or(false) {
            return Ok(());
        }
        tokio::time::sleep(FONT_POLL_INTERVAL).await;
    }
    Ok(())
}
