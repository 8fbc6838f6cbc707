use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use tiny_http::{Header, Response, Server};
use url::Url;

/// Ephemeral loopback server for the studio frontend. Started once before
/// any capture, stopped once after all captures; `Drop` releases the binding
/// so error paths cannot leak the port.
pub struct RenderHost {
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
    port: u16,
}

impl RenderHost {
    pub fn start(root: &Path, port: u16) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("studio root {} is not accessible", root.display()))?;
        let addr = format!("127.0.0.1:{port}");
        let server = Server::http(&addr)
            .map_err(|error| anyhow!("failed to bind render host on {addr}: {error}"))?;
        let server = Arc::new(server);

        let loop_server = Arc::clone(&server);
        let worker = thread::Builder::new()
            .name("render-host".to_owned())
            .spawn(move || serve_loop(&loop_server, &root))
            .context("failed to spawn render host thread")?;

        Ok(Self {
            server,
            worker: Some(worker),
            port,
        })
    }

    pub fn base_url(&self) -> Result<Url> {
        let base = format!("http://127.0.0.1:{}/", self.port);
        Url::parse(&base).with_context(|| format!("invalid render host base url {base}"))
    }

    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for RenderHost {
    fn drop(&mut self) {
        self.release();
    }
}

fn serve_loop(server: &Server, root: &Path) {
    for request in server.incoming_requests() {
        let response = match resolve_request_path(root, request.url()) {
            Some(path) => match fs::read(&path) {
                Ok(bytes) => {
                    let mut response = Response::from_data(bytes);
                    if let Ok(header) =
                        Header::from_bytes(&b"Content-Type"[..], content_type(&path).as_bytes())
                    {
                        response = response.with_header(header);
                    }
                    response
                }
                Err(_) => not_found(),
            },
            None => not_found(),
        };
        let _ = request.respond(response);
    }
}

fn not_found() -> Response<Cursor<Vec<u8>>> {
    Response::from_string("not found").with_status_code(404)
}

/// Maps a request URL onto a file under the studio root. Query strings are
/// ignored, `/` serves `index.html`, and anything that would escape the root
/// is rejected.
fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path_part = url.split('?').next().unwrap_or(url);
    let trimmed = path_part.trim_start_matches('/');
    let relative = if trimmed.is_empty() { "index.html" } else { trimmed };

    let candidate = Path::new(relative);
    let escapes_root = candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if escapes_root {
        return None;
    }

    let resolved = root.join(candidate);
    resolved.is_file().then_some(resolved)
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "gif" => "image/gif",
        "woff2" => "font/woff2",
        "yaml" | "yml" => "application/yaml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    use super::*;

    #[test]
    fn resolves_index_and_ignores_query() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        fs::write(dir.path().join("index.html"), "<html></html>").expect("index should write");

        let root = dir.path().canonicalize().expect("root should canonicalize");
        let resolved = resolve_request_path(&root, "/?payload=abc").expect("index should resolve");
        assert_eq!(resolved, root.join("index.html"));
    }

    #[test]
    fn rejects_traversal_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let root = dir.path().canonicalize().expect("root should canonicalize");
        assert!(resolve_request_path(&root, "/../secret.txt").is_none());
        assert!(resolve_request_path(&root, "/missing.js").is_none());
    }

    #[test]
    fn content_types_cover_frontend_assets() {
        assert_eq!(content_type(Path::new("a/index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("main.mjs")), "text/javascript");
        assert_eq!(content_type(Path::new("scene.bin")), "application/octet-stream");
    }

    #[test]
    fn serves_files_over_loopback_and_stops() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        fs::write(dir.path().join("index.html"), "<html>studio</html>")
            .expect("index should write");

        let host = RenderHost::start(dir.path(), 4918).expect("host should start");
        let mut stream = TcpStream::connect("127.0.0.1:4918").expect("connect should succeed");
        stream
            .write_all(b"GET /?payload=abc HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n")
            .expect("request should write");
        let mut body = String::new();
        stream
            .read_to_string(&mut body)
            .expect("response should read");
        assert!(body.starts_with("HTTP/1.1 200"), "got response: {body}");
        assert!(body.contains("studio"));
        host.stop();
    }
}
