//! Dev HTTP server for the output directory.
//!
//! A small blocking file server over `tiny_http`:
//!
//! - only `GET` and `HEAD` are answered (405 otherwise),
//! - `/` serves `index.html`,
//! - a path whose last segment has no `.` serves `<path>.html`, or
//!   `<path>/index.html` for a directory,
//! - percent-encoded paths are decoded,
//! - `..` segments are refused.

use percent_encoding::percent_decode_str;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("cannot listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Map a request URL to a file under `root`. `None` if the path is refused.
pub fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let raw = url.split(['?', '#']).next().unwrap_or("");
    let path = percent_decode_str(raw).decode_utf8().ok()?;
    let rel = path.trim_start_matches('/');
    if rel.split('/').any(|segment| segment == "..") {
        return None;
    }
    if rel.is_empty() {
        return Some(root.join("index.html"));
    }

    let candidate = root.join(rel);
    let last = rel.rsplit('/').next().unwrap_or(rel);
    if last.contains('.') {
        return Some(candidate);
    }
    let mut html = candidate.clone().into_os_string();
    html.push(".html");
    let html = PathBuf::from(html);
    if !html.is_file() && candidate.is_dir() {
        return Some(candidate.join("index.html"));
    }
    Some(html)
}

/// Content type for a served file, from its extension.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A bound server for one directory.
pub struct DevServer {
    server: Server,
    root: PathBuf,
}

impl DevServer {
    pub fn bind(addr: &str, root: &Path) -> Result<Self, ServeError> {
        let server = Server::http(addr).map_err(|e| ServeError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            server,
            root: root.to_path_buf(),
        })
    }

    /// `http://` URL of the bound address.
    pub fn url(&self) -> String {
        format!("http://{}", self.server.server_addr())
    }

    /// Answer requests until the process exits.
    pub fn run(&self) {
        for request in self.server.incoming_requests() {
            debug!(method = ?request.method(), url = request.url(), "request");
            if let Err(e) = self.respond(request) {
                warn!("error responding: {e}");
            }
        }
    }

    fn respond(&self, request: Request) -> io::Result<()> {
        if !matches!(request.method(), Method::Get | Method::Head) {
            return request.respond(text_response(405, "not a GET request"));
        }
        let Some(path) = resolve_request_path(&self.root, request.url()) else {
            return request.respond(text_response(400, "bad request path"));
        };
        match File::open(&path) {
            Ok(file) if path.is_file() => {
                let mut response = Response::from_file(file);
                if let Ok(header) =
                    Header::from_bytes(&b"Content-Type"[..], content_type(&path).as_bytes())
                {
                    response.add_header(header);
                }
                request.respond(response)
            }
            _ => request.respond(text_response(404, "404 page not found")),
        }
    }
}

fn text_response(status: u16, body: &str) -> Response<io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_status_code(StatusCode(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestProject;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    /// Send one request and return the raw response.
    fn send(addr: &str, method: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
        )
        .unwrap();
        let mut response = Vec::new();
        let _ = stream.read_to_end(&mut response);
        String::from_utf8_lossy(&response).into_owned()
    }

    fn status(response: &str) -> Option<&str> {
        response.split(' ').nth(1)
    }

    #[test]
    fn server_answers_requests() {
        let p = TestProject::new();
        p.write("gen/a.css", "body{}");
        p.write("gen/index.html", "<p>home</p>");
        let server = DevServer::bind("127.0.0.1:0", &p.path("gen")).unwrap();
        let addr = server.url().trim_start_matches("http://").to_string();
        std::thread::spawn(move || server.run());

        let css = send(&addr, "GET", "/a.css");
        assert_eq!(status(&css), Some("200"), "{css}");
        assert!(css.contains("Content-Type: text/css; charset=utf-8"), "{css}");
        assert!(css.ends_with("body{}"), "{css}");

        let index = send(&addr, "HEAD", "/");
        assert_eq!(status(&index), Some("200"), "{index}");
        assert!(index.contains("Content-Type: text/html; charset=utf-8"), "{index}");

        let post = send(&addr, "POST", "/");
        assert_eq!(status(&post), Some("405"), "{post}");

        let missing = send(&addr, "GET", "/missing");
        assert_eq!(status(&missing), Some("404"), "{missing}");

        let traversal = send(&addr, "GET", "/../secret.txt");
        assert_eq!(status(&traversal), Some("400"), "{traversal}");
    }

    #[test]
    fn root_serves_index() {
        let root = Path::new("/site/gen");
        assert_eq!(
            resolve_request_path(root, "/"),
            Some(root.join("index.html"))
        );
        assert_eq!(
            resolve_request_path(root, "/?x=1"),
            Some(root.join("index.html"))
        );
    }

    #[test]
    fn files_with_extension_served_as_is() {
        let root = Path::new("/site/gen");
        assert_eq!(
            resolve_request_path(root, "/assets/x.abc.css"),
            Some(root.join("assets/x.abc.css"))
        );
        assert_eq!(
            resolve_request_path(root, "/feed.xml#top"),
            Some(root.join("feed.xml"))
        );
    }

    #[test]
    fn extensionless_paths_get_html() {
        let root = Path::new("/site/gen");
        assert_eq!(
            resolve_request_path(root, "/posts/hello"),
            Some(root.join("posts/hello.html"))
        );
    }

    #[test]
    fn directories_serve_their_index() {
        let p = TestProject::new();
        p.write("gen/posts/index.html", "list");
        p.write("gen/about.html", "about");
        let root = p.path("gen");
        assert_eq!(
            resolve_request_path(&root, "/posts"),
            Some(root.join("posts/index.html"))
        );
        assert_eq!(
            resolve_request_path(&root, "/about"),
            Some(root.join("about.html"))
        );
    }

    #[test]
    fn percent_encoded_paths_decoded() {
        let root = Path::new("/site/gen");
        assert_eq!(
            resolve_request_path(root, "/img/my%20pic.png"),
            Some(root.join("img/my pic.png"))
        );
        assert_eq!(resolve_request_path(root, "/%FF.css"), None);
    }

    #[test]
    fn traversal_refused() {
        let root = Path::new("/site/gen");
        assert_eq!(resolve_request_path(root, "/../secret"), None);
        assert_eq!(resolve_request_path(root, "/a/../../b.css"), None);
        assert_eq!(resolve_request_path(root, "/%2e%2e/secret"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("a.b.css")), "text/css; charset=utf-8");
        assert_eq!(content_type(Path::new("feed.xml")), "application/xml");
        assert_eq!(content_type(Path::new("CNAME")), "application/octet-stream");
    }

    #[test]
    fn bind_reports_bad_address() {
        let result = DevServer::bind("not an address", Path::new("."));
        assert!(matches!(result, Err(ServeError::Bind { .. })));
    }
}
