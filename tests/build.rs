//! End-to-end builds of small projects through the public API.

use sitkin::hash::hash_token;
use sitkin::{BuildError, LoadError, Minifier, Project, Renderer, build};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

const LAYOUT: &str = "<!doctype html><html><head>\
    <link rel=\"stylesheet\" href=\"/assets/x.css\"></head>\
    <body>{{#> contents}}{{{contents}}}{{/contents}}</body></html>";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("cannot read '{rel}': {e}"))
}

/// Every file under `dir` with its contents, in path order.
fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap();
            (rel.to_string_lossy().into_owned(), fs::read(e.path()).unwrap())
        })
        .collect()
}

/// A blog: one post, an index listing the posts, a feed and a stylesheet.
fn blog() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "sitkin/default.tmpl", LAYOUT);
    write(root, "sitkin/config.json", r#"{"filesets": ["posts"], "nohash": ["robots.txt"]}"#);
    write(
        root,
        "sitkin/posts.tmpl",
        "{{#*inline \"contents\"}}<article><h1>{{metadata.title}}</h1>{{{contents}}}</article>{{/inline}}",
    );
    write(
        root,
        "posts/2020-01-01.hello.md",
        "<!--{\"title\":\"Hello\"}-->\nFirst *post*.\n",
    );
    write(
        root,
        "index.tmpl",
        "{{#*inline \"contents\"}}<ul>{{#each file_sets.posts.files}}\
         <li><a href=\"/posts/{{name}}\">{{metadata.title}}</a></li>{{/each}}</ul>{{/inline}}",
    );
    write(
        root,
        "feed.xml.tpl",
        "<feed><updated>{{format_rfc3339 file_sets.posts.last_date}}</updated>\
         {{#each file_sets.posts.files}}<entry>{{xml_escape contents}}</entry>{{/each}}</feed>",
    );
    write(root, "assets/x.css", "body { color: red }");
    write(root, "robots.txt", "User-agent: *");
    tmp
}

#[test]
fn blog_builds() {
    let tmp = blog();
    let root = tmp.path();
    let stats = build(root, false, false).unwrap();

    assert_eq!(stats.output_dir, root.join("gen"));
    assert_eq!(stats.render.pages, 2);
    assert_eq!(stats.render.text_files, 1);
    assert_eq!(stats.render.assets, 2);
    assert_eq!(stats.render.hashed, 1);

    let index = read(root, "gen/index.html");
    assert_eq!(index.matches("<li>").count(), 1, "{index}");
    assert!(index.contains("Hello"), "{index}");

    let post = read(root, "gen/posts/hello.html");
    assert!(post.contains("<em>post</em>"), "{post}");
    assert!(post.contains("<h1>Hello</h1>"), "{post}");

    let feed = read(root, "gen/feed.xml");
    assert!(feed.starts_with("<feed><updated>2020-01-01T00:00:00Z</updated><entry>&lt;p&gt;First"));

    assert_eq!(read(root, "gen/robots.txt"), "User-agent: *");
}

#[test]
fn asset_hashed_and_linked() {
    let tmp = blog();
    let root = tmp.path();
    build(root, false, false).unwrap();

    let token = hash_token(b"body { color: red }");
    let hashed = format!("x.{token}.css");
    let assets: Vec<_> = fs::read_dir(root.join("gen/assets"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(assets, vec![hashed.clone()]);
    assert_eq!(read(root, &format!("gen/assets/{hashed}")), "body { color: red }");

    for page in ["gen/index.html", "gen/posts/hello.html"] {
        let html = read(root, page);
        assert!(html.contains(&format!("/assets/{hashed}")), "{page}: {html}");
        assert!(!html.contains("/assets/x.css"), "{page}: {html}");
    }
}

#[test]
fn dev_mode_keeps_asset_names() {
    let tmp = blog();
    let root = tmp.path();
    let stats = build(root, true, false).unwrap();

    assert_eq!(stats.render.hashed, 0);
    assert_eq!(stats.render.rewritten_links, 0);
    assert_eq!(read(root, "gen/assets/x.css"), "body { color: red }");
    assert!(read(root, "gen/index.html").contains("/assets/x.css"));
}

#[test]
fn rebuild_is_deterministic() {
    let tmp = blog();
    let root = tmp.path();

    build(root, false, false).unwrap();
    let first = snapshot(&root.join("gen"));
    build(root, false, false).unwrap();
    let second = snapshot(&root.join("gen"));

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn duplicate_entries_fail_before_output() {
    let tmp = blog();
    let root = tmp.path();
    write(root, "posts/2020-01-02.hello.md", "again");

    let result = build(root, false, false);
    assert!(
        matches!(
            result,
            Err(BuildError::Load(LoadError::DuplicateEntry { .. }))
        ),
        "{result:?}"
    );
    assert!(!root.join("gen").exists());
}

#[test]
fn load_then_render_explicitly() {
    let tmp = blog();
    let root = tmp.path();

    let project = Project::load(root, false, true).unwrap();
    assert_eq!(project.file_sets.len(), 1);
    assert_eq!(project.hash_assets.len(), 1);

    let stats = Renderer::new(Minifier::new()).render(project).unwrap();
    assert_eq!(stats.pages, 2);
    assert!(root.join("gen/posts/hello.html").exists());
}

#[test]
fn html_and_extensionless_assets_keep_names() {
    let tmp = blog();
    let root = tmp.path();
    write(root, "static/page.html", "<p>static</p>");
    write(root, "CNAME", "example.com");

    build(root, false, false).unwrap();
    assert_eq!(read(root, "gen/static/page.html"), "<p>static</p>");
    assert_eq!(read(root, "gen/CNAME"), "example.com");
}

#[test]
fn ignored_assets_not_copied() {
    let tmp = blog();
    let root = tmp.path();
    write(root, "sitkin/config.json", r#"{"filesets": ["posts"], "ignore": ["*.sh"]}"#);
    write(root, "deploy.sh", "#!/bin/sh");

    build(root, false, false).unwrap();
    assert!(!root.join("gen/deploy.sh").exists());
}
