//! Full runs through the default dispatcher against local files and a mock
//! HTTP server

use kodegen_tools_pagebundle::{
    BundleConfig, Bundler, LogLevel, MemoryLogger, SilentLogger, bundle,
};
use mockito::Server;
use std::sync::Arc;
use tempfile::TempDir;

mod common;
use common::{PIXEL_GIF, SMALL_PNG, page};

#[tokio::test]
async fn test_http_page_is_bundled() {
    let mut server = Server::new_async().await;
    let html = page(
        r#"<link rel="stylesheet" href="/static/site.css">"#,
        r#"<img src="/static/logo.png"><img src="/static/missing.png">"#,
    );
    let index = server
        .mock("GET", "/index.html")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html)
        .expect(1)
        .create_async()
        .await;
    let css = server
        .mock("GET", "/static/site.css")
        .with_status(200)
        .with_header("content-type", "text/css")
        .with_body("body{background:url(bg.gif)}")
        .expect(1)
        .create_async()
        .await;
    let logo = server
        .mock("GET", "/static/logo.png")
        .with_status(200)
        .with_body(SMALL_PNG)
        .expect(1)
        .create_async()
        .await;
    let background = server
        .mock("GET", "/static/bg.gif")
        .with_status(200)
        .with_body(PIXEL_GIF)
        .expect(1)
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/static/missing.png")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let logger = Arc::new(MemoryLogger::new());
    let bundler = Bundler::new(BundleConfig::default()).with_logger(logger.clone());
    let entry = format!("{}/index.html", server.url());
    let output = bundler.run(&entry).await.unwrap();
    bundler.shutdown().await;

    index.assert_async().await;
    css.assert_async().await;
    logo.assert_async().await;
    background.assert_async().await;
    missing.assert_async().await;

    assert!(output.html.contains(r#"body{background:url("data:image/gif;base64,"#));
    assert!(output.html.contains(r#"<img src="data:image/png;base64,"#));
    assert!(output.html.contains(r#"<img src="">"#));
    assert!(!output.html.contains("<link"));

    assert_eq!(output.summary.resources.total, 5);
    assert_eq!(output.summary.resources.failed, 1);
    assert!(logger.contains("via http (200)"));
    assert!(logger.contains("Failed to fetch"));
    assert!(logger.count(LogLevel::Warn) >= 1);
}

#[tokio::test]
async fn test_local_page_is_bundled() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        page(
            r#"<link rel="stylesheet" href="css/site.css">"#,
            r#"<img src="my%20pic.gif"><script src="app.js"></script>"#,
        ),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("css/site.css"),
        "@import 'reset.css';\n.logo{background:url(../my%20pic.gif)}",
    )
    .unwrap();
    std::fs::write(dir.path().join("css/reset.css"), "*{margin:0}").unwrap();
    std::fs::write(dir.path().join("my pic.gif"), PIXEL_GIF).unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log('local')").unwrap();

    let entry = dir.path().join("index.html");
    let output = bundle(entry.to_str().unwrap(), BundleConfig::default())
        .await
        .unwrap();

    assert!(output.html.contains("*{margin:0}"));
    assert!(output.html.contains(r#".logo{background:url("data:image/gif;base64,"#));
    assert!(output.html.contains(r#"<img src="data:image/gif;base64,"#));
    assert!(output.html.contains("<script>console.log('local')</script>"));
    assert_eq!(output.summary.resources.failed, 0);
}

#[tokio::test]
async fn test_data_references_are_left_in_place() {
    let dir = TempDir::new().unwrap();
    let inline = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";
    std::fs::write(
        dir.path().join("index.html"),
        page("", &format!(r#"<img src="{inline}">"#)),
    )
    .unwrap();

    let bundler =
        Bundler::new(BundleConfig::default()).with_logger(Arc::new(SilentLogger));
    let entry = dir.path().join("index.html");
    let output = bundler.run(entry.to_str().unwrap()).await.unwrap();

    assert!(output.html.contains(inline));
    assert_eq!(output.summary.resources.total, 1);
}

#[tokio::test]
async fn test_local_spellings_of_one_file_share_an_entry() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("site")).unwrap();
    std::fs::create_dir(dir.path().join("img")).unwrap();
    std::fs::write(dir.path().join("img").join("p.gif"), PIXEL_GIF).unwrap();
    let spelled_out = dir.path().join("site").join("..").join("img").join("p.gif");
    std::fs::write(
        dir.path().join("site").join("index.html"),
        page(
            "",
            &format!(
                r#"<img src="../img/p.gif"><img src="{}">"#,
                spelled_out.to_string_lossy()
            ),
        ),
    )
    .unwrap();

    let bundler =
        Bundler::new(BundleConfig::default()).with_logger(Arc::new(SilentLogger));
    let entry = dir.path().join("site").join("index.html");
    let output = bundler.run(entry.to_str().unwrap()).await.unwrap();

    assert_eq!(output.summary.resources.total, 2);
    assert_eq!(output.html.matches(r#"src="data:image/gif;base64,"#).count(), 2);
}
