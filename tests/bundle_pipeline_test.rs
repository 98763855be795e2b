//! Stage ordering, extension points and built-in stage behaviour

use anyhow::{anyhow, bail};
use kodegen_tools_pagebundle::{
    BuildContext, BundleConfig, BundleError, DocumentPhase, LogLevel, MemoryLogger, Preset,
    ResourceCache, ResourceType, Slot, Stage, hook_fn,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

mod common;
use common::{MapTransport, PIXEL_GIF, SMALL_PNG, bundler, occurrences, page};

const ENTRY: &str = "https://site.test/index.html";

fn single_page(head: &str, body: &str) -> Arc<MapTransport> {
    Arc::new(MapTransport::new().with(ENTRY, page(head, body)))
}

#[tokio::test]
async fn test_same_target_spelled_differently_is_one_entry() {
    let transport = Arc::new(
        MapTransport::new()
            .with(
                ENTRY,
                page(
                    "<style>.hero{background:url(/img/p.png)}</style>",
                    r#"<img src="img/p.png"><img src="./img/p.png"><img src="https://site.test/img/p.png">"#,
                ),
            )
            .with("https://site.test/img/p.png", SMALL_PNG),
    );

    let output = bundler(BundleConfig::default(), &transport).run(ENTRY).await.unwrap();

    assert_eq!(transport.calls("https://site.test/img/p.png"), 1);
    assert_eq!(output.summary.resources.total, 2);
    assert_eq!(output.summary.resources.succeeded, 2);
    assert_eq!(occurrences(&output.html, r#"src="data:image/png;base64,"#), 3);
    assert!(output.html.contains(r#".hero{background:url("data:image/png;base64,"#));
}

#[tokio::test]
async fn test_every_slot_runs_in_stage_order() {
    let transport = single_page("", "<p>x</p>");
    let trace = Arc::new(Mutex::new(Vec::new()));

    let mut bundler = bundler(BundleConfig::default(), &transport);
    for stage in Stage::ALL {
        for slot in [Slot::After, Slot::Before] {
            let trace = Arc::clone(&trace);
            bundler = bundler.hook(
                stage,
                slot,
                hook_fn(format!("{slot}-{stage}"), move |_ctx: &mut BuildContext| {
                    trace.lock().push(format!("{slot}-{stage}"));
                    Ok(())
                }),
            );
        }
    }
    let output = bundler.run(ENTRY).await.unwrap();

    let expected: Vec<String> = Stage::ALL
        .iter()
        .flat_map(|stage| [format!("before-{stage}"), format!("after-{stage}")])
        .collect();
    assert_eq!(*trace.lock(), expected);
    assert_eq!(output.summary.timings.len(), Stage::ALL.len());
}

#[tokio::test]
async fn test_hooks_in_one_slot_run_in_registration_order() {
    let transport = single_page("", "");
    let trace = Arc::new(Mutex::new(Vec::new()));
    let (first, second) = (Arc::clone(&trace), Arc::clone(&trace));

    bundler(BundleConfig::default(), &transport)
        .hook(
            Stage::InitialFetch,
            Slot::Before,
            hook_fn("first", move |_ctx: &mut BuildContext| {
                first.lock().push("first");
                Ok(())
            }),
        )
        .hook(
            Stage::InitialFetch,
            Slot::Before,
            hook_fn("second", move |_ctx: &mut BuildContext| {
                second.lock().push("second");
                Ok(())
            }),
        )
        .run(ENTRY)
        .await
        .unwrap();

    assert_eq!(*trace.lock(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_failing_hook_aborts_the_build() {
    let transport = Arc::new(
        MapTransport::new()
            .with(ENTRY, page("", r#"<img src="a.gif">"#))
            .with("https://site.test/a.gif", PIXEL_GIF),
    );
    let reached = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&reached);

    let err = bundler(BundleConfig::default(), &transport)
        .hook(
            Stage::ResourceFetch,
            Slot::Before,
            hook_fn("explode", |_ctx: &mut BuildContext| Err(anyhow!("boom"))),
        )
        .hook(
            Stage::ResourceFetch,
            Slot::After,
            hook_fn("never", move |_ctx: &mut BuildContext| {
                *flag.lock() = true;
                Ok(())
            }),
        )
        .run(ENTRY)
        .await
        .unwrap_err();

    match err {
        BundleError::Hook { stage, hook, message } => {
            assert_eq!(stage, Stage::ResourceFetch);
            assert_eq!(hook, "explode");
            assert!(message.contains("boom"));
        }
        other => panic!("expected hook error, got {other:?}"),
    }
    assert!(!*reached.lock());
    assert_eq!(transport.calls("https://site.test/a.gif"), 0);
}

#[tokio::test]
async fn test_missing_entry_is_a_structural_failure() {
    let transport = Arc::new(MapTransport::new());

    let err = bundler(BundleConfig::default(), &transport)
        .run(ENTRY)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BundleError::EntryFetch { ref url, status_code: 404 } if url == ENTRY
    ));
}

#[tokio::test]
async fn test_hook_can_rewrite_entry_markup() {
    let transport = single_page("", "<p>original</p>");

    let output = bundler(BundleConfig::default(), &transport)
        .hook(
            Stage::InitialFetch,
            Slot::After,
            hook_fn("rewrite", |ctx: &mut BuildContext| {
                let markup = ctx.entry_markup().unwrap_or_default().replace("original", "rewritten");
                ctx.set_entry_markup(markup);
                Ok(())
            }),
        )
        .run(ENTRY)
        .await
        .unwrap();

    assert!(output.html.contains("<p>rewritten</p>"));
}

#[tokio::test]
async fn test_scripts_are_inlined_and_failures_emptied() {
    let transport = Arc::new(
        MapTransport::new()
            .with(
                ENTRY,
                page(
                    r#"<script src="js/app.js" integrity="sha384-abc"></script>"#,
                    r#"<img src="missing.png"><link rel="icon" href="/favicon.gif">"#,
                ),
            )
            .with("https://site.test/js/app.js", "window.ready = true;")
            .with("https://site.test/favicon.gif", PIXEL_GIF),
    );

    let output = bundler(BundleConfig::default(), &transport).run(ENTRY).await.unwrap();

    assert!(output.html.contains("<script>window.ready = true;</script>"));
    assert!(!output.html.contains("integrity"));
    assert!(output.html.contains(r#"<img src="">"#));
    assert!(output.html.contains(r#"href="data:image/gif;base64,"#));
    assert_eq!(output.summary.resources.failed, 1);
}

#[tokio::test]
async fn test_base_href_redirects_relative_references() {
    let transport = Arc::new(
        MapTransport::new()
            .with(
                ENTRY,
                page(r#"<base href="https://cdn.test/assets/">"#, r#"<img src="logo.png">"#),
            )
            .with("https://cdn.test/assets/logo.png", SMALL_PNG),
    );

    let output = bundler(BundleConfig::default(), &transport).run(ENTRY).await.unwrap();

    assert_eq!(transport.calls("https://cdn.test/assets/logo.png"), 1);
    assert!(output.html.contains(r#"<img src="data:image/png;base64,"#));
}

#[tokio::test]
async fn test_configured_removals_and_comment_stripping() {
    let transport = single_page(
        "<!-- analytics -->",
        r#"<div class="ad">buy</div><p>content</p><footer>f</footer>"#,
    );
    let config = BundleConfig::builder()
        .remove_before_styles(".ad")
        .remove_after_styles("footer")
        .strip_comments(true)
        .build()
        .unwrap();

    let output = bundler(config, &transport).run(ENTRY).await.unwrap();

    assert!(output.html.contains("<p>content</p>"));
    assert!(!output.html.contains("buy"));
    assert!(!output.html.contains("<footer>"));
    assert!(!output.html.contains("<!--"));
}

#[tokio::test]
async fn test_no_scripts_preset_removes_and_skips_scripts() {
    let transport = Arc::new(
        MapTransport::new()
            .with(ENTRY, page(r#"<script src="app.js"></script>"#, "<noscript>x</noscript><p>y</p>"))
            .with("https://site.test/app.js", "alert(1)"),
    );
    let config = BundleConfig::builder().preset(Preset::NoScripts).build().unwrap();

    let output = bundler(config, &transport).run(ENTRY).await.unwrap();

    assert!(!output.html.contains("<script"));
    assert!(!output.html.contains("<noscript"));
    assert_eq!(transport.calls("https://site.test/app.js"), 0);
}

#[tokio::test]
async fn test_minimal_preset_empties_tracking_pixels() {
    let transport = Arc::new(
        MapTransport::new()
            .with(ENTRY, page("", r#"<img src="pixel.gif"><img src="photo.png">"#))
            .with("https://site.test/pixel.gif", PIXEL_GIF)
            .with("https://site.test/photo.png", SMALL_PNG),
    );
    let config = BundleConfig::builder().preset(Preset::Minimal).build().unwrap();

    let output = bundler(config, &transport).run(ENTRY).await.unwrap();

    assert!(output.html.contains(r#"<img src="">"#));
    assert!(output.html.contains(r#"<img src="data:image/png;base64,"#));
}

#[tokio::test]
async fn test_collaborators_run_and_failures_are_contained() {
    let transport = single_page("", "<p>Hello</p><noscript>n</noscript>");
    let logger = Arc::new(MemoryLogger::new());

    let output = bundler(BundleConfig::default(), &transport)
        .with_logger(logger.clone())
        .document_plugin(DocumentPhase::Final, |doc: &kuchiki::NodeRef| -> anyhow::Result<()> {
            let nodes: Vec<_> = doc
                .select("noscript")
                .map_err(|()| anyhow!("bad selector"))?
                .collect();
            for node in nodes {
                node.as_node().detach();
            }
            Ok(())
        })
        .resource_plugin(|_cache: &ResourceCache| -> anyhow::Result<()> { bail!("transcoder unavailable") })
        .markup_plugin(|markup: &str| -> anyhow::Result<String> { Ok(markup.replace("Hello", "Bonjour")) })
        .run(ENTRY)
        .await
        .unwrap();

    assert!(output.html.contains("<p>Bonjour</p>"));
    assert!(!output.html.contains("noscript"));
    assert!(logger.contains("transcoder unavailable"));
    assert_eq!(logger.count(LogLevel::Warn), 1);
}

#[tokio::test]
async fn test_type_dropping_leaves_empty_values() {
    let transport = Arc::new(
        MapTransport::new()
            .with(ENTRY, page("", r#"<video src="clip.webm" poster="poster.png"></video>"#))
            .with("https://site.test/clip.webm", b"\x1a\x45\xdf\xa3".as_slice())
            .with("https://site.test/poster.png", SMALL_PNG),
    );
    let config = BundleConfig::builder().drop_type(ResourceType::Video).build().unwrap();

    let output = bundler(config, &transport).run(ENTRY).await.unwrap();

    assert!(output.html.contains(r#"src="""#));
    assert!(output.html.contains(r#"poster="data:image/png;base64,"#));
}

#[tokio::test]
async fn test_output_file_is_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bundle.html");
    let transport = single_page("", "<p>saved</p>");
    let config = BundleConfig::builder().output(&path).build().unwrap();

    let output = bundler(config, &transport).run(ENTRY).await.unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, output.html);
    assert!(written.contains("<p>saved</p>"));
}
