// Single-file page bundler
//
// Fetches a page and everything it references and prints (or writes) one
// self-contained HTML document.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};

use kodegen_tools_pagebundle::{
    BuildLogger, BundleConfig, BundleConfigBuilder, Bundler, Preset, SilentLogger, TracingLogger,
};

#[derive(Parser)]
#[command(name = "kodegen-pagebundle")]
#[command(version)]
#[command(about = "Bundle a web page and its resources into one HTML file")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Report nothing but errors.
    #[arg(short = 's', long = "silent")]
    silent: bool,

    /// Page to bundle (URL or local path).
    #[arg(value_name = "ENTRY")]
    entry: String,

    /// Write the bundle here instead of stdout.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// JSON configuration file; flags override it.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Apply a named preset (repeatable).
    #[arg(short = 'p', long = "preset", value_enum)]
    presets: Vec<PresetArg>,

    /// Fetch http(s) resources through a headless browser.
    #[arg(long = "browser")]
    browser: bool,

    /// Fetch http(s) resources through Tor.
    #[arg(long = "tor")]
    tor: bool,

    /// SOCKS endpoint used with --tor.
    #[arg(long = "socks-proxy", value_name = "URL")]
    socks_proxy: Option<String>,

    /// Extra request header, `Name: value` (repeatable).
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Remove elements matching this selector before styles are inlined (repeatable).
    #[arg(long = "remove", value_name = "SELECTOR")]
    remove: Vec<String>,

    /// Strip HTML comments from the bundle.
    #[arg(long = "strip-comments")]
    strip_comments: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PresetArg {
    Rendered,
    Anonymous,
    NoScripts,
    TextOnly,
    Minimal,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Rendered => Preset::Rendered,
            PresetArg::Anonymous => Preset::Anonymous,
            PresetArg::NoScripts => Preset::NoScripts,
            PresetArg::TextOnly => Preset::TextOnly,
            PresetArg::Minimal => Preset::Minimal,
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("expected `Name: value`, got '{raw}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header name is empty in '{raw}'");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.silent)?;

    let config = build_config(&cli)?;
    let print = config.output().is_none();
    let logger: Arc<dyn BuildLogger> = if cli.silent {
        Arc::new(SilentLogger)
    } else {
        Arc::new(TracingLogger)
    };

    let bundler = Bundler::new(config).with_logger(logger);
    let result = bundler.run(&cli.entry).await;
    bundler.shutdown().await;
    let output = result.with_context(|| format!("Failed to bundle {}", cli.entry))?;

    if print {
        print!("{}", output.html);
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<BundleConfig> {
    let base = match &cli.config {
        Some(path) => BundleConfig::from_json_file(path)?,
        None => BundleConfig::default(),
    };

    let mut builder = BundleConfigBuilder::from_config(base);
    for preset in &cli.presets {
        builder = builder.preset((*preset).into());
    }
    if cli.browser {
        builder = builder.headless_browser(true);
    }
    if cli.tor {
        builder = builder.tor(true);
    }
    if let Some(proxy) = &cli.socks_proxy {
        builder = builder.socks_proxy(proxy.clone());
    }
    for (name, value) in &cli.headers {
        builder = builder.header(name.clone(), value.clone());
    }
    for selector in &cli.remove {
        builder = builder.remove_before_styles(selector.clone());
    }
    if cli.strip_comments {
        builder = builder.strip_comments(true);
    }
    if let Some(output) = &cli.output {
        builder = builder.output(output.clone());
    }
    Ok(builder.build()?)
}

fn init_tracing(verbose: u8, silent: bool) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env()?
    } else {
        let level = match (silent, verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("warn,pagebundle={level},kodegen_tools_pagebundle={level}"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}
