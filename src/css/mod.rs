//! Style-sheet processing: locator rebasing and `@import` inlining

pub mod imports;
pub mod rebase;
pub mod tokens;

pub use imports::{ImportResolver, inline_cache_stylesheets};
pub use rebase::{collect_urls, rebase, rewrite_urls};
pub use tokens::{CssUrl, ImportRule, UrlSyntax, scan_imports, scan_urls};
