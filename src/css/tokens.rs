//! Style-sheet scanning
//!
//! Walks a style sheet with `cssparser` and reports the byte range of every
//! embedded locator (`url(...)` tokens and `@import` string targets) and of
//! every top-level `@import` rule. Callers splice replacements into the
//! original text by range, so everything else is preserved byte for byte.

use cssparser::{ParseError, Parser, ParserInput, Token};
use std::ops::Range;

use crate::resource::ResourceType;

/// How a locator was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSyntax {
    /// `url(x)`, `url("x")` or `url('x')`
    Function,
    /// A bare string, as in `@import "x";`
    String,
}

/// One embedded locator and the context it appeared in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    /// Byte range of the whole token in the scanned text
    pub range: Range<usize>,
    pub value: String,
    pub syntax: UrlSyntax,
    pub in_font_face: bool,
    /// Lower-cased name of the declaration the locator is part of
    pub property: Option<String>,
    /// Target of an `@import` rule
    pub is_import: bool,
}

impl CssUrl {
    /// Resource type implied by where the locator appeared
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        if self.in_font_face {
            ResourceType::Font
        } else if self.property.as_deref() == Some("cursor") {
            ResourceType::Cursor
        } else {
            ResourceType::Image
        }
    }

    /// True for references that never name a separate resource
    #[must_use]
    pub fn is_local(&self) -> bool {
        let value = self.value.trim();
        value.is_empty()
            || value.starts_with('#')
            || value
                .get(..5)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
    }

    /// Render a replacement locator in the token's original syntax
    #[must_use]
    pub fn render(&self, locator: &str) -> String {
        let quoted = quote(locator);
        match self.syntax {
            UrlSyntax::Function => format!("url({quoted})"),
            UrlSyntax::String => quoted,
        }
    }
}

/// One top-level `@import` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRule {
    /// Byte range from `@import` through the closing `;`
    pub range: Range<usize>,
    pub target: String,
    /// Media query / condition list following the target, trimmed
    pub conditions: String,
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, Default)]
struct Scope {
    in_font_face: bool,
    property: Option<String>,
}

#[derive(Debug, Default)]
struct RuleState {
    at_rule: Option<String>,
    last_ident: Option<String>,
    property: Option<String>,
    import_target_seen: bool,
}

/// Every embedded locator in `css`, in source order
#[must_use]
pub fn scan_urls(css: &str) -> Vec<CssUrl> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut urls = Vec::new();
    walk(&mut parser, &Scope::default(), &mut urls);
    urls
}

/// Read the string argument of a `url(` function whose token was just consumed
fn url_function_argument<'i>(parser: &mut Parser<'i, '_>) -> Option<String> {
    parser
        .parse_nested_block(|inner| {
            let mut value = None;
            while let Ok(token) = inner.next() {
                if value.is_none()
                    && let Token::QuotedString(s) = token
                {
                    value = Some(s.to_string());
                }
            }
            Ok::<_, ParseError<'i, ()>>(value)
        })
        .ok()
        .flatten()
}

fn walk<'i>(parser: &mut Parser<'i, '_>, scope: &Scope, urls: &mut Vec<CssUrl>) {
    let mut state = RuleState::default();

    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        let is_import = state.at_rule.as_deref() == Some("import");
        let property = state.property.clone().or_else(|| scope.property.clone());

        match token {
            Token::UnquotedUrl(value) => {
                urls.push(CssUrl {
                    range: start..parser.position().byte_index(),
                    value: value.to_string(),
                    syntax: UrlSyntax::Function,
                    in_font_face: scope.in_font_face,
                    property,
                    is_import,
                });
                state.import_target_seen |= is_import;
            }
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                if let Some(value) = url_function_argument(parser) {
                    urls.push(CssUrl {
                        range: start..parser.position().byte_index(),
                        value,
                        syntax: UrlSyntax::Function,
                        in_font_face: scope.in_font_face,
                        property,
                        is_import,
                    });
                    state.import_target_seen |= is_import;
                }
            }
            Token::QuotedString(value) if is_import && !state.import_target_seen => {
                urls.push(CssUrl {
                    range: start..parser.position().byte_index(),
                    value: value.to_string(),
                    syntax: UrlSyntax::String,
                    in_font_face: false,
                    property: None,
                    is_import: true,
                });
                state.import_target_seen = true;
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                let nested = Scope {
                    in_font_face: scope.in_font_face,
                    property,
                };
                let _ = parser.parse_nested_block(|inner| {
                    walk(inner, &nested, urls);
                    Ok::<_, ParseError<'i, ()>>(())
                });
            }
            Token::CurlyBracketBlock => {
                let nested = Scope {
                    in_font_face: scope.in_font_face
                        || state.at_rule.as_deref() == Some("font-face"),
                    property: None,
                };
                let _ = parser.parse_nested_block(|inner| {
                    walk(inner, &nested, urls);
                    Ok::<_, ParseError<'i, ()>>(())
                });
                state = RuleState::default();
            }
            Token::AtKeyword(name) => {
                state = RuleState {
                    at_rule: Some(name.to_ascii_lowercase()),
                    ..RuleState::default()
                };
            }
            Token::Ident(name) => state.last_ident = Some(name.to_ascii_lowercase()),
            Token::Colon => {
                if state.property.is_none() {
                    state.property = state.last_ident.take();
                }
            }
            Token::Semicolon => state = RuleState::default(),
            _ => {}
        }
    }
}

/// Every top-level `@import` rule in `css`, in source order
///
/// Rules without a target and rules that are not terminated before a
/// block are skipped.
#[must_use]
pub fn scan_imports(css: &str) -> Vec<ImportRule> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut rules = Vec::new();

    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        if let Token::AtKeyword(name) = token
            && name.eq_ignore_ascii_case("import")
            && let Some(rule) = import_prelude(css, &mut parser, start)
        {
            rules.push(rule);
        }
    }

    rules
}

fn import_prelude(css: &str, parser: &mut Parser<'_, '_>, start: usize) -> Option<ImportRule> {
    let mut target: Option<String> = None;
    let mut conditions_start = start;

    loop {
        let before = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            // Unterminated final rule
            Err(_) => {
                let end = parser.position().byte_index();
                return target.map(|target| ImportRule {
                    range: start..end,
                    target,
                    conditions: css[conditions_start..end].trim().to_string(),
                });
            }
        };
        let after = parser.position().byte_index();

        match token {
            Token::Semicolon => {
                return target.map(|target| ImportRule {
                    range: start..after,
                    target,
                    conditions: css[conditions_start..before].trim().to_string(),
                });
            }
            Token::CurlyBracketBlock => return None,
            Token::UnquotedUrl(value) | Token::QuotedString(value) if target.is_none() => {
                target = Some(value.to_string());
                conditions_start = after;
            }
            Token::Function(name) if target.is_none() && name.eq_ignore_ascii_case("url") => {
                target = url_function_argument(parser);
                conditions_start = parser.position().byte_index();
            }
            _ => {}
        }
    }
}
