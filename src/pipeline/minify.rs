//! Script and stylesheet minification.
//!
//! Scripts go through the oxc parser and code generator; stylesheets through
//! a small string-aware scanner.
//!
//! Both minifiers need the whole document, so the stage drains its input
//! before emitting a single chunk.

use std::io;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt, TryStreamExt};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc_minifier::{Minifier as OxcMinifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use tracing::debug;

use crate::files::extension;
use crate::pipeline::ByteStream;

/// Which minifier applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Minifier {
    Css,
    /// Classic script
    Js,
    /// ES module
    Module,
}

impl Minifier {
    /// Picks a minifier by file extension.
    pub fn for_path(path: &Path) -> Option<Self> {
        match extension(path).as_deref() {
            Some("css") => Some(Minifier::Css),
            Some("js") => Some(Minifier::Js),
            Some("mjs") => Some(Minifier::Module),
            _ => None,
        }
    }

    pub fn minify(&self, source: &str) -> String {
        match self {
            Minifier::Css => minify_css(source),
            Minifier::Js => minify_js(source, SourceType::default()),
            Minifier::Module => minify_js(source, SourceType::mjs()),
        }
    }

    /// Wraps a byte stream in this minifier.
    ///
    /// Input that is not UTF-8 is passed through untouched.
    pub fn stage(self, input: ByteStream) -> ByteStream {
        stream::once(async move {
            let raw = input
                .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(&chunk);
                    Ok(acc)
                })
                .await?
                .freeze();

            Ok::<_, io::Error>(match std::str::from_utf8(&raw) {
                Ok(text) => Bytes::from(self.minify(text)),
                Err(_) => raw,
            })
        })
        .boxed()
    }
}

// == CSS ==
fn minify_css(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                flush_space(&mut out, &mut pending_space, c);
                out.push(c);
                copy_string(&mut chars, &mut out, c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars);
                pending_space = true;
            }
            c if c.is_whitespace() => pending_space = true,
            '}' => {
                pending_space = false;
                if out.ends_with(';') {
                    out.pop();
                }
                out.push('}');
            }
            c => {
                flush_space(&mut out, &mut pending_space, c);
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

/// Emits a single space only where it separates two tokens.
fn flush_space(out: &mut String, pending: &mut bool, next: char) {
    const TIGHT: &[char] = &['{', '}', ':', ';', ',', '>'];
    if *pending {
        let prev = out.chars().last();
        if let Some(prev) = prev {
            if !TIGHT.contains(&prev) && !TIGHT.contains(&next) {
                out.push(' ');
            }
        }
    }
    *pending = false;
}

fn copy_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String, quote: char) {
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else if c == quote {
            break;
        }
    }
}

fn skip_block_comment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            break;
        }
    }
}

// == JavaScript ==
/// Whitespace and comment removal through a full parse, so string and
/// template literal contents survive untouched. Scripts that fail to parse
/// are returned as they came.
fn minify_js(source: &str, source_type: SourceType) -> String {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type).parse();
    if !parsed.errors.is_empty() {
        debug!(errors = parsed.errors.len(), "Script did not parse, left unminified");
        return source.to_string();
    }

    let mut program = parsed.program;
    let options = MinifierOptions {
        mangle: None,
        compress: None,
    };
    let minified = OxcMinifier::new(options).minify(&allocator, &mut program);

    Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(minified.scoping)
        .build(&program)
        .code
}
