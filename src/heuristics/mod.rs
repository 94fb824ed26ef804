//! Reply-chain heuristics and the text classifier
//!
//! A [`Heuristic`] is one of three immutable rules:
//!
//! - **Text pattern**: a line-anchored regular expression for a quoted-reply
//!   header in some locale ("On … wrote:", "From: …", "Le … a écrit :")
//! - **Structural marker**: a class the mail client puts on quoted-content wrappers
//! - **Tag identity**: an element whose tag marks it as a quotation (`blockquote`)
//!
//! [`PatternMatcher`] evaluates the text patterns; the sweeper consults the
//! marker and tag rules. The whole set is built once from configuration and is
//! read-only afterwards.
//!
//! # Fail-Safe Guarantee
//!
//! Classification never errors. Empty input, or input no pattern matches, is
//! `NotReplyChain`: uncertainty always leads to keeping content, never removing it.

pub mod locales;

use crate::config::{HeuristicsConfig, PatternConfig};
use crate::dom::ElementData;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ============================================================================
// Verdict
// ============================================================================

/// Outcome of classifying one block of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    ReplyChain,
    NotReplyChain,
}

impl Verdict {
    pub fn is_reply_chain(self) -> bool {
        self == Verdict::ReplyChain
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::ReplyChain => "REPLY_CHAIN",
            Verdict::NotReplyChain => "NOT_REPLY_CHAIN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Heuristics
// ============================================================================

/// A compiled text-pattern heuristic
#[derive(Debug, Clone)]
pub struct TextPattern {
    name: String,
    locale: String,
    source: String,
    regex: Regex,
}

impl TextPattern {
    /// Compile a pattern in multi-line mode
    pub fn new(name: &str, locale: &str, pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("(?m){pattern}"))?;
        Ok(Self {
            name: name.to_string(),
            locale: locale.to_string(),
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// The pattern as written, without the multi-line flag
    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// One rule of the heuristic set, borrowed for display
#[derive(Debug, Clone, Copy)]
pub enum Heuristic<'a> {
    TextPattern(&'a TextPattern),
    StructuralMarker(&'a str),
    TagIdentity(&'a str),
}

impl fmt::Display for Heuristic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Heuristic::TextPattern(p) => {
                write!(f, "text-pattern {}/{} {}", p.locale(), p.name(), p.pattern())
            }
            Heuristic::StructuralMarker(class) => write!(f, "structural-marker .{class}"),
            Heuristic::TagIdentity(tag) => write!(f, "tag-identity <{tag}>"),
        }
    }
}

// ============================================================================
// Pattern Matcher
// ============================================================================

/// Ordered disjunction of text-pattern heuristics
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<TextPattern>,
}

impl PatternMatcher {
    pub fn new(patterns: Vec<TextPattern>) -> Self {
        Self { patterns }
    }

    /// Classify text: `ReplyChain` as soon as any pattern matches any line
    pub fn classify(&self, text: &str) -> Verdict {
        if self.explain(text).is_some() {
            Verdict::ReplyChain
        } else {
            Verdict::NotReplyChain
        }
    }

    /// The first pattern that matches, if any
    pub fn explain(&self, text: &str) -> Option<&TextPattern> {
        let text = normalize(text);
        if text.is_empty() {
            return None;
        }
        self.patterns.iter().find(|p| p.is_match(&text))
    }

    pub fn patterns(&self) -> &[TextPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Trim and fold `\r\n` / `\r` line endings into `\n` so `$` anchors behave
fn normalize(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    if trimmed.contains('\r') {
        Cow::Owned(trimmed.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(trimmed)
    }
}

// ============================================================================
// Heuristic Set
// ============================================================================

/// Every heuristic the sweeper applies, built once at startup
#[derive(Debug, Clone)]
pub struct HeuristicSet {
    matcher: PatternMatcher,
    marker_classes: Vec<String>,
    quote_tags: Vec<String>,
}

impl HeuristicSet {
    /// Build from configuration
    ///
    /// Unknown locales and patterns that fail to compile are skipped with a
    /// warning; the remaining heuristics stay active.
    pub fn from_config(config: &HeuristicsConfig) -> Self {
        let mut patterns = Vec::new();

        for locale in &config.locales {
            match locales::find(locale) {
                Some(pack) => {
                    for (name, pattern) in pack.patterns {
                        push_pattern(&mut patterns, name, pack.locale, pattern);
                    }
                }
                None => tracing::warn!("Unknown heuristic locale '{}', skipping", locale),
            }
        }

        for PatternConfig {
            name,
            locale,
            pattern,
        } in &config.patterns
        {
            let locale = locale.as_deref().unwrap_or("custom");
            push_pattern(&mut patterns, name, locale, pattern);
        }

        let matcher = PatternMatcher::new(patterns);
        if matcher.is_empty() {
            tracing::warn!("No text patterns enabled; only marker classes will be removed");
        }

        Self {
            matcher,
            marker_classes: config.marker_classes.clone(),
            quote_tags: config
                .quote_tags
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn classify(&self, text: &str) -> Verdict {
        self.matcher.classify(text)
    }

    /// Carries the host's explicit "quoted content" marker
    pub fn is_marker(&self, element: &ElementData) -> bool {
        self.marker_classes.iter().any(|c| element.has_class(c))
    }

    /// Tag identifies the element as a quotation
    pub fn is_quote_tag(&self, element: &ElementData) -> bool {
        self.quote_tags.iter().any(|t| t == element.tag())
    }

    /// All rules in evaluation order: markers, tags, then text patterns
    pub fn heuristics(&self) -> Vec<Heuristic<'_>> {
        self.marker_classes
            .iter()
            .map(|c| Heuristic::StructuralMarker(c))
            .chain(self.quote_tags.iter().map(|t| Heuristic::TagIdentity(t)))
            .chain(self.matcher.patterns().iter().map(Heuristic::TextPattern))
            .collect()
    }
}

impl Default for HeuristicSet {
    fn default() -> Self {
        Self::from_config(&HeuristicsConfig::default())
    }
}

fn push_pattern(patterns: &mut Vec<TextPattern>, name: &str, locale: &str, pattern: &str) {
    match TextPattern::new(name, locale, pattern) {
        Ok(p) => patterns.push(p),
        Err(e) => tracing::warn!(
            pattern = name,
            "Skipping heuristic pattern '{}': {}",
            name,
            e
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
