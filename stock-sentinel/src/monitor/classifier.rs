//! Content classification.
//!
//! Turns raw page text into a [`Classification`]. Markup is stripped with
//! `scraper`, text is lower-cased and whitespace-collapsed, then matched
//! against the configured lexicons. Negative availability evidence always
//! wins over positive evidence found anywhere else in the same document.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use crate::config::LexiconConfig;
use crate::domain::Classification;

/// Elements a visitor can click: their text is checked on its own as well.
static INTERACTIVE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "button, a, [role=button], [onclick], input[type=submit], input[type=button]",
    )
    .expect("interactive selector")
});

/// Elements whose text is never visible.
const INVISIBLE_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Detailed result of one classification, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationReport {
    pub classification: Classification,
    pub matched_order: Vec<String>,
    pub matched_availability: Vec<String>,
    pub matched_negative: Vec<String>,
    /// Input was empty or contained no text at all.
    pub degenerate: bool,
}

/// Lexicons normalized once at construction.
#[derive(Debug, Clone)]
struct Lexicon {
    order: Vec<String>,
    availability: Vec<String>,
    negative: Vec<String>,
}

/// Keyword classifier over page text.
#[derive(Debug, Clone)]
pub struct Classifier {
    lexicon: Lexicon,
}

impl Classifier {
    pub fn new(config: &LexiconConfig) -> Self {
        let prepare = |phrases: &[String]| -> Vec<String> {
            phrases
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.is_empty())
                .collect()
        };

        Self {
            lexicon: Lexicon {
                order: prepare(&config.order),
                availability: prepare(&config.availability),
                negative: prepare(&config.negative_availability),
            },
        }
    }

    /// Classify raw content. Never fails: degenerate input is `(false, false)`.
    pub fn classify(&self, content: &str) -> Classification {
        self.classify_detailed(content).classification
    }

    pub fn classify_detailed(&self, content: &str) -> ClassificationReport {
        if content.trim().is_empty() {
            debug!("ClassificationDegenerate: empty content");
            return ClassificationReport {
                degenerate: true,
                ..Default::default()
            };
        }

        let document = Html::parse_document(content);
        let page_text = normalize(&visible_text(document.root_element()));
        let interactive_texts: Vec<String> = document
            .select(&INTERACTIVE)
            .map(|el| normalize(&interactive_text(el)))
            .filter(|t| !t.is_empty())
            .collect();

        if page_text.is_empty() && interactive_texts.is_empty() {
            debug!(
                content_length = content.len(),
                "ClassificationDegenerate: no visible text"
            );
            return ClassificationReport {
                degenerate: true,
                ..Default::default()
            };
        }

        let matches = |phrases: &[String]| -> Vec<String> {
            phrases
                .iter()
                .filter(|phrase| {
                    page_text.contains(phrase.as_str())
                        || interactive_texts.iter().any(|t| t.contains(phrase.as_str()))
                })
                .cloned()
                .collect()
        };

        let matched_order = matches(&self.lexicon.order);
        let matched_negative = matches(&self.lexicon.negative);
        // Negative evidence is authoritative; positive matches are still
        // reported for diagnostics but cannot set the signal.
        let matched_availability = matches(&self.lexicon.availability);

        let classification = Classification {
            has_order_signal: !matched_order.is_empty(),
            has_availability_signal: matched_negative.is_empty()
                && !matched_availability.is_empty(),
        };

        ClassificationReport {
            classification,
            matched_order,
            matched_availability,
            matched_negative,
            degenerate: false,
        }
    }
}

/// Lower-case and collapse whitespace runs to single spaces.
///
/// The combining dot left behind by lower-casing a dotted capital I (U+0130)
/// is dropped, so Turkish capitals match lower-case lexicon entries.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .flat_map(char::to_lowercase)
                .filter(|c| *c != '\u{0307}')
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concatenate visible text below `root`, skipping script-like subtrees.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if INVISIBLE_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn interactive_text(element: ElementRef<'_>) -> String {
    let mut text = visible_text(element);
    let attrs = element.value();
    if attrs.name() == "input"
        && let Some(value) = attrs.attr("value")
    {
        text.push(' ');
        text.push_str(value);
    }
    if let Some(label) = attrs.attr("aria-label") {
        text.push(' ');
        text.push_str(label);
    }
    text
}
