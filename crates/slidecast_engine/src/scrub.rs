//! Cleanup pass for locally generated narration scripts.
//!
//! Small local models wrap their answers in conversational preambles,
//! markdown and quotes, and frequently drop terminal punctuation — which the
//! downstream narration synthesizer relies on for pause placement. The pass
//! is idempotent: scrubbing already-clean text leaves it unchanged.

use regex::Regex;
use std::sync::LazyLock;

static PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^here is the (transformed )?text:?\s*",
        r"(?i)^here is the (transformed )?script:?\s*",
        r"(?i)^transformed text:?\s*",
        r"(?i)^output:?\s*",
        r"(?i)^sure,? here is (the )?(transformed )?(text|script)( you requested)?:?\s*",
        r"(?i)^okay,? here is (the )?(transformed )?text:?\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CODE_FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```\w*\n").unwrap());
static CODE_FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n```$").unwrap());

/// Emphasis wrappers unwrapped to their inner text.
static EMPHASIS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\*\*(.+?)\*\*",
        r"\*(.+?)\*",
        r"`(.+?)`",
        r"__(.+?)__",
        r"_(.+?)_",
        r"~~(.+?)~~",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static HEADERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static LINKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.+?)\]\(.+?\)").unwrap());
static LIST_BULLETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*+]\s+").unwrap());
static LIST_NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\.\s+").unwrap());

/// Strip conversational preambles, markdown artifacts and wrapping quotes,
/// then enforce terminal punctuation on every sentence-like chunk.
pub fn scrub_generated_text(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    // To fixpoint: stacked preambles must not survive a single pass.
    loop {
        let before = cleaned.clone();
        for prefix in PREFIXES.iter() {
            cleaned = prefix.replace(&cleaned, "").into_owned();
        }
        if cleaned == before {
            break;
        }
    }

    cleaned = CODE_FENCE_OPEN.replace(&cleaned, "").into_owned();
    cleaned = CODE_FENCE_CLOSE.replace(&cleaned, "").into_owned();

    for emphasis in EMPHASIS.iter() {
        cleaned = emphasis.replace_all(&cleaned, "$1").into_owned();
    }

    cleaned = HEADERS.replace_all(&cleaned, "").into_owned();
    cleaned = LINKS.replace_all(&cleaned, "$1").into_owned();
    cleaned = LIST_BULLETS.replace_all(&cleaned, "").into_owned();
    cleaned = LIST_NUMBERS.replace_all(&cleaned, "").into_owned();

    let mut cleaned = cleaned.trim().to_string();

    if cleaned.len() >= 2
        && ((cleaned.starts_with('"') && cleaned.ends_with('"'))
            || (cleaned.starts_with('\'') && cleaned.ends_with('\'')))
    {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    ensure_terminal_punctuation(cleaned.trim())
}

/// Append a period to every non-empty line that does not already end in
/// terminal punctuation (trailing quotes/brackets are looked through).
pub fn ensure_terminal_punctuation(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_end();
            if trimmed.is_empty() || !needs_period(trimmed) {
                trimmed.to_string()
            } else {
                format!("{trimmed}.")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn needs_period(line: &str) -> bool {
    let significant = line.trim_end_matches(['"', '\'', ')', ']']);
    match significant.chars().last() {
        Some('.') | Some('!') | Some('?') | Some(':') | Some(';') | Some('…') => false,
        Some(_) => true,
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_conversational_prefixes() {
        assert_eq!(
            scrub_generated_text("Here is the transformed text: Welcome to the guide."),
            "Welcome to the guide."
        );
        assert_eq!(
            scrub_generated_text("Sure, here is the script you requested: Let's begin."),
            "Let's begin."
        );
        assert_eq!(
            scrub_generated_text("Output: This slide covers setup."),
            "This slide covers setup."
        );
    }

    #[test]
    fn strips_code_fences() {
        let input = "```text\nWelcome to the tutorial.\n```";
        assert_eq!(scrub_generated_text(input), "Welcome to the tutorial.");
    }

    #[test]
    fn strips_markdown_emphasis() {
        assert_eq!(
            scrub_generated_text("This is **very** important, *really* `important`."),
            "This is very important, really important."
        );
        assert_eq!(
            scrub_generated_text("Use __bold__ and ~~strike~~ sparingly."),
            "Use bold and strike sparingly."
        );
    }

    #[test]
    fn strips_headers_links_and_lists() {
        let input = "## Setup\n- First step\n1. Second step\nSee [the docs](https://example.com)";
        assert_eq!(
            scrub_generated_text(input),
            "Setup.\nFirst step.\nSecond step.\nSee the docs."
        );
    }

    #[test]
    fn strips_wrapping_quotes() {
        assert_eq!(
            scrub_generated_text("\"Welcome to the presentation.\""),
            "Welcome to the presentation."
        );
        assert_eq!(
            scrub_generated_text("'Welcome to the presentation.'"),
            "Welcome to the presentation."
        );
    }

    #[test]
    fn appends_missing_terminal_punctuation() {
        assert_eq!(
            scrub_generated_text("Welcome to the guide"),
            "Welcome to the guide."
        );
        assert_eq!(
            scrub_generated_text("First line\nSecond line!"),
            "First line.\nSecond line!"
        );
    }

    #[test]
    fn keeps_existing_terminal_punctuation() {
        for ending in ["Done.", "Really?", "Go!", "Note:", "Wait;"] {
            assert_eq!(scrub_generated_text(ending), ending);
        }
    }

    #[test]
    fn period_goes_after_inner_quote_check() {
        assert_eq!(
            scrub_generated_text("Click the button labeled \"Install\" now"),
            "Click the button labeled \"Install\" now."
        );
        // Terminal punctuation inside a trailing quote counts.
        assert_eq!(
            ensure_terminal_punctuation("He said \"done.\""),
            "He said \"done.\""
        );
    }

    #[test]
    fn scrub_is_idempotent() {
        let inputs = [
            "Here is the transformed text: **Welcome** to the guide",
            "Output: Output: stacked preambles",
            "```\nSome fenced text\n```",
            "\"Quoted output\"",
            "Plain sentence already clean.",
            "## Header\n- item one\n- item two",
        ];
        for input in inputs {
            let once = scrub_generated_text(input);
            let twice = scrub_generated_text(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(scrub_generated_text(""), "");
        assert_eq!(scrub_generated_text("   \n  "), "");
    }
}
