//! Grapheme cluster display width.
//!
//! `egc_width` is the single authority for terminal cell widths; the renderer's wrap math and
//! the completion popup anchor both flow through it. The baseline comes from `unicode_width`,
//! with a small classifier that widens emoji composites the crate under-measures.
//!
//! Over-estimation only costs a blank cell; under-estimation makes the redraw cursor drift onto
//! the wrong row, so every ambiguous case widens.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EgcKind {
    Ascii,
    Narrow,
    Wide,
    Control,
    Emoji,
    /// Base + combining mark(s); bool indicates a wide/emoji base.
    Combining(bool),
}

const ZWJ: char = '\u{200D}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

// Rough Extended Pictographic heuristic (emoji blocks + misc symbols used as emoji)
fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
        || ('\u{1AB0}'..='\u{1AFF}').contains(&c)
        || ('\u{1DC0}'..='\u{1DFF}').contains(&c)
        || ('\u{20D0}'..='\u{20FF}').contains(&c)
        || ('\u{FE20}'..='\u{FE2F}').contains(&c)
}

fn char_width(c: char) -> usize {
    unicode_width::UnicodeWidthChar::width(c).unwrap_or(0)
}

fn classify(egc: &str) -> EgcKind {
    let mut chars = egc.chars();
    let Some(first) = chars.next() else {
        return EgcKind::Narrow;
    };
    let single = chars.next().is_none();

    if single {
        if first.is_ascii_control() {
            return EgcKind::Control;
        }
        if first.is_ascii() {
            return EgcKind::Ascii;
        }
        if is_extended_pictographic(first) {
            return EgcKind::Emoji;
        }
        return if char_width(first) == 2 {
            EgcKind::Wide
        } else {
            EgcKind::Narrow
        };
    }

    let mut pictographic = 0usize;
    let mut regional = 0usize;
    let mut has_zwj = false;
    let mut has_combining = false;
    let mut any_wide = false;
    for c in egc.chars() {
        if is_extended_pictographic(c) {
            pictographic += 1;
        }
        if is_regional_indicator(c) {
            regional += 1;
        }
        has_zwj |= c == ZWJ;
        has_combining |= is_combining_mark(c);
        any_wide |= char_width(c) == 2;
    }

    if pictographic > 0 || regional == 2 || (has_zwj && pictographic >= 2) {
        return EgcKind::Emoji;
    }
    if has_combining {
        let base_wide = char_width(first) == 2 || is_extended_pictographic(first);
        return EgcKind::Combining(base_wide);
    }
    if any_wide {
        return EgcKind::Wide;
    }
    EgcKind::Narrow
}

/// Return the display column width for a single grapheme cluster (EGC).
///
/// Precondition: `egc` is one grapheme cluster. Control characters report zero so stray bytes
/// never push the wrap calculation past the real cursor.
#[inline]
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }
    match classify(egc) {
        EgcKind::Control => 0,
        EgcKind::Ascii | EgcKind::Narrow => 1,
        EgcKind::Wide | EgcKind::Emoji => 2,
        EgcKind::Combining(base_wide) => {
            if base_wide {
                2
            } else {
                1
            }
        }
    }
}

/// Total display width of an arbitrary string (segmented into clusters first).
pub fn str_width(s: &str) -> usize {
    s.graphemes(true).map(|g| egc_width(g) as usize).sum()
}
