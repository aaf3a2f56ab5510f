//! Text normalization for speech backends.
//!
//! Line breaks become sentence breaks so the synthesizer pauses instead of
//! reading layout artifacts, whitespace runs collapse, and a fixed table of
//! abbreviations is expanded to deterministic spoken forms.

/// Characters that already end a sentence; a following line break needs no period.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', ':', ';'];

/// Abbreviation → spoken form, applied in declaration order.
const PRONUNCIATIONS: &[(&str, &str)] = &[
    ("ANSI/NECA", "ANSI NECA"),
    ("LED", "L.E.D."),
    ("MUTCD", "M.U.T.C.D."),
    ("NIST", "N.I.S.T."),
    ("sq. yd", "square yard"),
    ("sq. m", "square meter"),
];

/// Normalize narration text for synthesis.
///
/// Pure and idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let mut joined = String::with_capacity(text.len());
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !joined.is_empty() {
            if joined.ends_with(SENTENCE_TERMINATORS) {
                joined.push(' ');
            } else {
                joined.push_str(". ");
            }
        }
        joined.push_str(line);
    }

    let mut out = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    for (pattern, spoken) in PRONUNCIATIONS {
        if out.contains(pattern) {
            out = out.replace(pattern, spoken);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_stays_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("  \n\n\t "), "");
    }

    #[test]
    fn newline_becomes_sentence_break() {
        assert_eq!(sanitize("Introduction\nThe scope"), "Introduction. The scope");
    }

    #[test]
    fn newline_after_punctuation_becomes_space() {
        assert_eq!(sanitize("First point.\nSecond point"), "First point. Second point");
        assert_eq!(sanitize("Really?\n\nYes"), "Really? Yes");
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(sanitize("One\n\n\n  Two  "), "One. Two");
    }

    #[test]
    fn double_spaces_collapse() {
        assert_eq!(sanitize("too  many   spaces\there"), "too many spaces here");
    }

    #[test]
    fn abbreviations_expand() {
        assert_eq!(
            sanitize("Per NIST and MUTCD, use LED lamps"),
            "Per N.I.S.T. and M.U.T.C.D., use L.E.D. lamps"
        );
        assert_eq!(sanitize("ANSI/NECA 301"), "ANSI NECA 301");
    }

    #[test]
    fn area_units_expand() {
        assert_eq!(sanitize("12 sq. yd of turf"), "12 square yard of turf");
        assert_eq!(sanitize("40 sq. m floor"), "40 square meter floor");
    }

    #[test]
    fn unit_split_across_lines_still_expands() {
        assert_eq!(sanitize("40 sq.\nm floor"), "40 square meter floor");
    }

    #[test]
    fn crlf_handled() {
        assert_eq!(sanitize("a\r\nb"), "a. b");
    }

    #[test]
    fn idempotent_on_examples() {
        for input in [
            "Section 1\nLED fixtures per NIST.\n\n  sq. m  totals",
            "LEDLED",
            "a\n.\nb",
            "sq.  m",
        ] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
    }

    proptest! {
        #[test]
        fn idempotent_for_arbitrary_text(text in "(?s).{0,200}") {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn idempotent_for_abbreviation_soup(
            text in "(LED|NIST|MUTCD|ANSI/NECA|sq\\. yd|sq\\. m|sq\\.|[ \n\t.]|[a-zA-Z]){0,40}"
        ) {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn output_has_no_line_breaks(text in "(?s).{0,200}") {
            let out = sanitize(&text);
            prop_assert!(!out.contains('\n'));
            prop_assert!(!out.contains("  "));
        }
    }
}
