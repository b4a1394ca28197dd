//! Inter-segment punctuation spacing for styled text runs.

use crate::model::TextSegment;

const SPACED_PUNCTUATION: [char; 6] = [',', '?', '!', ':', ';', '.'];

/// Whether a space belongs between a segment ending in `last` and one
/// starting with `next`.
fn needs_space(last: char, next: char) -> bool {
    if !SPACED_PUNCTUATION.contains(&last) || next.is_whitespace() {
        return false;
    }
    match last {
        // decimal numbers and versions: "3." + "14"
        '.' => !next.is_ascii_digit(),
        // URLs and drive letters: "https:" + "//", "C:" + "\"
        ':' => next != '/' && next != '\\',
        _ => true,
    }
}

fn is_plain_text(seg: &TextSegment) -> bool {
    !seg.inline_code && seg.link.is_none()
}

/// Insert the missing space when one run ends in punctuation and the next
/// starts with a non-blank character (`"Note:"` + `"**bold**"`). Code and
/// link runs are left untouched on both sides. Applying it twice is the same
/// as applying it once.
pub fn normalize_segments(segments: &[TextSegment]) -> Vec<TextSegment> {
    let mut out: Vec<TextSegment> = segments.to_vec();
    for i in 0..out.len().saturating_sub(1) {
        let (head, tail) = out.split_at_mut(i + 1);
        let cur = &mut head[i];
        let next = &tail[0];
        if !is_plain_text(cur) || !is_plain_text(next) {
            continue;
        }
        let (Some(last), Some(first)) = (cur.text.chars().last(), next.text.chars().next()) else {
            continue;
        };
        if needs_space(last, first) {
            cur.text.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> TextSegment {
        TextSegment::plain(text)
    }

    fn bold(text: &str) -> TextSegment {
        TextSegment {
            bold: true,
            ..TextSegment::plain(text)
        }
    }

    fn texts(segs: &[TextSegment]) -> Vec<&str> {
        segs.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn adds_space_after_punctuation_between_runs() {
        let out = normalize_segments(&[seg("Note:"), bold("important"), seg("!"), seg("Next")]);
        assert_eq!(texts(&out), ["Note: ", "important", "! ", "Next"]);
    }

    #[test]
    fn leaves_numbers_urls_and_spaced_runs_alone() {
        let out = normalize_segments(&[seg("pi is 3."), seg("14")]);
        assert_eq!(texts(&out), ["pi is 3.", "14"]);

        let out = normalize_segments(&[seg("see https:"), seg("//example.org")]);
        assert_eq!(texts(&out), ["see https:", "//example.org"]);

        let out = normalize_segments(&[seg("path C:"), seg("\\tmp")]);
        assert_eq!(texts(&out), ["path C:", "\\tmp"]);

        let out = normalize_segments(&[seg("end."), seg(" Start")]);
        assert_eq!(texts(&out), ["end.", " Start"]);
    }

    #[test]
    fn code_and_link_runs_are_untouched() {
        let code = TextSegment {
            inline_code: true,
            ..TextSegment::plain("a.b")
        };
        let link = TextSegment {
            link: Some("https://example.org".into()),
            ..TextSegment::plain("site")
        };
        let out = normalize_segments(&[seg("Call:"), code.clone(), seg("then,"), link.clone()]);
        assert_eq!(texts(&out), ["Call:", "a.b", "then,", "site"]);
    }

    #[test]
    fn idempotent() {
        let input = [seg("a,"), seg("b;"), bold("c?"), seg("d"), seg("")];
        let once = normalize_segments(&input);
        let twice = normalize_segments(&once);
        assert_eq!(once, twice);
        assert_eq!(texts(&once), ["a, ", "b; ", "c? ", "d", ""]);
    }
}
