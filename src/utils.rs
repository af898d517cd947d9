//! Utility functions for filename handling

/// Maximum length of a generated file stem, in characters
const MAX_STEM_LEN: usize = 120;

/// Sanitize a string for use as a filename component.
///
/// Replaces path separators and characters that are invalid on common
/// filesystems with `_`, strips control characters, collapses whitespace,
/// and trims leading/trailing dots and spaces. The result is capped at
/// 120 characters so that generated names stay well below filesystem and
/// archive-header limits.
///
/// # Examples
///
/// ```
/// use music_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC"), "AC_DC");
/// assert_eq!(sanitize_filename("  spaced   out  "), "spaced out");
/// ```
#[must_use]
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for c in input.chars() {
        let mapped = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => Some('_'),
            c if c.is_control() => None,
            c if c.is_whitespace() => {
                if last_was_space {
                    None
                } else {
                    Some(' ')
                }
            }
            c => Some(c),
        };
        if let Some(m) = mapped {
            last_was_space = m == ' ';
            out.push(m);
        } else if c.is_whitespace() {
            last_was_space = true;
        }
    }
    let trimmed = out.trim_matches(|c: char| c == ' ' || c == '.');
    let mut result: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    if result.is_empty() {
        result.push_str("track");
    }
    result
}

/// Deterministic output filename for a track: `Artist - Title.ext`.
///
/// The same artist/title pair always yields the same name, which keeps
/// re-deliveries idempotent and makes duplicate artifacts collapse on disk.
#[must_use]
pub fn track_filename(artist: &str, title: &str, extension: &str) -> String {
    let stem = sanitize_filename(&format!("{} - {}", artist, title));
    format!("{}.{}", stem, extension)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_invalid_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_filename("a\u{0}b\u{1f}c"), "abc");
    }

    #[test]
    fn sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_filename(" . name . "), "name");
    }

    #[test]
    fn sanitize_collapses_whitespace_runs() {
        assert_eq!(sanitize_filename("a \t\n b"), "a b");
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_filename(""), "track");
        assert_eq!(sanitize_filename("..."), "track");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), 120);
    }

    #[test]
    fn track_filename_is_deterministic() {
        let a = track_filename("Daft Punk", "One More Time", "mp3");
        let b = track_filename("Daft Punk", "One More Time", "mp3");
        assert_eq!(a, b);
        assert_eq!(a, "Daft Punk - One More Time.mp3");
    }

    #[test]
    fn track_filename_sanitizes_both_parts() {
        assert_eq!(
            track_filename("AC/DC", "Back in Black", "flac"),
            "AC_DC - Back in Black.flac"
        );
    }
}
