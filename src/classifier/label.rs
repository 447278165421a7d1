pub const MAX_LABEL_CHARS: usize = 50;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];
const QUOTES: &[char] = &['"', '\''];

/// Clean a label proposed by the classifier: strip one pair of surrounding quotes and any
/// trailing punctuation, cap at `MAX_LABEL_CHARS`. Blank results become `None`.
pub fn sanitize_label(raw: &str) -> Option<String> {
    let mut label = raw.trim();
    label = label.strip_prefix(QUOTES).unwrap_or(label);
    label = label.trim_end_matches(TRAILING_PUNCTUATION);
    label = label.strip_suffix(QUOTES).unwrap_or(label);
    label = label.trim_end_matches(TRAILING_PUNCTUATION).trim();

    let label: String = label.chars().take(MAX_LABEL_CHARS).collect();
    let label = label.trim_end().to_string();
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}
