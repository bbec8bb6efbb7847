//! JSON extraction from free-form model output.
//!
//! Text models wrap JSON in prose, markdown fences, or trailing commentary.
//! Rather than trust the whole response, the pipeline locates the first
//! complete `{...}` object by brace matching, string- and escape-aware so
//! braces inside string literals do not unbalance the scan.

/// Returns the first complete JSON object in `text`, or `None` when no
/// balanced `{...}` exists.
///
/// The returned slice still has to be parsed; this only finds the candidate
/// span.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
