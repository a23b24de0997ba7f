/// Splits fetched log text into lines, each keeping its own terminator
/// (`\r\n`, `\n` or a lone `\r`). Blank lines survive as bare terminators.
/// A trailing fragment with no terminator is kept; the empty fragment after
/// a final terminator is not.
pub fn split_log_lines(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut index = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'\n' => {
                lines.push(text[start..=index].to_string());
                index += 1;
                start = index;
            }
            b'\r' => {
                let end = if bytes.get(index + 1) == Some(&b'\n') {
                    index + 2
                } else {
                    index + 1
                };
                lines.push(text[start..end].to_string());
                index = end;
                start = end;
            }
            _ => index += 1,
        }
    }

    if start < text.len() {
        lines.push(text[start..].to_string());
    }

    lines
}
