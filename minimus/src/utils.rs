use std::fmt;

/// Helper for dealing with untrusted size hints.
#[inline(always)]
pub(crate) fn untrusted_size_hint(value: usize) -> usize {
    value.min(1024)
}

/// Returns `true` if `rest` starts with a named entity tail (`\w+;`).
fn is_entity_tail(rest: &[u8]) -> bool {
    let word = rest
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    word > 0 && rest.get(word) == Some(&b';')
}

/// Escapes a string for HTML output.
///
/// `<`, `>`, `"` and `'` are always escaped.  An ampersand is left alone
/// when it already starts an entity like `&amp;` or `&copy;`.
pub struct HtmlEscape<'a>(pub &'a str);

impl fmt::Display for HtmlEscape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.as_bytes();
        let mut start = 0;

        for (i, b) in bytes.iter().enumerate() {
            let replacement = match *b {
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                b'\'' => "&#39;",
                b'&' if !is_entity_tail(&bytes[i + 1..]) => "&amp;",
                _ => continue,
            };
            // all replaced bytes are ascii so slicing at them is safe
            if start < i {
                ok!(f.write_str(&self.0[start..i]));
            }
            ok!(f.write_str(replacement));
            start = i + 1;
        }

        if start < bytes.len() {
            f.write_str(&self.0[start..])
        } else {
            Ok(())
        }
    }
}

/// Runs a closure when dropped.
pub struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> OnDrop<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_html_escape() {
        let input = "<>&\"'";
        let output = HtmlEscape(input).to_string();
        assert_eq!(output, "&lt;&gt;&amp;&quot;&#39;");
    }

    #[test]
    fn test_html_escape_keeps_entities() {
        assert_eq!(HtmlEscape("&amp; &copy; &x").to_string(), "&amp; &copy; &amp;x");
        assert_eq!(HtmlEscape("&#39;").to_string(), "&amp;#39;");
        assert_eq!(HtmlEscape("a & b;").to_string(), "a &amp; b;");
        assert_eq!(HtmlEscape("Grüße <3").to_string(), "Grüße &lt;3");
    }
}
