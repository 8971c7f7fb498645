use std::fmt;

/// How many lines of context are shown around the failing line.
const CONTEXT_LINES: usize = 3;

/// Renders the template source around the failing line.
///
/// The failing line is marked with `>`, all other lines with `|`.
pub(crate) fn render_source_context(
    f: &mut fmt::Formatter,
    name: Option<&str>,
    line: Option<usize>,
    source: &str,
) -> fmt::Result {
    let title = format!(
        " {} ",
        name.unwrap_or_default()
            .rsplit(&['/', '\\'])
            .next()
            .filter(|x| !x.is_empty())
            .unwrap_or("Template Source")
    );
    ok!(writeln!(f));
    ok!(writeln!(f, "{:-^1$}", title, 79));
    let lines: Vec<_> = source.split('\n').enumerate().collect();
    let idx = line
        .unwrap_or(1)
        .saturating_sub(1)
        .min(lines.len().saturating_sub(1));
    let skip = idx.saturating_sub(CONTEXT_LINES);
    let pre = lines
        .iter()
        .skip(skip)
        .take(CONTEXT_LINES.min(idx))
        .collect::<Vec<_>>();
    let post = lines
        .iter()
        .skip(idx + 1)
        .take(CONTEXT_LINES)
        .collect::<Vec<_>>();
    for (idx, line) in pre {
        ok!(writeln!(f, "{:>4} | {}", idx + 1, line.trim_end_matches('\r')));
    }
    if let Some((_, failing)) = lines.get(idx) {
        ok!(writeln!(
            f,
            "{:>4} > {}",
            idx + 1,
            failing.trim_end_matches('\r')
        ));
    }
    for (idx, line) in post {
        ok!(writeln!(f, "{:>4} | {}", idx + 1, line.trim_end_matches('\r')));
    }
    write!(f, "{:~^1$}", "", 79)
}
