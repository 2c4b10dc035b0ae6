//! Pulling TikZ source out of a model reply.
//!
//! Policy, in order:
//! 1. the first closed triple-backtick fence wins (an info string such as
//!    `latex` or `tikz` after the opening fence is allowed). The text between
//!    the opening fence's line break and the line break before the closing
//!    fence is returned byte for byte;
//! 2. otherwise the first `\begin{tikzpicture}` up to the first
//!    `\end{tikzpicture}` after it, both delimiters included;
//! 3. otherwise the reply unchanged, since models sometimes answer with bare
//!    commands.
//!
//! A fence that is never closed counts as no fence at all.

const FENCE: &str = "```";
const BEGIN_ENV: &str = "\\begin{tikzpicture}";
const END_ENV: &str = "\\end{tikzpicture}";

/// Extract TikZ source from `raw`. Pure; the result borrows from the input.
pub fn extract(raw: &str) -> &str {
    fenced_block(raw)
        .or_else(|| environment_span(raw))
        .unwrap_or(raw)
}

fn fenced_block(raw: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(rel) = raw[from..].find(FENCE) {
        let open = from + rel;
        let after_fence = open + FENCE.len();
        let line_end = after_fence + raw[after_fence..].find('\n')?;

        // `a```b```` on a single line is inline code, not a block; none of
        // its backticks can open a fence
        if raw[after_fence..line_end].contains('`') {
            from = line_end;
            continue;
        }

        let body_start = line_end + 1;
        let close = body_start + raw[body_start..].find(FENCE)?;
        let body = &raw[body_start..close];
        let body = body
            .strip_suffix("\r\n")
            .or_else(|| body.strip_suffix('\n'))
            .unwrap_or(body);
        return Some(body);
    }
    None
}

fn environment_span(raw: &str) -> Option<&str> {
    let start = raw.find(BEGIN_ENV)?;
    let end = start + raw[start..].find(END_ENV)? + END_ENV.len();
    Some(&raw[start..end])
}

/// Whether `source` already contains a `tikzpicture` environment.
pub fn has_environment(source: &str) -> bool {
    source.contains(BEGIN_ENV) && source.contains(END_ENV)
}
