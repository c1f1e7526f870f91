//! Prefix/suffix trimming diff between two strings.

/// Replace `from..to` (char offsets into the old string) with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDiff {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

impl TextDiff {
    /// True when applying the diff changes nothing.
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.text.is_empty()
    }

    /// Apply to `old`, producing the new string.
    pub fn apply(&self, old: &str) -> String {
        let mut out: String = old.chars().take(self.from).collect();
        out.push_str(&self.text);
        out.extend(old.chars().skip(self.to));
        out
    }
}

/// Compute the replace range that turns `old` into `new`.
///
/// Strips the common prefix, then the common suffix of what remains. This is
/// a trimming heuristic, not a minimal edit: with repeated characters the
/// prefix wins, so `"aa" -> "a"` deletes the second `a`, and the result is
/// never smaller than one contiguous range.
pub fn simple_diff(old: &str, new: &str) -> TextDiff {
    let x: Vec<char> = old.chars().collect();
    let y: Vec<char> = new.chars().collect();

    let mut start = 0;
    while start < x.len() && start < y.len() && x[start] == y[start] {
        start += 1;
    }

    let mut old_end = x.len();
    let mut new_end = y.len();
    while old_end > start && new_end > start && x[old_end - 1] == y[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }

    TextDiff {
        from: start,
        to: old_end,
        text: y[start..new_end].iter().collect(),
    }
}
