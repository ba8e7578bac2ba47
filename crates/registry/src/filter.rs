/// A slash-separated address filter.
///
/// `*` matches a whole segment or a prefix/suffix within one segment. A
/// pattern with fewer segments than the candidate leaves the remaining
/// segments unconstrained; an empty pattern (or `*`) matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    segments: Vec<String>,
}

impl Filter {
    pub fn parse(pattern: &str) -> Self {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Self::default();
        }
        Self {
            segments: trimmed
                .split('/')
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn match_all(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn matches(&self, addr: &str) -> bool {
        if self.segments.is_empty() {
            return true;
        }
        let candidate: Vec<&str> = addr.split('/').collect();
        if self.segments.len() > candidate.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(candidate.iter())
            .all(|(pat, seg)| segment_matches(pat, &seg.to_ascii_lowercase()))
    }
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            segment.len() >= prefix.len() + suffix.len()
                && segment.starts_with(prefix)
                && segment.ends_with(suffix)
        }
        None => pattern == segment,
    }
}
