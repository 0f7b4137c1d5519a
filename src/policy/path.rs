// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ant-style path patterns.
//!
//! - `**` as a whole segment matches zero or more segments
//! - `*` matches any run of characters within one segment, so a lone `*`
//!   matches exactly one segment
//! - `?` matches one character within a segment
//! - everything else is literal and case-sensitive

/// `true` if `path` matches `pattern`.
pub fn matches(pattern: &str, path: &str) -> bool {
    if pattern.starts_with('/') != path.starts_with('/') {
        return false;
    }

    let pattern: Vec<&str> = segments(pattern).collect();
    let path: Vec<&str> = segments(path).collect();
    match_segments(&pattern, &path)
}

/// `true` if any of `patterns` matches `path`.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), path))
}

fn segments(s: &str) -> impl Iterator<Item = &str> {
    s.split('/').filter(|seg| !seg.is_empty())
}

/// Segment-level glob. Only the most recent `**` is ever backtracked to, so
/// the work stays bounded by `pattern.len() * path.len()`.
fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    let (mut pi, mut si) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while si < path.len() {
        if pi < pattern.len() && pattern[pi] == "**" {
            backtrack = Some((pi, si));
            pi += 1;
        } else if pi < pattern.len() && segment_matches(pattern[pi], path[si]) {
            pi += 1;
            si += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            si = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&seg| seg == "**")
}

/// Glob match within a single segment (`*` any run, `?` one char).
fn segment_matches(pattern: &str, segment: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return pattern == segment;
    }

    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = segment.chars().collect();
    let (mut pi, mut si) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while si < s.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, si));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            si = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// An ordered list of patterns, typically read from a comma-separated
/// configuration value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternList {
    patterns: Vec<String>,
}

impl PatternList {
    /// Parse `"/a/**, /b"`; blank entries are dropped.
    pub fn parse(csv: &str) -> Self {
        csv.split(',').collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// First pattern matching `path`, if any.
    pub fn first_match(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| matches(p, path))
            .map(String::as_str)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }
}

impl<'a> FromIterator<&'a str> for PatternList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            patterns: iter
                .into_iter()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}
