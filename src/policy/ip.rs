// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IPv4 admission rules.
//!
//! A rule specification is a `;`-separated list of tokens:
//!
//! | Token | Rule |
//! |-------|------|
//! | `10.0.0.7` | exact address |
//! | `10.0.0.0-10.0.3.255` | per-octet range (box) |
//! | `192.168.1.0/24` | CIDR subnet |
//! | `172.16.*.*`, `10.0.0.1*` | wildcard, expanded into ranges |
//!
//! The whole-spec values `0.0` and `0` mean allow-all and deny-all.
//!
//! Ranges compare each octet independently (`from[i] <= addr[i] <= to[i]`),
//! which is not the same as a 32-bit integer range for asymmetric bounds.
//! That box semantics is intentional and relied on by existing rule sets.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

const ALLOW_ALL: &str = "0.0";
const DENY_ALL: &str = "0";

/// A single admission rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IpRule {
    /// Literal address; matched by string equality.
    Exact(String),
    /// Inclusive per-octet box.
    Range { from: [u8; 4], to: [u8; 4] },
    /// `network/prefix`, kept raw; numeric checks happen at match time.
    Subnet(String),
    AllowAll,
    DenyAll,
}

impl fmt::Display for IpRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpRule::Exact(addr) => f.write_str(addr),
            IpRule::Range { from, to } => write!(f, "{}-{}", dotted(from), dotted(to)),
            IpRule::Subnet(raw) => f.write_str(raw),
            IpRule::AllowAll => f.write_str(ALLOW_ALL),
            IpRule::DenyAll => f.write_str(DENY_ALL),
        }
    }
}

/// A token that could not be turned into a rule. Dropped from the set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ignoring IP rule `{token}`: {reason}")]
pub struct RuleParseError {
    pub token: String,
    pub reason: &'static str,
}

impl RuleParseError {
    fn new(token: &str, reason: &'static str) -> Self {
        Self {
            token: token.to_string(),
            reason,
        }
    }
}

/// Unordered set of rules; an address is admitted if any rule contains it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: HashSet<IpRule>,
}

impl RuleSet {
    /// Parse a `;`-separated rule specification.
    ///
    /// Invalid tokens are logged and skipped so one typo does not disable
    /// the rest of the policy.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        match spec {
            ALLOW_ALL => return Self::from_rules([IpRule::AllowAll]),
            DENY_ALL => return Self::from_rules([IpRule::DenyAll]),
            _ => {}
        }

        let mut rules = HashSet::new();
        for token in spec.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            match parse_token(token) {
                Ok(parsed) => rules.extend(parsed),
                Err(e) => tracing::warn!(token = %e.token, reason = e.reason, "Dropping invalid IP rule"),
            }
        }

        if rules.is_empty() && !spec.is_empty() {
            tracing::warn!(spec = %spec, "IP rule specification produced no rules; every address will match");
        }
        tracing::debug!(count = rules.len(), "Parsed IP rule set");

        Self { rules }
    }

    pub fn from_rules(rules: impl IntoIterator<Item = IpRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn contains_rule(&self, rule: &IpRule) -> bool {
        self.rules.contains(rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpRule> {
        self.rules.iter()
    }

    pub fn is_allow_all(&self) -> bool {
        self.rules.contains(&IpRule::AllowAll)
    }

    /// Whether `address` is admitted.
    ///
    /// 1. allow-all / deny-all short-circuit
    /// 2. an empty set, or an exact literal match, admits
    /// 3. any range whose box contains every octet admits
    /// 4. any subnet whose masked network equals the masked address admits
    pub fn matches(&self, address: &str) -> bool {
        if self.rules.contains(&IpRule::AllowAll) {
            return true;
        }
        if self.rules.contains(&IpRule::DenyAll) {
            return false;
        }

        let address = address.trim();
        if self.rules.is_empty() || self.rules.contains(&IpRule::Exact(address.to_string())) {
            return true;
        }

        let Some(octets) = strict_octets(address) else {
            return false;
        };

        let in_range = self.rules.iter().any(|rule| match rule {
            IpRule::Range { from, to } => (0..4).all(|i| from[i] <= octets[i] && octets[i] <= to[i]),
            _ => false,
        });
        if in_range {
            return true;
        }

        self.rules.iter().any(|rule| match rule {
            IpRule::Subnet(raw) => subnet_contains(raw, octets),
            _ => false,
        })
    }
}

/// Parse one rule token into zero or more rules.
pub fn parse_token(token: &str) -> Result<Vec<IpRule>, RuleParseError> {
    if token.contains('*') {
        let rules = expand_wildcard(token);
        if rules.is_empty() {
            return Err(RuleParseError::new(token, "wildcard expands to no valid range"));
        }
        return Ok(rules);
    }

    if token.contains('/') {
        let network = token.split('/').next().unwrap_or_default();
        if !is_dotted_quad_syntax(network) {
            return Err(RuleParseError::new(token, "subnet network is not a dotted quad"));
        }
        return Ok(vec![IpRule::Subnet(token.to_string())]);
    }

    if token.contains('-') {
        return parse_range(token)
            .map(|r| vec![r])
            .ok_or_else(|| RuleParseError::new(token, "range endpoints must be valid IPv4 addresses"));
    }

    if is_strict_ipv4(token) {
        Ok(vec![IpRule::Exact(token.to_string())])
    } else {
        Err(RuleParseError::new(token, "not a valid IPv4 address"))
    }
}

fn parse_range(token: &str) -> Option<IpRule> {
    let mut parts = token.split('-');
    let (from, to) = (parts.next()?.trim(), parts.next()?.trim());
    if parts.next().is_some() {
        return None;
    }
    Some(IpRule::Range {
        from: strict_octets(from)?,
        to: strict_octets(to)?,
    })
}

/// Expand a wildcard token such as `192.168.1*.*` into ranges.
///
/// Segments without `*` are fixed bounds; missing trailing segments span
/// `0..=255`. Every `*` segment receives the same expanded sub-range.
fn expand_wildcard(token: &str) -> Vec<IpRule> {
    let mut from: [String; 4] = ["0", "0", "0", "0"].map(String::from);
    let mut end: [String; 4] = ["255", "255", "255", "255"].map(String::from);
    let mut star_slots = Vec::new();
    let mut sub_ranges = Vec::new();

    for (i, segment) in token.split('.').take(4).enumerate() {
        if segment.contains('*') {
            sub_ranges = complete_wildcard(segment);
            star_slots.push(i);
        } else {
            from[i] = segment.to_string();
            end[i] = segment.to_string();
        }
    }

    sub_ranges
        .into_iter()
        .filter_map(|(lo, hi)| {
            let mut lower = from.clone();
            let mut upper = end.clone();
            for &slot in &star_slots {
                lower[slot] = lo.clone();
                upper[slot] = hi.clone();
            }
            Some(IpRule::Range {
                from: strict_octets(&lower.join("."))?,
                to: strict_octets(&upper.join("."))?,
            })
        })
        .collect()
}

/// Candidate `(from, to)` bounds for one wildcard segment.
///
/// - `*` covers `0..=255`
/// - two characters (`5*`, `*5`) try a one-digit and a two-digit completion
/// - three or more characters try the one-digit completion only
fn complete_wildcard(segment: &str) -> Vec<(String, String)> {
    match segment.chars().count() {
        1 => vec![("0".to_string(), "255".to_string())],
        2 => [1, 2]
            .into_iter()
            .filter_map(|width| complete_wildcard_range(segment, width))
            .collect(),
        _ => complete_wildcard_range(segment, 1).into_iter().collect(),
    }
}

fn complete_wildcard_range(segment: &str, width: usize) -> Option<(String, String)> {
    let from = segment.replace('*', &"0".repeat(width));
    let mut end = segment.replace('*', &"9".repeat(width));

    if from.parse::<u32>().ok()? > 255 {
        return None;
    }
    if end.parse::<u32>().ok()? > 255 {
        end = "255".to_string();
    }
    Some((from, end))
}

fn subnet_contains(raw: &str, address: [u8; 4]) -> bool {
    let Some((network, prefix)) = raw.split_once('/') else {
        return false;
    };
    let (Some(network), Ok(prefix)) = (lenient_octets(network.trim()), prefix.trim().parse::<u32>()) else {
        tracing::debug!(rule = %raw, "Subnet rule does not parse, skipping");
        return false;
    };
    if prefix > 32 {
        return false;
    }

    let mask = ((0xFFFF_FFFFu64 << (32 - prefix)) & 0xFFFF_FFFF) as u32;
    (u32::from_be_bytes(address) & mask) == (u32::from_be_bytes(network) & mask)
}

/// One octet in the accepted textual form: `0-99` with optional leading
/// zero, `100-199`, `200-249`, `250-255`.
fn is_strict_octet(s: &str) -> bool {
    let b = s.as_bytes();
    if !b.iter().all(u8::is_ascii_digit) {
        return false;
    }
    match b {
        [_] | [_, _] => true,
        [b'1', _, _] => true,
        [b'2', b'0'..=b'4', _] => true,
        [b'2', b'5', b'0'..=b'5'] => true,
        _ => false,
    }
}

/// `true` for `a.b.c.d` where every part passes the strict octet check.
pub fn is_strict_ipv4(s: &str) -> bool {
    strict_octets(s).is_some()
}

fn strict_octets(s: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = s.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if !is_strict_octet(part) {
            return None;
        }
        *octet = part.parse().ok()?;
    }
    parts.next().is_none().then_some(octets)
}

/// Four numeric parts, each `0..=255`, any digit count.
fn lenient_octets(s: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = s.split('.');
    for octet in octets.iter_mut() {
        *octet = parts.next()?.parse().ok()?;
    }
    parts.next().is_none().then_some(octets)
}

/// Syntax-only check: four dot-separated groups of 1-3 digits.
fn is_dotted_quad_syntax(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()))
}

fn dotted(octets: &[u8; 4]) -> String {
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}
