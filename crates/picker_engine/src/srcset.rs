use serde::{Deserialize, Serialize};
use url::Url;

use crate::classify::to_absolute_url;

/// How competing `srcset` descriptors are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SrcsetRanking {
    /// Width descriptors rank by their pixel count and density descriptors
    /// rank as `density * 1000`; a bare entry counts as `1x`.
    #[default]
    Literal,
    /// Any width descriptor outranks every density descriptor.
    WidthFirst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Descriptor {
    Width(u32),
    Density(f32),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SrcsetEntry {
    pub url: String,
    pub descriptor: Descriptor,
}

/// Splits a `srcset` attribute into its entries; empty entries are dropped.
pub fn parse_srcset(raw: &str) -> Vec<SrcsetEntry> {
    raw.split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let descriptor = parts.next().map_or(Descriptor::Density(1.0), parse_descriptor);
            Some(SrcsetEntry {
                url: url.to_string(),
                descriptor,
            })
        })
        .collect()
}

/// Picks the highest-ranked entry whose URL resolves. Ties go to the entry
/// listed first.
pub fn best_srcset_url(raw: &str, base: Option<&Url>, ranking: SrcsetRanking) -> Option<Url> {
    let mut best: Option<((u8, f64), Url)> = None;
    for entry in parse_srcset(raw) {
        let Some(url) = to_absolute_url(&entry.url, base) else {
            continue;
        };
        let rank = rank(entry.descriptor, ranking);
        if best.as_ref().map_or(true, |(current, _)| rank > *current) {
            best = Some((rank, url));
        }
    }
    best.map(|(_, url)| url)
}

fn parse_descriptor(token: &str) -> Descriptor {
    let lower = token.to_ascii_lowercase();
    if let Some(width) = lower.strip_suffix('w') {
        if let Ok(value) = width.parse::<u32>() {
            return Descriptor::Width(value);
        }
    }
    if let Some(density) = lower.strip_suffix('x') {
        if let Ok(value) = density.parse::<f32>() {
            if value.is_finite() && value > 0.0 {
                return Descriptor::Density(value);
            }
        }
    }
    Descriptor::Other
}

fn rank(descriptor: Descriptor, ranking: SrcsetRanking) -> (u8, f64) {
    let (tier, value) = match descriptor {
        Descriptor::Width(w) => (1, f64::from(w)),
        Descriptor::Density(x) => (0, f64::from(x) * 1000.0),
        Descriptor::Other => (0, 1.0),
    };
    match ranking {
        SrcsetRanking::Literal => (0, value),
        SrcsetRanking::WidthFirst => (tier, value),
    }
}
