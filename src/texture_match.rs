//! Binding of `texture` attributes to image files in a mod archive.
//!
//! Strategies run in order of strictness, and each one scans every candidate before the next one
//! is tried, so an exact hit late in the archive wins over a loose hit early on.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    EndsWith,
    Contains,
    StemEqual,
    ContainsStem,
}

impl MatchStrategy {
    pub const ORDERED: [MatchStrategy; 5] = [
        MatchStrategy::Exact,
        MatchStrategy::EndsWith,
        MatchStrategy::Contains,
        MatchStrategy::StemEqual,
        MatchStrategy::ContainsStem,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::EndsWith => "suffix",
            MatchStrategy::Contains => "substring",
            MatchStrategy::StemEqual => "stem",
            MatchStrategy::ContainsStem => "stem-substring",
        }
    }

    fn matches(self, texture: &NormalizedPath, candidate: &NormalizedPath) -> bool {
        match self {
            MatchStrategy::Exact => candidate.full == texture.full,
            MatchStrategy::EndsWith => !texture.full.is_empty() && candidate.full.ends_with(&texture.full),
            MatchStrategy::Contains => !texture.full.is_empty() && candidate.full.contains(&texture.full),
            MatchStrategy::StemEqual => !texture.stem.is_empty() && candidate.stem == texture.stem,
            MatchStrategy::ContainsStem => !texture.stem.is_empty() && candidate.full.contains(&texture.stem),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureMatch<'a> {
    pub filename: &'a str,
    pub strategy: MatchStrategy,
}

struct NormalizedPath {
    full: String,
    stem: String,
}

impl NormalizedPath {
    fn new(raw: &str) -> Self {
        let full = raw.trim().replace('\\', "/").to_lowercase();
        let basename = full.rsplit('/').next().unwrap_or_default();
        let stem = basename.split('.').next().unwrap_or_default().to_string();
        Self { full, stem }
    }
}

/// Returns the first candidate accepted by the strictest strategy that accepts any.
pub fn find_texture<'a, I>(texture: &str, candidates: I) -> Option<TextureMatch<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let texture = NormalizedPath::new(texture);
    if texture.full.is_empty() {
        return None;
    }
    let candidates: Vec<(&'a str, NormalizedPath)> =
        candidates.into_iter().map(|name| (name, NormalizedPath::new(name))).collect();
    MatchStrategy::ORDERED.into_iter().find_map(|strategy| {
        candidates
            .iter()
            .find(|(_, normalized)| strategy.matches(&texture, normalized))
            .map(|(filename, _)| TextureMatch { filename: *filename, strategy })
    })
}
