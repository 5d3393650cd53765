//! Public-suffix lookup.

/// Maps a hostname to its public (registrable-domain) suffix.
pub trait SuffixLookup: Send + Sync + std::fmt::Debug {
    /// Returns the suffix, e.g. `co.uk` for `www.ebay.co.uk`.
    fn suffix(&self, host: &str) -> Option<String>;
}

/// Lookup backed by the embedded Mozilla Public Suffix List.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicSuffixList;

impl SuffixLookup for PublicSuffixList {
    fn suffix(&self, host: &str) -> Option<String> {
        let host = host.trim_end_matches('.').to_lowercase();
        psl::suffix_str(&host).map(str::to_string)
    }
}
