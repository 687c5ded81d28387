use std::cmp::Ordering;
use std::collections::BTreeSet;

use zinject_version::Stability;

use super::candidate::SelectionCandidate;
use crate::config::NetworkLevel;

/// Ranking of candidates for one interface.
///
/// Because the solver accepts the first candidate that works, this order
/// decides which solution is found.
#[derive(Debug, Clone)]
pub struct CandidatePolicy {
    /// How much network access may be assumed
    pub network_use: NetworkLevel,
    /// Lowest stability ranked as acceptable; less stable candidates sort later
    pub stability_policy: Stability,
    /// Languages the user asked for
    pub languages: BTreeSet<String>,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidatePolicy {
    pub fn new() -> Self {
        Self {
            network_use: NetworkLevel::Full,
            stability_policy: Stability::Stable,
            languages: BTreeSet::new(),
        }
    }

    pub fn network_use(mut self, level: NetworkLevel) -> Self {
        self.network_use = level;
        self
    }

    pub fn stability_policy(mut self, stability: Stability) -> Self {
        self.stability_policy = stability;
        self
    }

    pub fn languages(mut self, languages: BTreeSet<String>) -> Self {
        self.languages = languages;
        self
    }

    /// Policy for an interface: its own preference if set, else the global default
    pub fn for_interface(interface_policy: Stability, help_with_testing: bool) -> Stability {
        if interface_policy != Stability::Unset {
            interface_policy
        } else if help_with_testing {
            Stability::Testing
        } else {
            Stability::Stable
        }
    }

    /// Sort candidates best first
    pub fn sort(&self, candidates: &mut [SelectionCandidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }

    /// Compare two candidates; `Less` means `a` is preferred.
    ///
    /// Priority order:
    /// 1. User- or feed-preferred implementations
    /// 2. Implementations in a requested language
    /// 3. Cached implementations, unless network use is full
    /// 4. Stability: acceptable, then less stable, then buggy/insecure
    /// 5. Newer versions
    /// 6. Cached implementations, when network use is full
    /// 7. Feed URI and implementation ID, for determinism
    pub fn compare(&self, a: &SelectionCandidate, b: &SelectionCandidate) -> Ordering {
        let stability_a = a.effective_stability();
        let stability_b = b.effective_stability();

        // Pinned by the user or the feed
        let preferred_a = stability_a == Stability::Preferred;
        let preferred_b = stability_b == Stability::Preferred;
        if preferred_a != preferred_b {
            return if preferred_a { Ordering::Less } else { Ordering::Greater };
        }

        if !self.languages.is_empty() {
            let lang_a = self.matches_language(a);
            let lang_b = self.matches_language(b);
            if lang_a != lang_b {
                return if lang_a { Ordering::Less } else { Ordering::Greater };
            }
        }

        if self.network_use != NetworkLevel::Full && a.is_cached != b.is_cached {
            return if a.is_cached { Ordering::Less } else { Ordering::Greater };
        }

        match self.stability_tier(stability_a).cmp(&self.stability_tier(stability_b)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Newest first
        match b.implementation.version.cmp(&a.implementation.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        if self.network_use == NetworkLevel::Full && a.is_cached != b.is_cached {
            return if a.is_cached { Ordering::Less } else { Ordering::Greater };
        }

        a.feed_uri
            .cmp(&b.feed_uri)
            .then_with(|| a.implementation.id.cmp(&b.implementation.id))
    }

    fn matches_language(&self, candidate: &SelectionCandidate) -> bool {
        candidate
            .implementation
            .languages
            .iter()
            .any(|l| self.languages.contains(l))
    }

    fn stability_tier(&self, stability: Stability) -> u8 {
        if stability.is_rejected() {
            2
        } else if stability == Stability::Unset || stability <= self.stability_policy {
            0
        } else {
            1
        }
    }
}
