//! Canonical policy summary sections

use serde::{Deserialize, Serialize};

use crate::text::contains_term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalSection {
    PlanSnapshot,
    CostSummary,
    CoveredServices,
    AdministrativeConditions,
    ExclusionsLimitations,
    ClaimsAppeals,
}

impl CanonicalSection {
    /// All sections in summary order
    pub const ALL: [CanonicalSection; 6] = [
        CanonicalSection::PlanSnapshot,
        CanonicalSection::CostSummary,
        CanonicalSection::CoveredServices,
        CanonicalSection::AdministrativeConditions,
        CanonicalSection::ExclusionsLimitations,
        CanonicalSection::ClaimsAppeals,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            CanonicalSection::PlanSnapshot => "plan_snapshot",
            CanonicalSection::CostSummary => "cost_summary",
            CanonicalSection::CoveredServices => "covered_services",
            CanonicalSection::AdministrativeConditions => "administrative_conditions",
            CanonicalSection::ExclusionsLimitations => "exclusions_limitations",
            CanonicalSection::ClaimsAppeals => "claims_appeals",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CanonicalSection::PlanSnapshot => "Plan Snapshot",
            CanonicalSection::CostSummary => "Cost Summary",
            CanonicalSection::CoveredServices => "Summary of Covered Services",
            CanonicalSection::AdministrativeConditions => "Administrative Conditions",
            CanonicalSection::ExclusionsLimitations => "Exclusions & Limitations",
            CanonicalSection::ClaimsAppeals => "Claims, Appeals & Member Rights",
        }
    }

    /// Lowercase phrases a user may use to refer to the section
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalSection::PlanSnapshot => &["plan snapshot", "plan overview", "snapshot"],
            CanonicalSection::CostSummary => &[
                "cost summary",
                "costs",
                "cost sharing",
                "cost-sharing",
            ],
            CanonicalSection::CoveredServices => &[
                "summary of covered services",
                "covered services",
                "covered benefits",
                "benefits",
            ],
            CanonicalSection::AdministrativeConditions => &[
                "administrative conditions",
                "administrative requirements",
                "admin conditions",
            ],
            CanonicalSection::ExclusionsLimitations => &[
                "exclusions & limitations",
                "exclusions and limitations",
                "exclusions",
                "limitations",
            ],
            CanonicalSection::ClaimsAppeals => &[
                "claims, appeals & member rights",
                "claims and appeals",
                "appeals",
                "member rights",
                "claims",
            ],
        }
    }

    /// Sub-queries for multi-query retrieval
    pub fn queries(&self) -> &'static [&'static str] {
        match self {
            CanonicalSection::PlanSnapshot => &[
                "plan name and type",
                "summary of benefits overview",
                "plan overview and key features",
            ],
            CanonicalSection::CostSummary => &[
                "deductible amount and when it applies",
                "copay and coinsurance",
                "out of pocket maximum OOP",
                "annual deductible",
                "cost sharing requirements",
            ],
            CanonicalSection::CoveredServices => &[
                "what is covered",
                "covered benefits and services",
                "coverage details",
                "covered medical services",
                "benefits included in plan",
            ],
            CanonicalSection::AdministrativeConditions => &[
                "prior authorization",
                "referrals required",
                "administrative requirements",
            ],
            CanonicalSection::ExclusionsLimitations => &[
                "exclusions not covered",
                "limitations and restrictions",
                "what is not covered",
            ],
            CanonicalSection::ClaimsAppeals => &[
                "how to file a claim",
                "appeals and grievances",
                "member rights and responsibilities",
            ],
        }
    }

    /// Resolves an id, display name or alias (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| {
            s.id() == lower
                || s.display_name().to_lowercase() == lower
                || s.aliases().iter().any(|a| *a == lower)
        })
    }

    /// Finds the section a question refers to. The longest matching alias
    /// wins so "claims and appeals" beats "claims".
    pub fn mentioned_in(question: &str) -> Option<Self> {
        let lower = question.to_lowercase();
        let mut best: Option<(usize, CanonicalSection)> = None;

        for section in Self::ALL {
            let display = section.display_name().to_lowercase();
            let candidates = std::iter::once(display.as_str()).chain(section.aliases().iter().copied());
            for alias in candidates {
                if contains_term(&lower, alias) && best.map_or(true, |(len, _)| alias.len() > len) {
                    best = Some((alias.len(), section));
                }
            }
        }

        best.map(|(_, section)| section)
    }

    /// Whether the question names the section by its full display name
    pub fn named_in(&self, question: &str) -> bool {
        contains_term(&question.to_lowercase(), &self.display_name().to_lowercase())
    }
}

impl std::fmt::Display for CanonicalSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_id_name_and_alias() {
        assert_eq!(
            CanonicalSection::parse("cost_summary"),
            Some(CanonicalSection::CostSummary)
        );
        assert_eq!(
            CanonicalSection::parse("Summary of Covered Services"),
            Some(CanonicalSection::CoveredServices)
        );
        assert_eq!(
            CanonicalSection::parse("Exclusions and Limitations"),
            Some(CanonicalSection::ExclusionsLimitations)
        );
        assert_eq!(CanonicalSection::parse("Dental Riders"), None);
    }

    #[test]
    fn test_mentioned_in_prefers_longest_alias() {
        assert_eq!(
            CanonicalSection::mentioned_in("Tell me more about claims and appeals"),
            Some(CanonicalSection::ClaimsAppeals)
        );
        assert_eq!(
            CanonicalSection::mentioned_in("more detail about the cost summary please"),
            Some(CanonicalSection::CostSummary)
        );
        assert_eq!(CanonicalSection::mentioned_in("what is my copay?"), None);
    }

    #[test]
    fn test_every_section_has_queries_and_aliases() {
        for section in CanonicalSection::ALL {
            assert!(!section.queries().is_empty());
            assert!(!section.aliases().is_empty());
        }
    }

    #[test]
    fn test_named_in() {
        assert!(CanonicalSection::ExclusionsLimitations
            .named_in("What do the Exclusions & Limitations say?"));
        assert!(!CanonicalSection::ExclusionsLimitations.named_in("What is excluded?"));
    }
}
