use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DONATION_INCENTIVE: &str = "DonationIncentive";

const DONATION_INCENTIVE_VALUES: &[&str] = &[
    "stop inhumane hunting of this local treasure",
    "bugs have invaded our community and octopuses feed on them, maintaining a gentle balance",
    "promote tolerance in our society, one animal at a time",
    "lower your taxes while contributing to a cause in our community",
    "tree octopuses are an endangered species, preserve their habitat for the next generation",
];

/// A decision slot and the values it may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub values: Vec<String>,
}

impl Candidate {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|candidate| candidate == value)
    }
}

#[derive(Debug, Clone)]
pub struct VariantRegistry {
    candidates: Vec<Candidate>,
}

impl VariantRegistry {
    pub fn new(candidates: Vec<Candidate>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(anyhow!("variant registry needs at least one decision slot"));
        }

        let mut names = BTreeSet::new();
        for candidate in &candidates {
            if candidate.name.trim().is_empty() {
                return Err(anyhow!("decision slot name cannot be empty"));
            }
            if !names.insert(candidate.name.as_str()) {
                return Err(anyhow!("duplicate decision slot '{}'", candidate.name));
            }
            if candidate.values.is_empty() {
                return Err(anyhow!(
                    "decision slot '{}' has no candidate values",
                    candidate.name
                ));
            }
        }

        Ok(Self { candidates })
    }

    /// Registry served by the donation page.
    pub fn donation_incentives() -> Self {
        Self {
            candidates: vec![Candidate::new(
                DONATION_INCENTIVE,
                DONATION_INCENTIVE_VALUES.iter().copied(),
            )],
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|candidate| candidate.name == name)
    }
}
