use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The set of samples a project knows about, stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCatalog {
    samples: BTreeSet<String>,
}

impl SampleCatalog {
    pub fn new<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            samples: samples
                .into_iter()
                .map(|sample| sample.as_ref().trim().to_lowercase())
                .filter(|sample| !sample.is_empty())
                .collect(),
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, sample: &str) -> bool {
        self.samples.contains(&sample.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().map(String::as_str)
    }
}
