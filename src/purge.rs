use crate::rdf::{self, Triple};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Named retention rule applied to the whole triple set before output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PurgeRule {
    #[default]
    None,
    Geo,
    Issues,
}

impl PurgeRule {
    /// Absent for unknown names, so callers can report the valid choices.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Valid names joined as `none|geo|issues`.
    pub fn choices() -> String {
        Self::iter()
            .map(|rule| rule.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Whether `triple` survives the purge.
    pub fn retains(self, triple: &Triple) -> bool {
        match self {
            PurgeRule::None => true,
            PurgeRule::Geo => rdf::relates_geo_name(triple),
            PurgeRule::Issues => rdf::relates_issue(triple),
        }
    }
}
