/// Identity Resolution System
///
/// Resolves on-chain identities for single addresses and searches identities
/// by display name, on any registered chain whose runtime includes the
/// identity pallet.

pub mod capability;
pub mod data;
pub mod queries;
pub mod registration;
pub mod resolver;
pub mod search;

pub use capability::supports_identity;
pub use queries::IdentityQueries;
pub use resolver::IdentityResolver;
pub use search::IdentitySearch;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// A registrar's attestation about an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgement {
    /// No opinion is held.
    Unknown,
    /// A deposit is reserved as payment for providing a judgement.
    FeePaid(u128),
    Reasonable,
    KnownGood,
    OutOfDate,
    LowQuality,
    Erroneous,
}

impl Judgement {
    fn tag(&self) -> &'static str {
        match self {
            Judgement::Unknown => "unknown",
            Judgement::FeePaid(_) => "feePaid",
            Judgement::Reasonable => "reasonable",
            Judgement::KnownGood => "knownGood",
            Judgement::OutOfDate => "outOfDate",
            Judgement::LowQuality => "lowQuality",
            Judgement::Erroneous => "erroneous",
        }
    }

    /// Judgements that vouch for the identity
    pub fn is_positive(&self) -> bool {
        matches!(self, Judgement::Reasonable | Judgement::KnownGood)
    }
}

/// Serialized as `{"type": "feePaid", "value": "100"}`; balances are strings
/// because they do not fit in a JSON number.
impl Serialize for Judgement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Judgement::FeePaid(amount) => {
                let mut state = serializer.serialize_struct("Judgement", 2)?;
                state.serialize_field("type", self.tag())?;
                state.serialize_field("value", &amount.to_string())?;
                state.end()
            }
            _ => {
                let mut state = serializer.serialize_struct("Judgement", 1)?;
                state.serialize_field("type", self.tag())?;
                state.end()
            }
        }
    }
}

/// A judgement paired with the registrar that gave it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistrarJudgement {
    pub registrar: u32,
    pub judgement: Judgement,
}

/// Secondary identity info fields, present when they decode as text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Resolved on-chain identity of one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolkadotIdentity {
    /// Never empty
    pub address: String,
    pub display_name: Option<String>,
    pub judgements: Vec<RegistrarJudgement>,
    /// At least one registrar judgement is positive
    pub verified: bool,
    #[serde(flatten)]
    pub fields: IdentityFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// How a display name matched a search query; lower ranks sort first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchRank {
    Exact,
    Prefix,
    Substring,
}

/// One identity search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySearchResult {
    pub address: String,
    pub display_name: String,
    pub rank: MatchRank,
    /// Character offset of the first match in the lower-cased name
    pub position: usize,
}
