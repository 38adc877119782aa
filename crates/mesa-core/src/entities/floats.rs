//! JSON form for floats that may be NaN or infinite.
//!
//! JSON has no literal for non-finite numbers and `serde_json` writes them as
//! `null`, which would not read back into an `f64`. These adapters write them
//! as the strings `"NaN"`, `"inf"` and `"-inf"`. A stored `null` inside a
//! series reads back as NaN.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub(crate) enum NonFinite {
    #[serde(rename = "NaN")]
    Nan,
    #[serde(rename = "inf")]
    Inf,
    #[serde(rename = "-inf")]
    NegInf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub(crate) enum JsonFloat {
    Number(f64),
    NonFinite(NonFinite),
}

impl From<f64> for JsonFloat {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::NonFinite(NonFinite::Nan)
        } else if value.is_infinite() {
            Self::NonFinite(if value.is_sign_positive() {
                NonFinite::Inf
            } else {
                NonFinite::NegInf
            })
        } else {
            Self::Number(value)
        }
    }
}

impl From<JsonFloat> for f64 {
    fn from(value: JsonFloat) -> Self {
        match value {
            JsonFloat::Number(n) => n,
            JsonFloat::NonFinite(NonFinite::Nan) => Self::NAN,
            JsonFloat::NonFinite(NonFinite::Inf) => Self::INFINITY,
            JsonFloat::NonFinite(NonFinite::NegInf) => Self::NEG_INFINITY,
        }
    }
}

/// `#[serde(with)]` adapter for `Vec<f64>`.
pub(crate) mod vec {
    use super::{Deserialize, Deserializer, JsonFloat, Serializer};

    pub(crate) fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().copied().map(JsonFloat::from))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<JsonFloat>>::deserialize(deserializer)?;
        Ok(values
            .into_iter()
            .map(|value| value.map_or(f64::NAN, f64::from))
            .collect())
    }
}

/// `#[serde(with)]` adapter for `Option<f64>`.
pub(crate) mod option {
    use super::{Deserialize, Deserializer, JsonFloat, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub(crate) fn serialize<S: Serializer>(
        value: &Option<f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(JsonFloat::from).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        Ok(Option::<JsonFloat>::deserialize(deserializer)?.map(f64::from))
    }
}
