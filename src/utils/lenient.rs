//! Older records stored numbers as strings (route params were strings), so
//! numeric fields accept either form.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    Null(()),
}

impl NumberOrText {
    fn as_f64(&self) -> f64 {
        match self {
            NumberOrText::Number(value) => *value,
            NumberOrText::Text(text) => text.trim().parse().unwrap_or(0.0),
            NumberOrText::Null(()) => 0.0,
        }
    }
}

pub fn u32_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = NumberOrText::deserialize(deserializer)?.as_f64();
    Ok(value.max(0.0).min(u32::MAX as f64) as u32)
}

pub fn u64_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = NumberOrText::deserialize(deserializer)?.as_f64();
    Ok(value.max(0.0) as u64)
}

pub fn u64_list_from_any<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<NumberOrText>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .iter()
        .map(|value| value.as_f64().max(0.0) as u64)
        .collect())
}

/// `null` entries in answer lists mean "no answer".
pub fn strings_from_any<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.into_iter().map(Option::unwrap_or_default).collect())
}
