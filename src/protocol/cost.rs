use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// An amount charged or authorized through the cost channel.
///
/// `amount_usd_milli_cents` accepts a bare integer or a float on the wire; a
/// float is rounded up (ceiling) to the nearest whole milli-cent, matching
/// the platform's own validator. Any other JSON type is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostItem {
    pub amount_usd_milli_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CostItem {
    pub fn new(amount_usd_milli_cents: i64) -> Self {
        Self {
            amount_usd_milli_cents,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<'de> Deserialize<'de> for CostItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            amount_usd_milli_cents: serde_json::Value,
            #[serde(default)]
            description: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let amount = ceiling_round_amount(&raw.amount_usd_milli_cents).map_err(de::Error::custom)?;
        Ok(CostItem {
            amount_usd_milli_cents: amount,
            description: raw.description,
        })
    }
}

fn ceiling_round_amount(value: &serde_json::Value) -> Result<i64, String> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                Ok(f.ceil() as i64)
            } else {
                Err(format!("amount_usd_milli_cents out of range: {n}"))
            }
        }
        other => Err(format!(
            "amount_usd_milli_cents must be a number, got {other}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_amount_passes_through() {
        let item: CostItem = serde_json::from_value(serde_json::json!({
            "amount_usd_milli_cents": 150
        }))
        .unwrap();
        assert_eq!(item.amount_usd_milli_cents, 150);
    }

    #[test]
    fn float_amount_rounds_up() {
        let item: CostItem = serde_json::from_value(serde_json::json!({
            "amount_usd_milli_cents": 150.2
        }))
        .unwrap();
        assert_eq!(item.amount_usd_milli_cents, 151);
    }

    #[test]
    fn string_amount_is_rejected() {
        let result: Result<CostItem, _> = serde_json::from_value(serde_json::json!({
            "amount_usd_milli_cents": "150"
        }));
        assert!(result.is_err());
    }
}
