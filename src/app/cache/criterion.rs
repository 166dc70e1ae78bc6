//! Query criteria and their conversion into offer predicates

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::models::ContractOffer;
use crate::errors::{CacheError, CacheResult};

/// Predicate over cached contract offers
pub type OfferPredicate = Box<dyn Fn(&ContractOffer) -> bool + Send + Sync>;

/// A single query condition, e.g. `asset:id = "asset-1"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub operand_left: String,
    pub operator: String,
    pub operand_right: Value,
}

impl Criterion {
    pub fn new(
        operand_left: impl Into<String>,
        operator: impl Into<String>,
        operand_right: impl Into<Value>,
    ) -> Self {
        Self {
            operand_left: operand_left.into(),
            operator: operator.into(),
            operand_right: operand_right.into(),
        }
    }

    /// `operand_left = operand_right`
    pub fn equals(operand_left: impl Into<String>, operand_right: impl Into<Value>) -> Self {
        Self::new(operand_left, "=", operand_right)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.operand_left, self.operator, self.operand_right
        )
    }
}

/// Turns criteria into predicates for a store
pub trait CriterionConverter: Send + Sync + fmt::Debug {
    fn convert(&self, criterion: &Criterion) -> CacheResult<OfferPredicate>;
}

/// Left operand naming the asset id
pub const ASSET_ID: &str = "asset:id";

/// Left operand naming the offer id
pub const OFFER_ID: &str = "offer:id";

/// Converter supporting `=` and `in`
///
/// The left operand is [`ASSET_ID`], [`OFFER_ID`] or the name of an asset
/// property. String values compare against string operands directly; any
/// other JSON value must be equal as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyCriterionConverter;

impl PropertyCriterionConverter {
    pub fn new() -> Self {
        Self
    }
}

impl CriterionConverter for PropertyCriterionConverter {
    fn convert(&self, criterion: &Criterion) -> CacheResult<OfferPredicate> {
        let field = criterion.operand_left.clone();

        match criterion.operator.as_str() {
            "=" => {
                let expected = criterion.operand_right.clone();
                Ok(Box::new(move |offer| {
                    lookup(offer, &field).is_some_and(|actual| actual == expected)
                }))
            }
            "in" => {
                let candidates = match &criterion.operand_right {
                    Value::Array(values) => values.clone(),
                    _ => {
                        return Err(CacheError::InvalidCriterion {
                            criterion: criterion.to_string(),
                            reason: "right operand of 'in' must be a list".to_string(),
                        })
                    }
                };
                Ok(Box::new(move |offer| {
                    lookup(offer, &field).is_some_and(|actual| candidates.contains(&actual))
                }))
            }
            other => Err(CacheError::UnsupportedOperator {
                operator: other.to_string(),
            }),
        }
    }
}

fn lookup(offer: &ContractOffer, field: &str) -> Option<Value> {
    match field {
        ASSET_ID => Some(Value::String(offer.asset.id.clone())),
        OFFER_ID => Some(Value::String(offer.id.clone())),
        property => offer.asset.properties.get(property).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Asset;
    use serde_json::json;

    fn offer(id: &str, asset: &str, kind: &str) -> ContractOffer {
        ContractOffer::new(id, Asset::new(asset).with_property("kind", json!(kind)))
    }

    #[test]
    fn test_equals_on_ids_and_properties() {
        let converter = PropertyCriterionConverter::new();
        let offer = offer("offer-1", "asset-1", "dataset");

        let by_asset = converter.convert(&Criterion::equals(ASSET_ID, "asset-1")).unwrap();
        let by_offer = converter.convert(&Criterion::equals(OFFER_ID, "offer-2")).unwrap();
        let by_kind = converter.convert(&Criterion::equals("kind", "dataset")).unwrap();
        let missing = converter.convert(&Criterion::equals("owner", "someone")).unwrap();

        assert!(by_asset(&offer));
        assert!(!by_offer(&offer));
        assert!(by_kind(&offer));
        assert!(!missing(&offer));
    }

    #[test]
    fn test_in_operator() {
        let converter = PropertyCriterionConverter::new();
        let predicate = converter
            .convert(&Criterion::new(ASSET_ID, "in", json!(["asset-1", "asset-3"])))
            .unwrap();

        assert!(predicate(&offer("o1", "asset-1", "a")));
        assert!(!predicate(&offer("o2", "asset-2", "a")));
    }

    #[test]
    fn test_in_requires_list() {
        let err = PropertyCriterionConverter::new()
            .convert(&Criterion::new(ASSET_ID, "in", "asset-1"))
            .err()
            .unwrap();
        assert!(matches!(err, CacheError::InvalidCriterion { .. }));
    }

    #[test]
    fn test_unsupported_operator() {
        let err = PropertyCriterionConverter::new()
            .convert(&Criterion::new(ASSET_ID, "like", "asset-%"))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Unsupported criterion operator: like");
    }

    #[test]
    fn test_criterion_display() {
        let criterion = Criterion::equals(ASSET_ID, "asset-1");
        assert_eq!(criterion.to_string(), "asset:id = \"asset-1\"");
    }
}
