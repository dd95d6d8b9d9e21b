use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pricing policy a basket or order line is resolved under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    #[sea_orm(string_value = "REGULAR")]
    Regular,
    #[sea_orm(string_value = "FLASH_SALE")]
    FlashSale,
    #[sea_orm(string_value = "DISCOUNT")]
    Discount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_wire_names() {
        assert_eq!(ProductType::from_str("FLASH_SALE").ok(), Some(ProductType::FlashSale));
        assert_eq!(ProductType::Discount.to_string(), "DISCOUNT");
        assert!(ProductType::from_str("BUNDLE").is_err());
    }
}
