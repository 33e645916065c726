use serde::{Deserialize, Serialize};

/// A collectible listed in the catalog.
///
/// Field names follow the backend's column names (`mintCount`, `soldCount`,
/// `priceXEP`), so the struct round-trips through table rows unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub price: f64,
    #[serde(rename = "priceXEP", default, skip_serializing_if = "Option::is_none")]
    pub price_xep: Option<f64>,
    pub mint_count: u32,
    #[serde(default)]
    pub sold_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
}

/// Payload for listing a new item. The store assigns `id` and starts `sold_count` at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCreate {
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
    pub price_xep: Option<f64>,
    pub mint_count: u32,
    pub creator: Option<String>,
}

/// Partial update for an item. Only the fields that are set are merged and sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "priceXEP", skip_serializing_if = "Option::is_none")]
    pub price_xep: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
}

/// Checks a price or XEP price: finite and not negative.
fn check_price(label: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid {} {}", label, value));
    }
    Ok(())
}

fn check_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Item title is required".to_string());
    }
    Ok(())
}

impl ItemCreate {
    pub fn new(title: impl Into<String>, price: f64, mint_count: u32) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            image: String::new(),
            price,
            price_xep: None,
            mint_count,
            creator: None,
        }
    }

    pub fn with_price_xep(mut self, price_xep: f64) -> Self {
        self.price_xep = Some(price_xep);
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Title must be non-blank; prices must be finite and not negative.
    pub fn validate(&self) -> Result<(), String> {
        check_title(&self.title)?;
        check_price("price", self.price)?;
        if let Some(price_xep) = self.price_xep {
            check_price("XEP price", price_xep)?;
        }
        Ok(())
    }
}

impl ItemPatch {
    pub fn sold_count(sold_count: u32) -> Self {
        Self {
            sold_count: Some(sold_count),
            ..Self::default()
        }
    }
}

impl Item {
    pub fn is_sold_out(&self) -> bool {
        self.sold_count >= self.mint_count
    }

    pub fn remaining(&self) -> u32 {
        self.mint_count.saturating_sub(self.sold_count)
    }

    /// Merges `patch` into the item.
    ///
    /// # Errors
    /// Rejects the patch without touching the item if it carries a value
    /// [`ItemCreate::validate`] would refuse, or if the result would sell more
    /// units than were minted.
    pub fn apply_patch(&mut self, patch: ItemPatch) -> Result<(), String> {
        if let Some(title) = &patch.title {
            check_title(title)?;
        }
        if let Some(price) = patch.price {
            check_price("price", price)?;
        }
        if let Some(price_xep) = patch.price_xep {
            check_price("XEP price", price_xep)?;
        }
        let mint_count = patch.mint_count.unwrap_or(self.mint_count);
        let sold_count = patch.sold_count.unwrap_or(self.sold_count);
        if sold_count > mint_count {
            return Err(format!(
                "sold count {} would exceed mint count {}",
                sold_count, mint_count
            ));
        }

        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(image) = patch.image {
            self.image = image;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(price_xep) = patch.price_xep {
            self.price_xep = Some(price_xep);
        }
        if let Some(creator) = patch.creator {
            self.creator = Some(creator);
        }
        self.mint_count = mint_count;
        self.sold_count = sold_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(mint_count: u32, sold_count: u32) -> Item {
        Item {
            id: "item_1".to_string(),
            title: "Genesis".to_string(),
            description: String::new(),
            image: String::new(),
            price: 10.0,
            price_xep: None,
            mint_count,
            sold_count,
            creator: None,
        }
    }

    #[test]
    fn test_patch_rejects_oversell_without_mutation() {
        let mut item = item(2, 1);
        let result = item.apply_patch(ItemPatch {
            title: Some("Renamed".to_string()),
            sold_count: Some(3),
            ..ItemPatch::default()
        });

        assert!(result.is_err());
        assert_eq!(item.title, "Genesis");
        assert_eq!(item.sold_count, 1);
    }

    #[test]
    fn test_patch_rejects_shrinking_mint_below_sold() {
        let mut item = item(5, 4);
        let result = item.apply_patch(ItemPatch {
            mint_count: Some(3),
            ..ItemPatch::default()
        });
        assert!(result.is_err());
        assert_eq!(item.mint_count, 5);
    }

    #[test]
    fn test_patch_rejects_bad_prices_without_mutation() {
        let mut item = item(3, 0);
        for price in [-5.0, f64::NAN, f64::INFINITY] {
            let result = item.apply_patch(ItemPatch {
                title: Some("Renamed".to_string()),
                price: Some(price),
                ..ItemPatch::default()
            });
            assert!(result.is_err());
        }
        let result = item.apply_patch(ItemPatch {
            price_xep: Some(-1.0),
            ..ItemPatch::default()
        });
        assert!(result.is_err());
        let result = item.apply_patch(ItemPatch {
            title: Some("   ".to_string()),
            ..ItemPatch::default()
        });
        assert!(result.is_err());

        assert_eq!(item.title, "Genesis");
        assert_eq!(item.price, 10.0);
        assert_eq!(item.price_xep, None);
    }

    #[test]
    fn test_create_validation() {
        assert!(ItemCreate::new("Genesis", 0.0, 1).validate().is_ok());
        assert!(ItemCreate::new(" ", 1.0, 1).validate().is_err());
        assert!(ItemCreate::new("Genesis", f64::NAN, 1).validate().is_err());
        assert!(ItemCreate::new("Genesis", 1.0, 1)
            .with_price_xep(-0.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_row_uses_backend_column_names() {
        let mut item = item(3, 0);
        item.price_xep = Some(2.5);
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["mintCount"], 3);
        assert_eq!(value["soldCount"], 0);
        assert_eq!(value["priceXEP"], 2.5);
        assert!(value.get("creator").is_none());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let value = serde_json::to_value(ItemPatch::sold_count(4)).unwrap();
        assert_eq!(value, serde_json::json!({ "soldCount": 4 }));
        assert_eq!(serde_json::to_value(ItemPatch::default()).unwrap(), serde_json::json!({}));
    }
}
