//! Supplement records, their vendor offers, and the input shapes accepted
//! from API callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// One vendor's listing for a supplement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub brand_name: String,
    pub product_link: String,
    /// Per-unit price in currency units. `None` until a price has been
    /// supplied or scraped at least once.
    #[serde(default)]
    pub price: Option<f64>,
    /// Pack size divisor: the vendor price is divided by this to get a
    /// per-unit price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Brand {
    /// Divisor applied to scraped prices; missing or unusable scales count as 1.
    #[must_use]
    pub fn divisor(&self) -> f64 {
        self.scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0)
    }

    #[must_use]
    pub fn has_valid_price(&self) -> bool {
        self.price.is_some_and(is_valid_price)
    }

    /// Stores a freshly extracted vendor price, normalized by [`Self::divisor`].
    ///
    /// Returns `false` and leaves the stored price untouched when the
    /// normalized value is not a usable price.
    pub fn apply_extracted_price(&mut self, extracted: f64) -> bool {
        let per_unit = extracted / self.divisor();
        if !is_valid_price(per_unit) {
            return false;
        }
        self.price = Some(per_unit);
        true
    }
}

/// `true` for finite, non-negative amounts. Zero is a real (free) price.
#[must_use]
pub fn is_valid_price(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Mean of the brands that currently carry a valid price.
///
/// Returns `None` when no brand has one, so callers can keep their previous
/// average instead of dividing by zero.
#[must_use]
pub fn average_price(brands: &[Brand]) -> Option<f64> {
    let (sum, count) = brands
        .iter()
        .filter_map(|b| b.price.filter(|p| is_valid_price(*p)))
        .fold((0.0_f64, 0_u32), |(sum, count), p| (sum + p, count + 1));

    if count == 0 {
        return None;
    }
    let mean = sum / f64::from(count);
    mean.is_finite().then_some(mean)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplement {
    pub id: Uuid,
    pub name: String,
    pub amount: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub average_price: f64,
    pub brands: Vec<Brand>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplement {
    /// Recomputes `average_price` from the brands with valid prices.
    ///
    /// With no valid brand price the previous average is kept. Returns
    /// whether the stored average changed.
    pub fn recompute_average(&mut self) -> bool {
        let Some(avg) = average_price(&self.brands) else {
            return false;
        };
        let changed = avg.to_bits() != self.average_price.to_bits();
        self.average_price = avg;
        changed
    }
}

/// Brand entry as sent by API callers; every field is optional so missing
/// values surface as validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandInput {
    pub brand_name: Option<String>,
    pub product_link: Option<String>,
    pub price: Option<f64>,
    pub scale: Option<f64>,
}

impl BrandInput {
    /// Validates one brand entry; `index` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when `brandName` or `productLink` is absent or
    /// blank, the link is not an http(s) URL, or `scale` is not positive.
    pub fn validate(self, index: usize) -> Result<Brand, CoreError> {
        let brand_name = required_text(self.brand_name, &format!("brands[{index}].brandName"))?;
        let product_link =
            required_text(self.product_link, &format!("brands[{index}].productLink"))?;

        if !(product_link.starts_with("http://") || product_link.starts_with("https://")) {
            return Err(CoreError::InvalidField {
                field: format!("brands[{index}].productLink"),
                reason: format!("expected an http(s) URL, got '{product_link}'"),
            });
        }

        if let Some(scale) = self.scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(CoreError::InvalidField {
                    field: format!("brands[{index}].scale"),
                    reason: format!("must be greater than zero, got {scale}"),
                });
            }
        }

        Ok(Brand {
            brand_name,
            product_link,
            price: self.price.filter(|p| is_valid_price(*p)),
            scale: self.scale,
        })
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplement {
    pub name: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub brands: Vec<BrandInput>,
}

impl NewSupplement {
    /// Validates the input and builds a fresh record with a new id.
    ///
    /// The average starts from whatever valid prices the caller supplied,
    /// or `0.0` when there are none.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when `name`, `type` or any brand field is invalid.
    pub fn into_supplement(self, now: DateTime<Utc>) -> Result<Supplement, CoreError> {
        let name = required_text(self.name, "name")?;
        let kind = required_text(self.kind, "type")?;
        let brands = validate_brands(self.brands)?;
        let average_price = average_price(&brands).unwrap_or(0.0);

        Ok(Supplement {
            id: Uuid::new_v4(),
            name,
            amount: optional_text(self.amount),
            category: optional_text(self.category),
            kind,
            average_price,
            brands,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Body of an update request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementPatch {
    pub name: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub brands: Option<Vec<BrandInput>>,
}

impl SupplementPatch {
    /// # Errors
    ///
    /// Returns [`CoreError`] when a supplied `name`/`type` is blank or a
    /// supplied brand entry is invalid. A blank `amount`/`category` is
    /// treated as absent, the same as on create.
    pub fn validate(self) -> Result<SupplementChanges, CoreError> {
        let name = self
            .name
            .map(|n| required_text(Some(n), "name"))
            .transpose()?;
        let kind = self
            .kind
            .map(|k| required_text(Some(k), "type"))
            .transpose()?;
        let brands = self.brands.map(validate_brands).transpose()?;

        Ok(SupplementChanges {
            name,
            amount: optional_text(self.amount),
            category: optional_text(self.category),
            kind,
            average_price: None,
            brands,
        })
    }
}

/// Validated field changes handed to the persistence layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupplementChanges {
    pub name: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub average_price: Option<f64>,
    pub brands: Option<Vec<Brand>>,
}

impl SupplementChanges {
    /// Changes that only carry refreshed prices.
    #[must_use]
    pub fn prices(brands: Vec<Brand>, average_price: f64) -> Self {
        Self {
            brands: Some(brands),
            average_price: Some(average_price),
            ..Self::default()
        }
    }

    /// Applies the changes in place and bumps `updated_at`.
    pub fn apply_to(&self, supplement: &mut Supplement, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            supplement.name.clone_from(name);
        }
        if let Some(amount) = &self.amount {
            supplement.amount = Some(amount.clone());
        }
        if let Some(category) = &self.category {
            supplement.category = Some(category.clone());
        }
        if let Some(kind) = &self.kind {
            supplement.kind.clone_from(kind);
        }
        if let Some(avg) = self.average_price {
            supplement.average_price = avg;
        }
        if let Some(brands) = &self.brands {
            supplement.brands.clone_from(brands);
        }
        supplement.updated_at = now;
    }
}

fn validate_brands(inputs: Vec<BrandInput>) -> Result<Vec<Brand>, CoreError> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| input.validate(i))
        .collect()
}

fn required_text(value: Option<String>, field: &str) -> Result<String, CoreError> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::MissingField(field.to_owned()))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "supplements_test.rs"]
mod tests;
