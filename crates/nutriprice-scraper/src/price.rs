//! Locale-aware price parsing for vendor product pages.
//!
//! Vendor pages render prices Turkish-style: `.` groups thousands, `,`
//! separates the minor unit, and a currency marker trails the number
//! (`"1.240,50 TL"`). Amounts are assembled in minor units (kuruş) and
//! only converted to a float at the very end.

use scraper::{Html, Selector};

use crate::error::ScraperError;

/// Currency markers stripped before parsing. Longest first so `TRY` is not
/// left half-stripped.
const CURRENCY_MARKERS: [&str; 3] = ["TRY", "TL", "₺"];

/// Parses a displayed price such as `"1.234,56 TL"` into `1234.56`.
///
/// The minor part is an integer number of minor units, so `"12,5"` is 12.05.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidPrice`] when the text is empty, contains
/// anything besides digits, grouping dots, one decimal comma and a currency
/// marker, has more than two minor digits, or overflows.
pub fn parse_price_text(text: &str) -> Result<f64, ScraperError> {
    let invalid = |reason: &str| ScraperError::InvalidPrice {
        text: text.to_owned(),
        reason: reason.to_owned(),
    };

    let mut cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }

    if cleaned.is_empty() {
        return Err(invalid("no digits"));
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return Err(invalid("unexpected characters"));
    }

    let mut parts = cleaned.split(',');
    let major_raw = parts.next().unwrap_or_default();
    let minor_raw = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(invalid("more than one decimal comma"));
    }

    let major_digits = major_raw.replace('.', "");
    if major_digits.is_empty() {
        return Err(invalid("missing major unit"));
    }
    let major: u64 = major_digits
        .parse()
        .map_err(|_| invalid("major unit is not an integer"))?;

    if minor_raw.contains('.') {
        return Err(invalid("minor unit is not an integer"));
    }
    if minor_raw.len() > 2 {
        return Err(invalid("more than two minor digits"));
    }
    let minor: u64 = if minor_raw.is_empty() {
        0
    } else {
        minor_raw
            .parse()
            .map_err(|_| invalid("minor unit is not an integer"))?
    };

    let minor_units = major
        .checked_mul(100)
        .and_then(|m| m.checked_add(minor))
        .ok_or_else(|| invalid("amount overflows"))?;

    #[allow(clippy::cast_precision_loss)]
    let amount = minor_units as f64 / 100.0;
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(invalid("amount is not finite"))
    }
}

/// Finds the first element matching `selector` in `html` and parses its text
/// as a price.
///
/// # Errors
///
/// - [`ScraperError::PriceNotFound`] when no element matches or its text is blank.
/// - [`ScraperError::InvalidPrice`] when the text cannot be parsed.
pub fn extract_price_from_html(
    html: &str,
    selector: &Selector,
    selector_text: &str,
    url: &str,
) -> Result<f64, ScraperError> {
    let document = Html::parse_document(html);
    let text = document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ScraperError::PriceNotFound {
            selector: selector_text.to_owned(),
            url: url.to_owned(),
        })?;

    parse_price_text(&text)
}

/// Compiles a CSS selector, mapping the borrowed parse error into an owned one.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] if `selector` is not valid CSS.
pub fn compile_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::InvalidSelector {
        selector: selector.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "price_test.rs"]
mod tests;
