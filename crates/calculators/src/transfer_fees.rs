//! Property transfer fees, banded by purchase price.
//!
//! Bands (per transferee): 3% up to €85,000, 5% on the next €85,000,
//! 8% above €170,000. Properties subject to VAT are exempt from transfer
//! fees, which the `vat_paid` flag reflects.

use serde_json::Value;

use crate::{CalcResult, CalcSuccess, euros, require_amount};

const BAND_ONE_CEILING: f64 = 85_000.0;
const BAND_TWO_CEILING: f64 = 170_000.0;

pub fn calculate(args: &Value) -> CalcResult {
    let price = require_amount(args, "price")?;
    let vat_paid = args.get("vat_paid").and_then(Value::as_bool).unwrap_or(false);

    if vat_paid {
        return Ok(CalcSuccess {
            breakdown: vec![
                format!("Purchase price: {}", euros(price)),
                "VAT was paid on this property, so no transfer fees apply.".to_string(),
            ],
            summary: format!("Transfer fees: {}", euros(0.0)),
        });
    }

    let band_one = price.min(BAND_ONE_CEILING) * 0.03;
    let band_two = (price.min(BAND_TWO_CEILING) - BAND_ONE_CEILING).max(0.0) * 0.05;
    let band_three = (price - BAND_TWO_CEILING).max(0.0) * 0.08;
    let total = band_one + band_two + band_three;

    Ok(CalcSuccess {
        breakdown: vec![
            format!("Purchase price: {}", euros(price)),
            format!("3% band (up to {}): {}", euros(BAND_ONE_CEILING), euros(band_one)),
            format!(
                "5% band ({}–{}): {}",
                euros(BAND_ONE_CEILING),
                euros(BAND_TWO_CEILING),
                euros(band_two)
            ),
            format!("8% band (above {}): {}", euros(BAND_TWO_CEILING), euros(band_three)),
        ],
        summary: format!("Total transfer fees: {}", euros(total)),
    })
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn first_band_only() {
        let result = calculate(&json!({"price": 50_000.0}));
        let success = result.ok().filter(|s| s.summary.contains("1500.00"));
        assert!(success.is_some(), "3% of 50,000 is 1,500");
    }

    #[test]
    fn all_three_bands() {
        // 85k * 3% + 85k * 5% + 30k * 8% = 2550 + 4250 + 2400 = 9200
        let result = calculate(&json!({"price": 200_000.0}));
        let success = result.ok().filter(|s| s.summary.contains("9200.00"));
        assert!(success.is_some());
    }

    #[test]
    fn vat_paid_means_zero_fees() {
        let result = calculate(&json!({"price": 300_000.0, "vat_paid": true}));
        let success = result.ok().filter(|s| s.summary.contains("0.00"));
        assert!(success.is_some());
    }

    #[test]
    fn missing_price_is_an_error() {
        assert!(calculate(&json!({})).is_err());
    }
}
