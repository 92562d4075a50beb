//! VAT on a new-property purchase: standard 19%, or the reduced 5%
//! first-home rate when requested.

use serde_json::Value;

use crate::{CalcFailure, CalcResult, CalcSuccess, euros, require_amount};

const STANDARD_RATE: f64 = 0.19;
const REDUCED_RATE: f64 = 0.05;

pub fn calculate(args: &Value) -> CalcResult {
    let price = require_amount(args, "price")?;
    let reduced = match args.get("reduced_rate") {
        None => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| CalcFailure::invalid_input("reduced_rate must be a boolean"))?,
    };

    let rate = if reduced { REDUCED_RATE } else { STANDARD_RATE };
    let vat = price * rate;

    Ok(CalcSuccess {
        breakdown: vec![
            format!("Net price: {}", euros(price)),
            format!(
                "VAT rate: {:.0}%{}",
                rate * 100.0,
                if reduced { " (reduced first-home rate)" } else { "" }
            ),
            format!("VAT amount: {}", euros(vat)),
        ],
        summary: format!("Total incl. VAT: {}", euros(price + vat)),
    })
}
