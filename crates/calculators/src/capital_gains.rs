//! Capital-gains tax on a property sale: 20% of the gain above the
//! lifetime personal allowance.

use serde_json::Value;

use crate::{CalcResult, CalcSuccess, euros, require_amount};

const RATE: f64 = 0.20;
/// Default lifetime personal allowance.
const DEFAULT_ALLOWANCE: f64 = 17_086.0;

pub fn calculate(args: &Value) -> CalcResult {
    let sale_price = require_amount(args, "sale_price")?;
    let purchase_price = require_amount(args, "purchase_price")?;
    let expenses = match args.get("expenses") {
        Some(_) => require_amount(args, "expenses")?,
        None => 0.0,
    };
    let allowance = match args.get("allowance") {
        Some(_) => require_amount(args, "allowance")?,
        None => DEFAULT_ALLOWANCE,
    };

    let gain = (sale_price - purchase_price - expenses).max(0.0);
    let taxable = (gain - allowance).max(0.0);
    let tax = taxable * RATE;

    Ok(CalcSuccess {
        breakdown: vec![
            format!("Sale price: {}", euros(sale_price)),
            format!("Purchase price: {}", euros(purchase_price)),
            format!("Deductible expenses: {}", euros(expenses)),
            format!("Gain: {}", euros(gain)),
            format!("Personal allowance: {}", euros(allowance)),
            format!("Taxable gain: {}", euros(taxable)),
        ],
        summary: format!("Capital-gains tax (20%): {}", euros(tax)),
    })
}
