//! Calculator dispatch.
//!
//! Each calculator is a pure function of its JSON argument object; none may
//! read or write session or user state. Dispatch is a name → function lookup;
//! an unknown name yields a typed [`CalcErrorCode::UnknownCalculator`] result,
//! never a panic. Execution is timed for logging; the duration never affects
//! the value.

pub mod capital_gains;
pub mod transfer_fees;
pub mod vat;

use std::{collections::HashMap, time::Duration};

use {serde_json::Value, tracing::info};

/// Link offered to the user when a calculator fails, so they always have a
/// next step.
pub const CALCULATOR_HELP_URL: &str = "https://proptalk.example/help/calculators";

/// Structured success: line-by-line breakdown plus a one-line human summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcSuccess {
    pub breakdown: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcErrorCode {
    UnknownCalculator,
    MissingInput,
    InvalidInput,
}

impl CalcErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownCalculator => "UNKNOWN_CALCULATOR",
            Self::MissingInput => "MISSING_INPUT",
            Self::InvalidInput => "INVALID_INPUT",
        }
    }
}

/// Typed failure; carries a help reference for the reply text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}: {message}", code.as_str())]
pub struct CalcFailure {
    pub code: CalcErrorCode,
    pub message: String,
    pub help: &'static str,
}

impl CalcFailure {
    #[must_use]
    pub fn missing_input(field: &str) -> Self {
        Self {
            code: CalcErrorCode::MissingInput,
            message: format!("missing required input: {field}"),
            help: CALCULATOR_HELP_URL,
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: CalcErrorCode::InvalidInput,
            message: message.into(),
            help: CALCULATOR_HELP_URL,
        }
    }
}

pub type CalcResult = Result<CalcSuccess, CalcFailure>;

/// Completed invocation record: result plus execution duration for logging.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub outcome: CalcResult,
    pub duration: Duration,
}

impl Invocation {
    /// Render the outcome as user-facing reply text.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.outcome {
            Ok(success) => {
                let mut lines = success.breakdown.clone();
                lines.push(String::new());
                lines.push(success.summary.clone());
                lines.join("\n")
            },
            Err(failure) => format!(
                "Sorry, I couldn't run that calculation: {}.\nMore info: {}",
                failure.message, failure.help
            ),
        }
    }
}

type CalcFn = fn(&Value) -> CalcResult;

/// Name → pure function registry.
pub struct CalculatorRegistry {
    calculators: HashMap<&'static str, CalcFn>,
}

impl CalculatorRegistry {
    /// Registry with the built-in property calculators.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut calculators: HashMap<&'static str, CalcFn> = HashMap::new();
        calculators.insert("transfer_fees", transfer_fees::calculate);
        calculators.insert("capital_gains_tax", capital_gains::calculate);
        calculators.insert("vat", vat::calculate);
        Self { calculators }
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.calculators.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Execute `name` with `args`, timing the call.
    #[must_use]
    pub fn execute(&self, name: &str, args: &Value) -> Invocation {
        let started = std::time::Instant::now();
        let outcome = match self.calculators.get(name) {
            Some(calc) => calc(args),
            None => Err(CalcFailure {
                code: CalcErrorCode::UnknownCalculator,
                message: format!("no calculator named '{name}'"),
                help: CALCULATOR_HELP_URL,
            }),
        };
        let duration = started.elapsed();
        info!(
            calculator = name,
            ok = outcome.is_ok(),
            duration_us = duration.as_micros() as u64,
            "calculator executed"
        );
        Invocation {
            name: name.to_string(),
            outcome,
            duration,
        }
    }
}

/// Pull a required positive number out of the argument object.
pub(crate) fn require_amount(args: &Value, field: &str) -> Result<f64, CalcFailure> {
    let value = args
        .get(field)
        .ok_or_else(|| CalcFailure::missing_input(field))?;
    let amount = value
        .as_f64()
        .ok_or_else(|| CalcFailure::invalid_input(format!("{field} must be a number")))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(CalcFailure::invalid_input(format!(
            "{field} must be a non-negative amount"
        )));
    }
    Ok(amount)
}

/// Format an amount as euros with two decimals.
pub(crate) fn euros(amount: f64) -> String {
    format!("\u{20ac}{amount:.2}")
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn unknown_calculator_is_a_typed_error() {
        let registry = CalculatorRegistry::with_builtin();
        let invocation = registry.execute("mortgage", &json!({}));
        match invocation.outcome {
            Err(failure) => {
                assert_eq!(failure.code, CalcErrorCode::UnknownCalculator);
                assert_eq!(failure.help, CALCULATOR_HELP_URL);
            },
            Ok(_) => panic!("expected UNKNOWN_CALCULATOR"),
        }
    }

    #[test]
    fn builtin_names_are_stable() {
        let registry = CalculatorRegistry::with_builtin();
        assert_eq!(registry.names(), vec![
            "capital_gains_tax",
            "transfer_fees",
            "vat"
        ]);
    }

    #[test]
    fn render_failure_includes_help_link() {
        let registry = CalculatorRegistry::with_builtin();
        let invocation = registry.execute("nope", &json!({}));
        let text = invocation.render();
        assert!(text.contains(CALCULATOR_HELP_URL));
    }

    #[test]
    fn duration_is_recorded() {
        let registry = CalculatorRegistry::with_builtin();
        let invocation = registry.execute("vat", &json!({"price": 100_000.0}));
        assert!(invocation.outcome.is_ok());
        // Zero is possible on a coarse clock; it just has to be present.
        let _ = invocation.duration;
    }

    #[test]
    fn missing_amount_is_reported_by_field_name() {
        let err = require_amount(&json!({}), "price").err();
        assert!(err.is_some_and(|e| e.message.contains("price")));
    }

    #[test]
    fn negative_amount_rejected() {
        let err = require_amount(&json!({"price": -1.0}), "price").err();
        assert!(err.is_some_and(|e| e.code == CalcErrorCode::InvalidInput));
    }
}
