//! Expense report data model.
//!
//! The model is asked for a fixed schema but nothing guarantees it complies,
//! so every field is optional and values are read leniently: amounts may
//! arrive as numbers or as strings such as `"$1,234.50"`, and a value that
//! cannot be understood becomes `None` instead of failing the whole report.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// A structured expense report recovered from a receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseReport {
    /// Merchant and visit details.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub receipt_info: ReceiptInfo,

    /// Purchased items, in receipt order.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub items: Vec<Item>,

    /// Totals and payment.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub totals: Totals,

    /// Category such as "Meals & Entertainment".
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub expense_category: Option<String>,

    /// Free-text business purpose.
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub business_purpose: Option<String>,

    /// Keys the model added beyond the requested schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Merchant and visit details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptInfo {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub merchant_address: Option<String>,

    /// Date as printed, normalised by the model to `YYYY-MM-DD` when it can.
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Server or cashier name.
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub guest_count: Option<u32>,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<Decimal>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_price: Option<Decimal>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_price: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Receipt totals and payment details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub subtotal: Option<Decimal>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub tax: Option<Decimal>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_amount: Option<Decimal>,

    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::serialize_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub change: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl ReceiptInfo {
    /// The receipt date, if it is a valid `YYYY-MM-DD` date.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    }
}

/// Tolerance when cross-checking amounts.
const TOLERANCE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Whether two amounts agree. Differences too large to represent do not.
fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    a.checked_sub(b).is_some_and(|d| d.abs() <= TOLERANCE)
}

impl ExpenseReport {
    /// Build the typed view of a parsed model answer.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Currency of the report, falling back to the first item that has one.
    pub fn currency(&self) -> Option<&str> {
        self.totals
            .currency
            .as_deref()
            .or_else(|| self.items.iter().find_map(|i| i.currency.as_deref()))
    }

    /// Sum of item totals, if every item carries one and the sum fits.
    pub fn items_total(&self) -> Option<Decimal> {
        if self.items.is_empty() {
            return None;
        }
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.total_price?))
    }

    /// Cross-check amounts and return human-readable issues.
    ///
    /// Receipts legitimately disagree with themselves (discounts, tips,
    /// rounding), so these are warnings for the reader, not errors.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.receipt_info.merchant_name.is_none() {
            issues.push("Missing merchant name".to_string());
        }
        if self.totals.total.is_none() {
            issues.push("Missing total".to_string());
        }
        if let Some(date) = &self.receipt_info.date {
            if self.receipt_info.parsed_date().is_none() {
                issues.push(format!("Date '{}' is not in YYYY-MM-DD form", date));
            }
        }

        for (idx, item) in self.items.iter().enumerate() {
            let name = item.name.as_deref().unwrap_or("unnamed");
            if let (Some(qty), Some(unit), Some(total)) =
                (item.quantity, item.unit_price, item.total_price)
            {
                match qty.checked_mul(unit) {
                    Some(expected) if !within_tolerance(expected, total) => {
                        issues.push(format!(
                            "Item {} ({}): quantity x unit price = {}, but total price is {}",
                            idx + 1,
                            name,
                            expected.normalize(),
                            total.normalize()
                        ));
                    }
                    Some(_) => {}
                    None => issues.push(format!(
                        "Item {} ({}): quantity x unit price is out of range",
                        idx + 1,
                        name
                    )),
                }
            }
        }

        if let Some(subtotal) = self.totals.subtotal {
            let all_priced = !self.items.is_empty()
                && self.items.iter().all(|i| i.total_price.is_some());
            match self.items_total() {
                Some(items_total) if !within_tolerance(items_total, subtotal) => {
                    issues.push(format!(
                        "Item totals sum to {}, but subtotal is {}",
                        items_total.normalize(),
                        subtotal.normalize()
                    ));
                }
                None if all_priced => issues.push("Item totals sum is out of range".to_string()),
                _ => {}
            }
        }

        if let (Some(subtotal), Some(tax), Some(total)) =
            (self.totals.subtotal, self.totals.tax, self.totals.total)
        {
            match subtotal.checked_add(tax) {
                Some(sum) if !within_tolerance(sum, total) => {
                    issues.push(format!(
                        "Subtotal + tax = {}, but total is {}",
                        sum.normalize(),
                        total.normalize()
                    ));
                }
                Some(_) => {}
                None => issues.push("Subtotal + tax is out of range".to_string()),
            }
        }

        if let (Some(paid), Some(total), Some(change)) = (
            self.totals.payment_amount,
            self.totals.total,
            self.totals.change,
        ) {
            match paid.checked_sub(total) {
                Some(expected) if !within_tolerance(expected, change) => {
                    issues.push(format!(
                        "Paid {} for a total of {}, but change is {}",
                        paid.normalize(),
                        total.normalize(),
                        change.normalize()
                    ));
                }
                Some(_) => {}
                None => issues.push("Paid amount minus total is out of range".to_string()),
            }
        }

        issues
    }
}
