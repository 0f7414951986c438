//! Rendering of extraction results.

use std::fmt::Write as _;

use rcpt_core::models::expense::ExpenseReport;
use rcpt_core::rust_decimal::Decimal;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The model's JSON object, pretty-printed
    Json,
    /// Human-readable summary
    Text,
    /// One CSV row per line item
    Csv,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Render extracted data in the requested format.
///
/// Text and CSV need the typed view; if the model's object does not fit it,
/// the JSON is returned instead.
pub fn render(data: &Value, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(data)?);
    }

    let report = match ExpenseReport::from_value(data) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!("Model output does not match the report schema ({}), writing JSON", e);
            return Ok(serde_json::to_string_pretty(data)?);
        }
    };

    match format {
        OutputFormat::Text => Ok(format_text(&report)),
        OutputFormat::Csv => format_csv(&report),
        OutputFormat::Json => unreachable!("handled above"),
    }
}

fn money(value: Option<Decimal>, currency: Option<&str>) -> String {
    match (value, currency) {
        (Some(v), Some(c)) => format!("{:.2} {}", v, c),
        (Some(v), None) => format!("{:.2}", v),
        (None, _) => "-".to_string(),
    }
}

fn format_text(report: &ExpenseReport) -> String {
    let info = &report.receipt_info;
    let totals = &report.totals;
    let currency = report.currency();
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Merchant: {}",
        info.merchant_name.as_deref().unwrap_or("unknown")
    );
    if let Some(address) = &info.merchant_address {
        let _ = writeln!(output, "Address:  {}", address);
    }
    let when = [info.date.as_deref(), info.time.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !when.is_empty() {
        let _ = writeln!(output, "Date:     {}", when);
    }
    if let Some(server) = &info.server {
        let _ = writeln!(output, "Server:   {}", server);
    }
    if let Some(guests) = info.guest_count {
        let _ = writeln!(output, "Guests:   {}", guests);
    }

    if !report.items.is_empty() {
        output.push_str("\nItems:\n");
        for item in &report.items {
            let qty = item
                .quantity
                .map(|q| q.normalize().to_string())
                .unwrap_or_else(|| "1".to_string());
            let _ = writeln!(
                output,
                "  {} x {} = {}",
                qty,
                item.name.as_deref().unwrap_or("(unnamed)"),
                money(item.total_price, item.currency.as_deref().or(currency))
            );
        }
    }

    output.push_str("\nTotals:\n");
    let _ = writeln!(output, "  Subtotal: {}", money(totals.subtotal, currency));
    let _ = writeln!(output, "  Tax:      {}", money(totals.tax, currency));
    let _ = writeln!(output, "  Total:    {}", money(totals.total, currency));
    if totals.payment_method.is_some() || totals.payment_amount.is_some() {
        let _ = writeln!(
            output,
            "  Paid:     {} ({})",
            money(totals.payment_amount, currency),
            totals.payment_method.as_deref().unwrap_or("unknown method")
        );
    }
    if totals.change.is_some() {
        let _ = writeln!(output, "  Change:   {}", money(totals.change, currency));
    }

    if let Some(category) = &report.expense_category {
        let _ = writeln!(output, "\nCategory: {}", category);
    }
    if let Some(purpose) = &report.business_purpose {
        let _ = writeln!(output, "Purpose:  {}", purpose);
    }

    output
}

fn format_csv(report: &ExpenseReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let merchant = report.receipt_info.merchant_name.clone().unwrap_or_default();
    let date = report.receipt_info.date.clone().unwrap_or_default();
    let opt = |d: Option<Decimal>| d.map(|d| d.to_string()).unwrap_or_default();

    wtr.write_record([
        "merchant",
        "date",
        "item",
        "quantity",
        "unit_price",
        "total_price",
        "currency",
    ])?;

    for item in &report.items {
        wtr.write_record([
            merchant.as_str(),
            date.as_str(),
            item.name.as_deref().unwrap_or(""),
            &opt(item.quantity),
            &opt(item.unit_price),
            &opt(item.total_price),
            item.currency.as_deref().or(report.currency()).unwrap_or(""),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn data() -> Value {
        json!({
            "receipt_info": { "merchant_name": "Noodle Bar", "date": "2024-05-02", "time": "12:10" },
            "items": [
                { "name": "Ramen", "quantity": 2, "unit_price": 11, "total_price": 22 },
                { "name": "Tea, green", "quantity": 1, "unit_price": "2.50", "total_price": "2.50" }
            ],
            "totals": { "subtotal": 24.5, "tax": 1.5, "total": 26, "currency": "USD" },
            "expense_category": "Meals & Entertainment"
        })
    }

    #[test]
    fn test_json_is_verbatim() {
        let rendered = render(&data(), OutputFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, data());
    }

    #[test]
    fn test_text_summary() {
        let text = render(&data(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("Merchant: Noodle Bar\n"));
        assert!(text.contains("Date:     2024-05-02 12:10"));
        assert!(text.contains("  2 x Ramen = 22.00 USD"));
        assert!(text.contains("  Total:    26.00 USD"));
        assert!(text.contains("Category: Meals & Entertainment"));
    }

    #[test]
    fn test_csv_rows() {
        let csv = render(&data(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "merchant,date,item,quantity,unit_price,total_price,currency");
        assert_eq!(lines[1], "Noodle Bar,2024-05-02,Ramen,2,11,22,USD");
        assert_eq!(lines[2], "Noodle Bar,2024-05-02,\"Tea, green\",1,2.50,2.50,USD");
    }

    #[test]
    fn test_schema_mismatch_falls_back_to_json() {
        let odd = json!({ "items": { "not": "a list" } });
        let rendered = render(&odd, OutputFormat::Text).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&rendered).unwrap(), odd);
    }
}
