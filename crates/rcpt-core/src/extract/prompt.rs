//! The fixed extraction instruction sent with every receipt.

/// Instruction describing the expense report schema the model must fill.
pub const EXTRACTION_PROMPT: &str = r#"You are an expense-report assistant. Read the attached receipt image and extract its contents.

Return ONLY a JSON object with exactly this structure:
{
  "receipt_info": {
    "merchant_name": "string",
    "merchant_address": "string",
    "date": "YYYY-MM-DD",
    "time": "HH:MM",
    "server": "string or null",
    "guest_count": "number or null"
  },
  "items": [
    {
      "name": "string",
      "quantity": number,
      "unit_price": number,
      "total_price": number,
      "currency": "ISO 4217 code"
    }
  ],
  "totals": {
    "subtotal": number,
    "tax": number,
    "total": number,
    "payment_method": "string",
    "payment_amount": number,
    "change": number,
    "currency": "ISO 4217 code"
  },
  "expense_category": "Meals & Entertainment | Travel | Lodging | Transportation | Office Supplies | Other",
  "business_purpose": "short description inferred from the receipt"
}

Rules:
- Use numbers, not strings, for quantities and amounts.
- Use null for anything that is not printed on the receipt; never invent values.
- List every line item in the order it appears.
- Do not wrap the JSON in markdown and do not add commentary."#;
