// 📥 Transaction Import - loosely-typed external rows → canonical Transaction
//
// Every record produces exactly one transaction. Missing or malformed fields
// fall back to defaults instead of failing the batch.

use crate::db::{new_id, Transaction, TransactionType};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_DESCRIPTION: &str = "Imported Transaction";
pub const UNKNOWN_COUNTERPARTY: &str = "Unknown";

// ============================================================================
// RAW RECORD
// ============================================================================

/// Amount as it arrived: spreadsheets and JSON exports disagree on whether
/// it is a number or a string
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    /// Parsed value, or None when the text does not parse.
    /// Empty or blank text counts as zero. Infinities and NaN come back as-is.
    pub fn parse(&self) -> Option<f64> {
        match self {
            RawAmount::Number(n) => Some(*n),
            RawAmount::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
        }
    }

    /// Finite numeric value, or None when it is unparseable or non-finite
    pub fn to_number(&self) -> Option<f64> {
        self.parse().filter(|value| value.is_finite())
    }
}

/// One row of an external batch. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImportRecord {
    #[serde(default, alias = "Date", deserialize_with = "lenient_text")]
    pub date: Option<String>,

    #[serde(default, alias = "Amount", deserialize_with = "lenient_amount")]
    pub amount: Option<RawAmount>,

    #[serde(default, alias = "Category", deserialize_with = "lenient_text")]
    pub category: Option<String>,

    #[serde(default, alias = "Description", deserialize_with = "lenient_text")]
    pub description: Option<String>,

    #[serde(default, alias = "Vendor", deserialize_with = "lenient_text")]
    pub vendor: Option<String>,

    #[serde(default, alias = "Source", deserialize_with = "lenient_text")]
    pub source: Option<String>,
}

impl RawImportRecord {
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(RawAmount::Number(amount));
        self
    }

    pub fn with_date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_vendor(mut self, vendor: &str) -> Self {
        self.vendor = Some(vendor.to_string());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

// ============================================================================
// LENIENT FIELD DECODING
// ============================================================================

/// Scalar of any shape, or None for null/nested values
enum LooseScalar {
    Number(f64),
    Text(String),
    Absent,
}

struct LooseScalarVisitor;

impl<'de> Visitor<'de> for LooseScalarVisitor {
    type Value = LooseScalar;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Text(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Text(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Absent)
    }

    fn visit_none<E: de::Error>(self) -> Result<LooseScalar, E> {
        Ok(LooseScalar::Absent)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<LooseScalar, D::Error> {
        deserializer.deserialize_any(LooseScalarVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<LooseScalar, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(LooseScalar::Absent)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LooseScalar, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(LooseScalar::Absent)
    }
}

/// JSON numbers in text fields are rendered back to text. CSV rows never come
/// through here: their cells are taken verbatim by `CsvColumns`.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match deserializer.deserialize_any(LooseScalarVisitor)? {
        LooseScalar::Text(s) => Some(s),
        LooseScalar::Number(n) => Some(n.to_string()),
        LooseScalar::Absent => None,
    })
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<RawAmount>, D::Error> {
    Ok(match deserializer.deserialize_any(LooseScalarVisitor)? {
        LooseScalar::Number(n) => Some(RawAmount::Number(n)),
        LooseScalar::Text(s) => Some(RawAmount::Text(s)),
        LooseScalar::Absent => None,
    })
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Import timestamp in the `2023-10-20T14:03:11.512Z` form
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Normalize one record using `now` as the fallback date
pub fn normalize_record(record: &RawImportRecord, now: DateTime<Utc>) -> Transaction {
    let parsed = record.amount.as_ref().and_then(RawAmount::parse);
    let amount = match &record.amount {
        Some(raw) => raw.to_number().unwrap_or_else(|| {
            warn!(amount = ?raw, "unparseable amount, defaulting to 0");
            0.0
        }),
        None => 0.0,
    };

    // Direction comes from the sign as written, so "-Infinity" is still an expense.
    // Zero, missing and unparseable amounts count as income.
    let transaction_type = if parsed.is_some_and(|value| value < 0.0) {
        TransactionType::Expense
    } else {
        TransactionType::Income
    };

    let (vendor, source) = match transaction_type {
        TransactionType::Expense => (
            Some(non_empty(&record.vendor).unwrap_or(UNKNOWN_COUNTERPARTY).to_string()),
            None,
        ),
        TransactionType::Income => (
            None,
            Some(non_empty(&record.source).unwrap_or(UNKNOWN_COUNTERPARTY).to_string()),
        ),
    };

    Transaction {
        id: new_id(),
        date: non_empty(&record.date)
            .map(str::to_string)
            .unwrap_or_else(|| iso_timestamp(now)),
        amount: amount.abs(),
        category: non_empty(&record.category).unwrap_or(DEFAULT_CATEGORY).to_string(),
        description: non_empty(&record.description)
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string(),
        transaction_type,
        vendor,
        source,
    }
}

/// Normalize a batch with an explicit import time
pub fn import_batch_at(records: &[RawImportRecord], now: DateTime<Utc>) -> Vec<Transaction> {
    let transactions: Vec<Transaction> = records
        .iter()
        .map(|record| normalize_record(record, now))
        .collect();

    debug!(count = transactions.len(), "normalized import batch");
    transactions
}

/// Normalize a batch, one transaction per record in input order
pub fn import_batch(records: &[RawImportRecord]) -> Vec<Transaction> {
    import_batch_at(records, Utc::now())
}

// ============================================================================
// FILE LOADING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Csv,
}

impl ImportFormat {
    pub fn detect(file_path: &Path) -> Result<Self> {
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "json" => Ok(ImportFormat::Json),
            "csv" => Ok(ImportFormat::Csv),
            _ => bail!(
                "Unsupported import file (expected .json or .csv): {}",
                file_path.display()
            ),
        }
    }
}

/// Column positions of the known fields in a CSV header row.
/// Header names are matched case-insensitively; unknown columns are ignored.
#[derive(Debug, Default)]
struct CsvColumns {
    date: Option<usize>,
    amount: Option<usize>,
    category: Option<usize>,
    description: Option<usize>,
    vendor: Option<usize>,
    source: Option<usize>,
}

impl CsvColumns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut columns = CsvColumns::default();
        for (idx, name) in headers.iter().enumerate() {
            let slot = match name.to_lowercase().as_str() {
                "date" => &mut columns.date,
                "amount" => &mut columns.amount,
                "category" => &mut columns.category,
                "description" => &mut columns.description,
                "vendor" => &mut columns.vendor,
                "source" => &mut columns.source,
                _ => continue,
            };
            slot.get_or_insert(idx);
        }
        columns
    }

    /// Cells are kept exactly as written; the amount is parsed later
    fn record(&self, row: &csv::StringRecord) -> RawImportRecord {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(str::to_string);

        RawImportRecord {
            date: cell(self.date),
            amount: cell(self.amount).map(RawAmount::Text),
            category: cell(self.category),
            description: cell(self.description),
            vendor: cell(self.vendor),
            source: cell(self.source),
        }
    }
}

/// Read a batch of raw records from a JSON array or a CSV file with a header row
pub fn load_records(file_path: &Path) -> Result<Vec<RawImportRecord>> {
    let format = ImportFormat::detect(file_path)?;

    let file = File::open(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let records: Vec<RawImportRecord> = match format {
        ImportFormat::Json => serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse JSON records in {}", file_path.display()))?,
        ImportFormat::Csv => {
            // Short rows are allowed: missing trailing cells are absent fields
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::Headers)
                .from_reader(file);

            let headers = reader
                .headers()
                .with_context(|| format!("Failed to read CSV header in {}", file_path.display()))?
                .clone();
            let columns = CsvColumns::from_headers(&headers);

            let mut records = Vec::new();
            for (line_num, result) in reader.records().enumerate() {
                let row = result.with_context(|| {
                    format!("Failed to parse CSV line {} in {}", line_num + 2, file_path.display())
                })?;
                records.push(columns.record(&row));
            }
            records
        }
    };

    info!(file = %file_path.display(), count = records.len(), "loaded import records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::io::Write;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 20, 14, 3, 11).unwrap()
    }

    #[test]
    fn test_dues_income_record() {
        let record = RawImportRecord::default()
            .with_date("2023-10-20")
            .with_amount(15000.0)
            .with_category("Dues")
            .with_description("Bulk Dues Import Oct")
            .with_source("Excel Import");

        let result = import_batch(&[record]);
        assert_eq!(result.len(), 1);

        let tx = &result[0];
        assert_eq!(tx.transaction_type, TransactionType::Income);
        assert_eq!(tx.source.as_deref(), Some("Excel Import"));
        assert!(tx.vendor.is_none());
        assert_eq!(tx.category, "Dues");
        assert_eq!(tx.date, "2023-10-20");
        assert_eq!(tx.amount, 15000.0);
    }

    #[test]
    fn test_negative_amount_defaults() {
        let result = import_batch_at(&[RawImportRecord::default().with_amount(-50.0)], fixed_now());
        let tx = &result[0];

        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert_eq!(tx.vendor.as_deref(), Some("Unknown"));
        assert!(tx.source.is_none());
        assert_eq!(tx.category, "Uncategorized");
        assert_eq!(tx.description, "Imported Transaction");
        assert_eq!(tx.amount, 50.0);
        assert_eq!(tx.date, "2023-10-20T14:03:11.000Z");
    }

    #[test]
    fn test_empty_batch() {
        assert!(import_batch(&[]).is_empty());
    }

    #[test]
    fn test_ids_are_distinct() {
        let records = vec![RawImportRecord::default(); 50];
        let result = import_batch(&records);
        let ids: HashSet<&str> = result.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_missing_amount_is_income_with_unknown_source() {
        let tx = &import_batch(&[RawImportRecord::default()])[0];
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.transaction_type, TransactionType::Income);
        assert_eq!(tx.source.as_deref(), Some("Unknown"));
        assert!(tx.vendor.is_none());
    }

    #[test]
    fn test_expense_ignores_source_and_income_ignores_vendor() {
        let records = vec![
            RawImportRecord::default().with_amount(-10.0).with_source("Homeowners"),
            RawImportRecord::default().with_amount(10.0).with_vendor("City Water"),
        ];
        let result = import_batch(&records);

        assert_eq!(result[0].vendor.as_deref(), Some("Unknown"));
        assert!(result[0].source.is_none());
        assert_eq!(result[1].source.as_deref(), Some("Unknown"));
        assert!(result[1].vendor.is_none());
    }

    #[test]
    fn test_preserves_input_order() {
        let records: Vec<RawImportRecord> = (1..=5)
            .map(|i| RawImportRecord::default().with_description(&format!("row {}", i)))
            .collect();
        let descriptions: Vec<String> = import_batch(&records)
            .into_iter()
            .map(|tx| tx.description)
            .collect();
        assert_eq!(descriptions, vec!["row 1", "row 2", "row 3", "row 4", "row 5"]);
    }

    #[test]
    fn test_string_amount_coercion() {
        assert_eq!(RawAmount::Text("-45.99".to_string()).to_number(), Some(-45.99));
        assert_eq!(RawAmount::Text(" 12 ".to_string()).to_number(), Some(12.0));
        assert_eq!(RawAmount::Text("".to_string()).to_number(), Some(0.0));
        assert_eq!(RawAmount::Text("abc".to_string()).to_number(), None);
        assert_eq!(RawAmount::Number(f64::NAN).to_number(), None);
        assert_eq!(RawAmount::Text("-inf".to_string()).parse(), Some(f64::NEG_INFINITY));

        let record = RawImportRecord {
            amount: Some(RawAmount::Text("abc".to_string())),
            ..Default::default()
        };
        let tx = &import_batch(&[record])[0];
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.transaction_type, TransactionType::Income);
    }

    #[test]
    fn test_empty_strings_fall_back_to_defaults() {
        let record = RawImportRecord::default()
            .with_date("")
            .with_amount(-5.0)
            .with_category("")
            .with_description("")
            .with_vendor("");
        let tx = &import_batch_at(&[record], fixed_now())[0];

        assert_eq!(tx.date, "2023-10-20T14:03:11.000Z");
        assert_eq!(tx.category, DEFAULT_CATEGORY);
        assert_eq!(tx.description, DEFAULT_DESCRIPTION);
        assert_eq!(tx.vendor.as_deref(), Some(UNKNOWN_COUNTERPARTY));
    }

    #[test]
    fn test_json_deserialization_is_lenient() {
        let json = r#"[
            {"date": "2023-10-01", "amount": "-120.50", "vendor": "SecureGates Inc"},
            {"amount": null, "category": 42, "description": {"nested": true}},
            {"amount": [1, 2], "source": "Homeowners", "unexpected": "ignored"}
        ]"#;
        let records: Vec<RawImportRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records[0].amount, Some(RawAmount::Text("-120.50".to_string())));
        assert_eq!(records[1].amount, None);
        assert_eq!(records[1].category.as_deref(), Some("42"));
        assert_eq!(records[1].description, None);
        assert_eq!(records[2].amount, None);

        let result = import_batch(&records);
        assert_eq!(result[0].transaction_type, TransactionType::Expense);
        assert_eq!(result[0].amount, 120.5);
        assert_eq!(result[0].vendor.as_deref(), Some("SecureGates Inc"));
        assert_eq!(result[2].source.as_deref(), Some("Homeowners"));
    }

    #[test]
    fn test_load_records_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank_export.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Date,Amount,Category,Description,Vendor").unwrap();
        writeln!(file, "2023-10-05,-450,Landscaping,Weekly Lawn Maintenance,Green Thumb Landscaping").unwrap();
        writeln!(file, "2023-10-01,15000,Dues,Monthly HOA Dues,").unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);

        let result = import_batch(&records);
        assert_eq!(result[0].transaction_type, TransactionType::Expense);
        assert_eq!(result[0].vendor.as_deref(), Some("Green Thumb Landscaping"));
        assert_eq!(result[0].amount, 450.0);
        assert_eq!(result[1].transaction_type, TransactionType::Income);
        assert_eq!(result[1].source.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_csv_text_cells_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numeric_text.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "date,amount,category,description,vendor").unwrap();
        writeln!(file, "2023-10-05,-450,1.50,007,1e3").unwrap();
        writeln!(file, "20231005,18446744073709551617,Repairs,Gate,Acme").unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records[0].amount, Some(RawAmount::Text("-450".to_string())));

        let result = import_batch(&records);
        assert_eq!(result[0].category, "1.50");
        assert_eq!(result[0].description, "007");
        assert_eq!(result[0].vendor.as_deref(), Some("1e3"));
        assert_eq!(result[0].amount, 450.0);
        assert_eq!(result[1].date, "20231005");
    }

    #[test]
    fn test_csv_short_rows_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trimmed_export.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Date,Amount,Category,Description,Vendor").unwrap();
        writeln!(file, "2023-10-05,-450,Landscaping,Weekly Lawn Maintenance,Green Thumb").unwrap();
        writeln!(file, "2023-10-06,-20").unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);

        let tx = &import_batch(&records)[1];
        assert_eq!(tx.date, "2023-10-06");
        assert_eq!(tx.amount, 20.0);
        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert_eq!(tx.category, DEFAULT_CATEGORY);
        assert_eq!(tx.description, DEFAULT_DESCRIPTION);
        assert_eq!(tx.vendor.as_deref(), Some(UNKNOWN_COUNTERPARTY));
    }

    #[test]
    fn test_non_finite_amounts_classified_by_sign() {
        let records = vec![
            RawImportRecord {
                amount: Some(RawAmount::Text("-Infinity".to_string())),
                ..Default::default()
            },
            RawImportRecord {
                amount: Some(RawAmount::Text("inf".to_string())),
                ..Default::default()
            },
            RawImportRecord::default().with_amount(f64::NEG_INFINITY),
        ];
        let result = import_batch(&records);

        assert_eq!(result[0].transaction_type, TransactionType::Expense);
        assert_eq!(result[0].amount, 0.0);
        assert_eq!(result[0].vendor.as_deref(), Some(UNKNOWN_COUNTERPARTY));
        assert_eq!(result[1].transaction_type, TransactionType::Income);
        assert_eq!(result[1].amount, 0.0);
        assert_eq!(result[2].transaction_type, TransactionType::Expense);
    }

    #[test]
    fn test_load_records_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dues.json");
        std::fs::write(
            &path,
            r#"[{"date": "2023-10-20", "amount": 15000, "category": "Dues", "source": "Excel Import"}]"#,
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, Some(RawAmount::Number(15000.0)));
    }

    #[test]
    fn test_load_records_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.pdf");
        std::fs::write(&path, "not a batch").unwrap();

        assert!(load_records(&path).is_err());
    }
}
