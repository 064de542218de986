// src/ingest/mod.rs - Typed datasets and one-shot column resolution
//
// Rows arrive as JSON arrays of flat objects. Column resolution runs once
// per dataset against a trilingual list of common header spellings; the
// rows themselves are then read positionally. No per-row header probing.
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::models::core::ProductRecord;

/// Header spellings tried in order for each role, covering Arabic and
/// English variants seen in merchant exports.
pub const PRODUCT_HEADERS: [&str; 7] = ["المنتج", "اسم المنتج", "Product", "Name", "name", "product", "product_name"];
pub const PRICE_HEADERS: [&str; 4] = ["السعر", "سعر", "Price", "price"];
pub const ID_HEADERS: [&str; 12] = [
    "ID", "id", "معرف", "رقم المنتج", "product_id", "SKU", "sku", "barcode", "باركود", "الكود", "code", "الرقم",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Resolved once per dataset; rows are read through these indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    pub name: usize,
    pub price: Option<usize>,
    pub external_id: Option<usize>,
    /// True when no product header variant matched and the first column
    /// was used as a last resort.
    pub name_fallback_used: bool,
}

impl Dataset {
    /// Build a dataset from a parsed JSON array of flat objects. Headers
    /// are the union of keys in their natural (sorted) order; values
    /// missing from a row become empty strings.
    pub fn from_json_rows(source: &str, value: Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("dataset '{}' is not a JSON array of rows", source))?;

        let mut header_set: BTreeSet<String> = BTreeSet::new();
        for row in array {
            if let Some(object) = row.as_object() {
                for key in object.keys() {
                    header_set.insert(key.trim().to_string());
                }
            }
        }
        let headers: Vec<String> = header_set.into_iter().collect();

        let mut rows = Vec::with_capacity(array.len());
        for row in array {
            let object = match row.as_object() {
                Some(o) => o,
                None => continue,
            };
            let mut cells = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = object
                    .iter()
                    .find(|(k, _)| k.trim() == header)
                    .map(|(_, v)| value_to_cell(v))
                    .unwrap_or_default();
                cells.push(cell);
            }
            // Fully empty rows carry no information.
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            rows.push(cells);
        }

        Ok(Self {
            source: source.to_string(),
            headers,
            rows,
        })
    }

    /// Materialize typed records through a resolved column map.
    pub fn records(&self, columns: &ColumnMap) -> Vec<ProductRecord> {
        self.rows
            .iter()
            .map(|row| {
                let name = row.get(columns.name).cloned().unwrap_or_default();
                let price = columns
                    .price
                    .and_then(|i| row.get(i))
                    .map(|raw| safe_price(raw))
                    .unwrap_or(0.0);
                let external_id = columns
                    .external_id
                    .and_then(|i| row.get(i))
                    .cloned()
                    .unwrap_or_default();
                ProductRecord::new(name, price, external_id, self.source.clone())
            })
            .collect()
    }
}

/// Resolve the name/price/id columns for one dataset. An explicit name
/// column wins; otherwise the first matching header variant; otherwise the
/// first column, as documented degraded behavior. Never a hard error.
pub fn resolve_columns(dataset: &Dataset, explicit_name: Option<&str>) -> ColumnMap {
    let find = |wanted: &str| {
        dataset
            .headers
            .iter()
            .position(|h| h.trim() == wanted || h.trim().eq_ignore_ascii_case(wanted))
    };

    let mut name_fallback_used = false;
    let name = explicit_name
        .and_then(find)
        .or_else(|| PRODUCT_HEADERS.iter().find_map(|h| find(h)))
        .unwrap_or_else(|| {
            name_fallback_used = true;
            0
        });
    if name_fallback_used {
        warn!(
            "No product column found in '{}'; falling back to first column '{}'",
            dataset.source,
            dataset.headers.first().map(String::as_str).unwrap_or("")
        );
    }

    let price = PRICE_HEADERS.iter().find_map(|h| find(h));
    let external_id = ID_HEADERS.iter().find_map(|h| find(h));

    ColumnMap {
        name,
        price,
        external_id,
        name_fallback_used,
    }
}

/// Tolerant price parse: thousands separators stripped, anything
/// unparseable is 0 (unknown), never an error.
pub fn safe_price(raw: &str) -> f64 {
    let cleaned = raw.trim().replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}

/// Read one dataset file. Errors here are per-file: the caller reports
/// them and keeps processing the remaining inputs.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if extension != "json" {
        return Err(anyhow!(
            "unsupported file extension '.{}' for {} (expected .json)",
            extension,
            path.display()
        ));
    }

    let source = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string();
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {} as JSON", path.display()))?;
    let dataset = Dataset::from_json_rows(&source, value)?;
    info!(
        "📂 Loaded '{}': {} rows, {} columns",
        dataset.source,
        dataset.rows.len(),
        dataset.headers.len()
    );
    Ok(dataset)
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_arabic_headers() {
        let dataset = Dataset::from_json_rows(
            "ours",
            json!([{"المنتج": "ديور سوفاج", "السعر": "450", "باركود": "123"}]),
        )
        .unwrap();
        let columns = resolve_columns(&dataset, None);
        assert!(!columns.name_fallback_used);
        let records = dataset.records(&columns);
        assert_eq!(records[0].name, "ديور سوفاج");
        assert_eq!(records[0].price, 450.0);
        assert_eq!(records[0].external_id, "123");
    }

    #[test]
    fn explicit_name_column_wins() {
        let dataset = Dataset::from_json_rows(
            "ours",
            json!([{"title": "Dior Sauvage", "Name": "wrong"}]),
        )
        .unwrap();
        let columns = resolve_columns(&dataset, Some("title"));
        let records = dataset.records(&columns);
        assert_eq!(records[0].name, "Dior Sauvage");
    }

    #[test]
    fn falls_back_to_first_column_without_erroring() {
        let dataset = Dataset::from_json_rows(
            "comp",
            json!([{"item_label": "Creed Aventus", "cost": "980"}]),
        )
        .unwrap();
        let columns = resolve_columns(&dataset, None);
        assert!(columns.name_fallback_used);
        let records = dataset.records(&columns);
        // BTreeSet order: "cost" < "item_label", so the first column is cost.
        assert_eq!(records[0].name, "980");
    }

    #[test]
    fn unparseable_price_becomes_unknown() {
        assert_eq!(safe_price("1,250.50"), 1250.50);
        assert_eq!(safe_price("٤٥٠"), 0.0);
        assert_eq!(safe_price("n/a"), 0.0);
        assert_eq!(safe_price("-10"), 0.0);
        assert_eq!(safe_price(""), 0.0);
    }

    #[test]
    fn numeric_json_prices_survive() {
        let dataset = Dataset::from_json_rows("ours", json!([{"Name": "X", "Price": 99.5}])).unwrap();
        let columns = resolve_columns(&dataset, None);
        assert_eq!(dataset.records(&columns)[0].price, 99.5);
    }

    #[test]
    fn blank_rows_are_dropped() {
        let dataset = Dataset::from_json_rows(
            "ours",
            json!([{"Name": "X"}, {"Name": ""}, {"Name": "Y"}]),
        )
        .unwrap();
        assert_eq!(dataset.rows.len(), 2);
    }

    #[test]
    fn non_array_input_is_a_per_file_error() {
        assert!(Dataset::from_json_rows("ours", json!({"Name": "X"})).is_err());
    }
}
