//! Coerces backend values into wire-protocol-compatible shapes and keeps
//! result sets rectangular.

use tracing::warn;

use crate::executor::BackendColumn;

/// One result cell after normalization. Temporal values travel as
/// formatted text; decimals as doubles (clients expect DOUBLE, the
/// precision loss is accepted).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
}

impl CellValue {
    /// Decode raw bytes; undecodable sequences become U+FFFD.
    pub fn from_bytes(bytes: &[u8]) -> CellValue {
        CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// The MySQL wire type tags the proxy emits, per the fixed mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireTag {
    Tiny,
    Short,
    Int24,
    Long,
    LongLong,
    Float,
    Double,
    NewDecimal,
    Date,
    Time,
    Datetime,
    Timestamp,
    Year,
    Bit,
    Enum,
    Set,
    Json,
    Blob,
    TinyBlob,
    MediumBlob,
    LongBlob,
    VarString,
    Null,
}

/// Backend type name → wire tag. Unknown names map to VAR_STRING.
pub fn wire_tag(type_name: &str) -> WireTag {
    match type_name.to_ascii_uppercase().as_str() {
        "CHAR" | "VARCHAR" => WireTag::VarString,
        "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => WireTag::Blob,
        "TINYINT" => WireTag::Tiny,
        "SMALLINT" => WireTag::Short,
        "MEDIUMINT" => WireTag::Int24,
        "INT" | "INTEGER" => WireTag::Long,
        "BIGINT" => WireTag::LongLong,
        "FLOAT" => WireTag::Float,
        "DOUBLE" | "REAL" => WireTag::Double,
        "DECIMAL" | "NUMERIC" => WireTag::NewDecimal,
        "DATE" => WireTag::Date,
        "TIME" => WireTag::Time,
        "DATETIME" => WireTag::Datetime,
        "TIMESTAMP" => WireTag::Timestamp,
        "YEAR" => WireTag::Year,
        "BIT" => WireTag::Bit,
        "ENUM" => WireTag::Enum,
        "SET" => WireTag::Set,
        "JSON" => WireTag::Json,
        "BLOB" => WireTag::Blob,
        "TINYBLOB" => WireTag::TinyBlob,
        "MEDIUMBLOB" => WireTag::MediumBlob,
        "LONGBLOB" => WireTag::LongBlob,
        "NULL" => WireTag::Null,
        _ => WireTag::VarString,
    }
}

/// Apply the per-value coercion rules for one column type.
pub fn normalize_value(type_name: &str, value: CellValue) -> CellValue {
    match value {
        CellValue::Null => CellValue::Null,
        other => match wire_tag(type_name) {
            // Arbitrary-precision decimals become IEEE doubles.
            WireTag::NewDecimal | WireTag::Double | WireTag::Float => match other {
                CellValue::Text(s) => match s.parse::<f64>() {
                    Ok(f) => CellValue::Double(f),
                    Err(_) => CellValue::Text(s),
                },
                CellValue::Int(i) => CellValue::Double(i as f64),
                CellValue::UInt(u) => CellValue::Double(u as f64),
                v => v,
            },
            WireTag::Tiny | WireTag::Short | WireTag::Int24 | WireTag::Long
            | WireTag::LongLong | WireTag::Year => match other {
                CellValue::Text(s) => match s.parse::<i64>() {
                    Ok(i) => CellValue::Int(i),
                    Err(_) => CellValue::Text(s),
                },
                v => v,
            },
            // Temporal values already travel as their formatted text.
            _ => other,
        },
    }
}

pub fn normalize_rows(columns: &[BackendColumn], rows: Vec<Vec<CellValue>>) -> Vec<Vec<CellValue>> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(idx, value)| match columns.get(idx) {
                    Some(col) => normalize_value(&col.type_name, value),
                    None => value,
                })
                .collect()
        })
        .collect()
}

/// Make the result rectangular: synthesize `column_N` names when rows are
/// wider than the column list, pad short rows with NULLs. Returns whether
/// a repair happened so the caller can log it.
pub fn repair_shape(columns: &mut Vec<BackendColumn>, rows: &mut [Vec<CellValue>]) -> bool {
    let widest = rows.iter().map(|r| r.len()).max().unwrap_or(columns.len());
    let mut repaired = false;

    if widest > columns.len() {
        for n in columns.len()..widest {
            columns.push(BackendColumn::new(format!("column_{}", n + 1), "VARCHAR"));
        }
        repaired = true;
    }

    for row in rows.iter_mut() {
        if row.len() < columns.len() {
            row.resize(columns.len(), CellValue::Null);
            repaired = true;
        }
    }

    if repaired {
        warn!(
            columns = columns.len(),
            "result shape mismatch repaired with synthesized columns"
        );
    }
    repaired
}
