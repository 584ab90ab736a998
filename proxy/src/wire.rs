//! Glue between the pipeline's normalized results and the protocol
//! library's writers.

use std::io;
use std::io::{Read, Write};

use msql_srv::{Column, ColumnFlags, ColumnType, ErrorKind, RowWriter};

use pipeline::{wire_tag, BackendColumn, CellValue, PipelineError, WireTag};

/// Build the wire column definition for one backend column.
pub fn column(col: &BackendColumn) -> Column {
    Column {
        table: String::new(),
        column: col.name.clone(),
        coltype: column_type(wire_tag(&col.type_name)),
        colflags: ColumnFlags::empty(),
    }
}

pub fn columns(cols: &[BackendColumn]) -> Vec<Column> {
    cols.iter().map(column).collect()
}

fn column_type(tag: WireTag) -> ColumnType {
    match tag {
        WireTag::Tiny => ColumnType::MYSQL_TYPE_TINY,
        WireTag::Short => ColumnType::MYSQL_TYPE_SHORT,
        WireTag::Int24 => ColumnType::MYSQL_TYPE_INT24,
        WireTag::Long => ColumnType::MYSQL_TYPE_LONG,
        WireTag::LongLong => ColumnType::MYSQL_TYPE_LONGLONG,
        WireTag::Float => ColumnType::MYSQL_TYPE_FLOAT,
        WireTag::Double => ColumnType::MYSQL_TYPE_DOUBLE,
        WireTag::NewDecimal => ColumnType::MYSQL_TYPE_NEWDECIMAL,
        WireTag::Date => ColumnType::MYSQL_TYPE_DATE,
        WireTag::Time => ColumnType::MYSQL_TYPE_TIME,
        WireTag::Datetime => ColumnType::MYSQL_TYPE_DATETIME,
        WireTag::Timestamp => ColumnType::MYSQL_TYPE_TIMESTAMP,
        WireTag::Year => ColumnType::MYSQL_TYPE_YEAR,
        WireTag::Bit => ColumnType::MYSQL_TYPE_BIT,
        WireTag::Enum => ColumnType::MYSQL_TYPE_ENUM,
        WireTag::Set => ColumnType::MYSQL_TYPE_SET,
        WireTag::Json => ColumnType::MYSQL_TYPE_JSON,
        WireTag::Blob => ColumnType::MYSQL_TYPE_BLOB,
        WireTag::TinyBlob => ColumnType::MYSQL_TYPE_TINY_BLOB,
        WireTag::MediumBlob => ColumnType::MYSQL_TYPE_MEDIUM_BLOB,
        WireTag::LongBlob => ColumnType::MYSQL_TYPE_LONG_BLOB,
        WireTag::VarString => ColumnType::MYSQL_TYPE_VAR_STRING,
        WireTag::Null => ColumnType::MYSQL_TYPE_NULL,
    }
}

pub fn write_cell<W: Read + Write>(rw: &mut RowWriter<'_, W>, cell: &CellValue) -> io::Result<()> {
    match cell {
        CellValue::Null => rw.write_col(None::<String>),
        CellValue::Int(i) => rw.write_col(*i),
        CellValue::UInt(u) => rw.write_col(*u),
        CellValue::Double(d) => rw.write_col(*d),
        CellValue::Text(s) => rw.write_col(s.as_str()),
    }
}

/// Wire-level error code for a rejection. The message text carries the
/// real diagnosis; the code only needs to be protocol-plausible.
pub fn error_kind(err: &PipelineError) -> ErrorKind {
    match err {
        PipelineError::Parse { .. } => ErrorKind::ER_PARSE_ERROR,
        PipelineError::SchemaBlocked { .. } => ErrorKind::ER_BAD_DB_ERROR,
        _ => ErrorKind::ER_UNKNOWN_ERROR,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_column_mapping_follows_fixed_table() {
        let col = column(&BackendColumn::new("amount", "DECIMAL"));
        assert_eq!(col.column, "amount");
        assert_eq!(col.coltype, ColumnType::MYSQL_TYPE_NEWDECIMAL);

        assert_eq!(
            column(&BackendColumn::new("x", "TEXT")).coltype,
            ColumnType::MYSQL_TYPE_BLOB
        );
        assert_eq!(
            column(&BackendColumn::new("x", "whatever")).coltype,
            ColumnType::MYSQL_TYPE_VAR_STRING
        );
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            error_kind(&PipelineError::Parse {
                detail: "x".to_string()
            }),
            ErrorKind::ER_PARSE_ERROR
        );
        assert_eq!(
            error_kind(&PipelineError::MissingDateFilter),
            ErrorKind::ER_UNKNOWN_ERROR
        );
    }
}
