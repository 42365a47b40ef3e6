use rust_decimal_macros::dec;
use std::io::Write;

use sheet_allocator::sheet::{load_grid_file, parse_rows};
use sheet_allocator::{evaluate, AllocationResult, SetupError};

const SAVED_RANGE: &str = r#"{
  "range": "'Alpaca-Screener'!A1:Q4",
  "majorDimension": "ROWS",
  "values": [
    ["Ticker","Price","% Down","D","E","F","G","H","I","Long MA",
     "K","L","M","N","O","Icon","Sentiment"],
    ["nvda","100","30%","","","","","","","110","","","","","","💎",""],
    ["","1","1","","","","","","","1","","","","","","💎","1"],
    ["AMD","$1,000.00","80","","","","","","","500","","","","","","🚀","2"]
  ]
}"#;

#[test]
fn saved_sheet_rows_evaluate() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAVED_RANGE.as_bytes()).unwrap();

    let grid = load_grid_file(file.path()).unwrap();
    let rows = parse_rows(&grid);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].row_number, 2);
    assert_eq!(rows[1].row_number, 4);

    assert_eq!(
        evaluate(&rows[0].record, 10_000.0),
        AllocationResult::Valid {
            symbol: "NVDA".to_string(),
            notional: dec!(110.00)
        }
    );
    // 10000 * 0.20 * 0.8 * 0.5 * 2
    assert_eq!(
        evaluate(&rows[1].record, 10_000.0),
        AllocationResult::Valid {
            symbol: "AMD".to_string(),
            notional: dec!(1600.00)
        }
    );
}

#[test]
fn missing_file_is_a_setup_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_grid_file(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, SetupError::Io(_)));
}

#[test]
fn malformed_file_is_a_setup_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{not json").unwrap();
    assert!(matches!(load_grid_file(file.path()), Err(SetupError::Json(_))));
}
