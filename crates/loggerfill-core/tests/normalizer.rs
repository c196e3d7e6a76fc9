use chrono::{Duration, NaiveDateTime};
use loggerfill_core::normalizer::{
    normalize, reindex, replace_sentinel, NormalizeError, NormalizeOptions,
};
use loggerfill_core::time_axis::{build_time_axis, TimeAxis};
use loggerfill_parser::{parse_logger_file, ParseOptions, ParserError};
use polars::df;
use polars::prelude::*;

fn fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../loggerfill-parser/tests/data")
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

fn parse_naive(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").expect("parse timestamp")
}

fn hourly_axis(start: &str, end: &str) -> TimeAxis {
    build_time_axis(parse_naive(start), parse_naive(end), Duration::hours(1)).expect("axis")
}

const TWO_READINGS: &str = "D3Y-12Feb2018-0914.xls\n\
2 records\n\
Measurement Time,Port 1\n\
2017-12-14 17:00:00,5\n\
2017-12-14 19:00:00,***\n";

#[test]
fn gap_fills_and_relabels_small_export() {
    let axis = hourly_axis("2017-12-14 17:00:00", "2017-12-14 20:00:00");
    let table = normalize(TWO_READINGS, &axis, &NormalizeOptions::default()).expect("normalize");

    assert_eq!(table.device_id.as_str(), "D3Y");
    assert_eq!(
        table.header_rows(),
        &[
            vec!["D3Y".to_string(), String::new()],
            vec!["4 records".to_string(), String::new()],
            vec!["Measurement Time".to_string(), "Port 1".to_string()],
        ]
    );
    assert_eq!(
        table.body_rows(),
        &[
            vec!["2017-12-14 17:00:00".to_string(), "5".to_string()],
            vec!["2017-12-14 18:00:00".to_string(), String::new()],
            vec!["2017-12-14 19:00:00".to_string(), String::new()],
            vec!["2017-12-14 20:00:00".to_string(), String::new()],
        ]
    );
}

#[test]
fn padded_cells_pass_through_unchanged() {
    let content = "ABC-1.xls\n\
1 records\n\
Measurement Time,Port 1,Port 2\n\
2017-12-14 17:00:00, 5 , *** \n";
    let axis = hourly_axis("2017-12-14 17:00:00", "2017-12-14 17:00:00");
    let table = normalize(content, &axis, &NormalizeOptions::default()).expect("normalize");

    assert_eq!(
        table.body_rows(),
        &[vec![
            "2017-12-14 17:00:00".to_string(),
            " 5 ".to_string(),
            " *** ".to_string(),
        ]]
    );
}

#[test]
fn em50_export_is_trimmed_to_window_and_first_duplicate_wins() {
    let axis = hourly_axis("2017-12-14 17:00:00", "2017-12-14 21:00:00");
    let table = normalize(
        &fixture("D3Y-12Feb2018-0914.csv"),
        &axis,
        &NormalizeOptions::default(),
    )
    .expect("normalize");

    let header = table.header_rows();
    assert_eq!(
        header[0],
        vec!["D3Y", "Port 1", "Port 1", "Port 2", "Port 2", "Port 3"]
    );
    assert_eq!(header[1][0], "5 records");
    assert_eq!(header[1][5], "ECRN-100 Precipitation");
    assert_eq!(
        header[2],
        vec![
            "Measurement Time",
            "m³/m³ VWC",
            "°C Temp",
            "m³/m³ VWC",
            "°C Temp",
            "mm Precipitation",
        ]
    );

    let body = table.body_rows();
    assert_eq!(body.len(), 5);
    assert_eq!(
        body[0],
        vec!["2017-12-14 17:00:00", "0.300", "10.9", "0.287", "10.8", "0.000"]
    );
    assert_eq!(
        body[1],
        vec!["2017-12-14 18:00:00", "0.299", "10.4", "", "", "0.000"]
    );
    assert_eq!(body[2], vec!["2017-12-14 19:00:00", "", "", "", "", ""]);
    assert_eq!(
        body[3],
        vec!["2017-12-14 20:00:00", "0.299", "9.8", "0.286", "9.7", "0.200"]
    );
    assert_eq!(body[4], vec!["2017-12-14 21:00:00", "", "", "", "", ""]);
    assert_eq!(table.duplicate_lines, vec![8]);
}

#[test]
fn record_count_follows_axis_not_input() {
    let axis = hourly_axis("2017-12-14 00:00:00", "2017-12-15 23:00:00");
    let table = normalize(&fixture("ABC-1.csv"), &axis, &NormalizeOptions::default())
        .expect("normalize");

    assert_eq!(table.header_rows()[1][0], "48 records");
    assert_eq!(table.body_rows().len(), 48);
}

#[test]
fn honours_missing_marker_unit_and_timestamp_format() {
    let axis = hourly_axis("2017-12-14 17:00:00", "2017-12-14 18:00:00");
    let options = NormalizeOptions {
        missing_marker: "NaN".to_string(),
        record_unit: "observations".to_string(),
        output_timestamp_format: "%m/%d/%Y %H:%M".to_string(),
        ..NormalizeOptions::default()
    };
    let table = normalize(TWO_READINGS, &axis, &options).expect("normalize");

    assert_eq!(table.header_rows()[1][0], "2 observations");
    assert_eq!(table.body_rows()[0], vec!["12/14/2017 17:00", "5"]);
    assert_eq!(table.body_rows()[1], vec!["12/14/2017 18:00", "NaN"]);
}

#[test]
fn reindex_keeps_one_row_per_axis_timestamp() {
    let axis = hourly_axis("2017-12-14 17:00:00", "2017-12-14 20:00:00");
    let parsed = parse_logger_file(TWO_READINGS, &ParseOptions::default()).expect("parse");

    let joined = reindex(&parsed.body, &parsed.timestamp_column, &axis).expect("reindex");
    assert_eq!(joined.height(), axis.len());

    let keys = joined
        .column("Measurement Time")
        .expect("key column")
        .datetime()
        .expect("datetime");
    for (idx, ts) in axis.iter().enumerate() {
        assert_eq!(keys.get(idx), Some(ts.and_utc().timestamp_micros()));
    }

    let values = joined.column("Port 1").expect("channel").str().expect("str");
    assert_eq!(values.get(0), Some("5"));
    assert_eq!(values.get(1), None);
    assert_eq!(values.get(2), Some("***"));
    assert_eq!(values.get(3), None);
}

#[test]
fn sentinel_replacement_is_exact() {
    let df = df![
        "a" => [Some("***"), Some("1.5"), None],
        "b" => [Some("****"), Some("***"), Some("-")],
    ]
    .expect("df");

    let cleaned = replace_sentinel(df, &["a", "b"], "***").expect("replace");

    let a = cleaned.column("a").expect("a").str().expect("str");
    let b = cleaned.column("b").expect("b").str().expect("str");
    assert_eq!(a.get(0), None);
    assert_eq!(a.get(1), Some("1.5"));
    assert_eq!(a.get(2), None);
    assert_eq!(b.get(0), Some("****"));
    assert_eq!(b.get(1), None);
    assert_eq!(b.get(2), Some("-"));
}

#[test]
fn malformed_header_surfaces_as_parser_error() {
    let axis = hourly_axis("2017-12-14 17:00:00", "2017-12-14 20:00:00");
    let err = normalize(&fixture("malformed-label.csv"), &axis, &NormalizeOptions::default())
        .expect_err("should fail");
    assert!(matches!(
        err,
        NormalizeError::Parser(ParserError::MalformedHeader { .. })
    ));
}
