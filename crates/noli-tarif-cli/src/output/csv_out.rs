use serde_json::{Map, Value};
use std::io;

/// Record lists exported in preference to the scalar summary.
const RECORD_FIELDS: [&str; 5] = ["lines", "rows", "changes", "candidates", "issues"];

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let body = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match body {
        Value::Object(map) => match records_of(map) {
            Some(records) => write_records(&mut wtr, records),
            None => {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
        },
        Value::Array(arr) => write_records(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(body)]);
        }
    }

    let _ = wtr.flush();
}

fn records_of(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    RECORD_FIELDS
        .iter()
        .find_map(|field| map.get(*field).and_then(Value::as_array))
}

fn write_records<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for item in arr.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| item.get(*h).map(format_csv_value).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&row);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priced_lines_become_rows() {
        let result = json!({
            "total_premium": "86150",
            "lines": [
                {"coverage_id": "RC", "premium_amount": "78200"},
                {"coverage_id": "DEFENSE_RECOURS", "premium_amount": "7950"}
            ]
        });
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_records(&mut wtr, records_of(result.as_object().unwrap()).unwrap());
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "coverage_id,premium_amount\nRC,78200\nDEFENSE_RECOURS,7950\n"
        );
    }
}
