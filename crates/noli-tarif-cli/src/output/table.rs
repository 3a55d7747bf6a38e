use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Columns shown first when present, in this order.
const LEADING_COLUMNS: [&str; 6] = [
    "coverage_id",
    "display_order",
    "name",
    "calculation_type",
    "tariff_rule_id",
    "premium_amount",
];

/// Format output as tables: scalar fields as a Field/Value table, each list
/// of records (priced lines, failures, issues...) as its own table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => print_envelope(result, map),
            None => print_object(map),
        },
        Value::Array(arr) => print_records(arr),
        _ => println!("{}", value),
    }
}

fn print_envelope(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_object(res_map),
        Value::Array(arr) => print_records(arr),
        other => println!("{}", format_value(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut sections = Vec::new();
    let mut scalars = 0;
    for (key, val) in map {
        match val {
            Value::Array(items) if items.iter().any(Value::is_object) => {
                sections.push((key.as_str(), items))
            }
            _ => {
                builder.push_record([key.as_str(), &format_value(val)]);
                scalars += 1;
            }
        }
    }
    if scalars > 0 {
        println!("{}", Table::from(builder));
    }

    for (title, items) in sections {
        println!("\n{}:", title);
        print_records(items);
    }
}

fn print_records(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            println!("{}", format_value(item));
        }
        return;
    };

    let headers = column_order(first);
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}

/// Identifying columns first, nested objects last.
fn column_order(first: &Map<String, Value>) -> Vec<String> {
    let mut headers: Vec<String> = LEADING_COLUMNS
        .iter()
        .filter(|c| first.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    let (flat, nested): (Vec<&String>, Vec<&String>) = first
        .keys()
        .filter(|k| !LEADING_COLUMNS.contains(&k.as_str()))
        .partition(|k| !first[k.as_str()].is_object());
    headers.extend(flat.into_iter().cloned());
    headers.extend(nested.into_iter().cloned());
    headers
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
