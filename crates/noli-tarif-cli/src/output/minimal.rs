use serde_json::Value;

/// Fields answering "how much" or "which rule", most telling first.
const ANSWER_KEYS: [&str; 5] = [
    "total_premium",
    "premium_amount",
    "amount",
    "selected_rule",
    "issue_count",
];

/// Print just the answer: a premium, a total, a rule id. Lists print one
/// `id value` pair per line.
pub fn print_minimal(value: &Value) {
    let body = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match body {
        Value::Array(items) => {
            for item in items {
                println!("{}", minimal_line(item));
            }
        }
        other => println!("{}", answer_of(other).unwrap_or_else(|| format_minimal(other))),
    }
}

fn minimal_line(item: &Value) -> String {
    let id = item
        .get("coverage_id")
        .or_else(|| item.get("id"))
        .or_else(|| item.get("subject"))
        .map(format_minimal);
    let answer = answer_of(item)
        .or_else(|| item.get("estimated_min").map(format_minimal))
        .or_else(|| item.get("message").map(format_minimal));
    match (id, answer) {
        (Some(id), Some(answer)) => format!("{id} {answer}"),
        (Some(id), None) => id,
        (None, Some(answer)) => answer,
        (None, None) => format_minimal(item),
    }
}

/// First non-null answer field, looking one level into nested objects
/// (`computation.amount`).
fn answer_of(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    ANSWER_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null() && !v.is_object()))
        .or_else(|| {
            map.values()
                .filter(|v| v.is_object())
                .find_map(|nested| {
                    let nested = nested.as_object()?;
                    ANSWER_KEYS
                        .iter()
                        .find_map(|key| nested.get(*key).filter(|v| !v.is_null()))
                })
        })
        .map(format_minimal)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
