//! Canonical JSON: claves ordenadas y sin espacios, para que valores
//! iguales produzcan siempre el mismo texto (y el mismo hash).

use serde_json::Value;

pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(key));
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push('}');
        }
        Value::String(s) => out.push_str(&quote(s)),
        // null, bool y números ya tienen una única forma compacta.
        scalar => out.push_str(&scalar.to_string()),
    }
}

// Serializar un &str a JSON no puede fallar.
fn quote(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}
