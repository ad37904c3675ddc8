//! Inspection reports for `py_inspect`

use std::collections::BTreeSet;

use crate::executor::{Awaitable, Val};

/// Longest header, in characters, before it is cut with "..."
pub const HEADER_LIMIT: usize = 485;

/// `=== repr ===`, a blank line, then one `name :: value` line per fact
pub fn report(value: &Val) -> String {
    let mut lines = vec![format!("=== {} ===", header(value)), String::new()];
    for (name, fact) in inspections(value) {
        lines.push(format!("{:16.16} :: {}", name, fact));
    }
    lines.join("\n")
}

fn header(value: &Val) -> String {
    // Keep a repr containing `` from closing the code block it is shown in
    let repr = value.repr().replace("``", "`\u{200b}`");
    if repr.chars().count() > HEADER_LIMIT {
        let cut: String = repr.chars().take(HEADER_LIMIT - 3).collect();
        format!("{}...", cut)
    } else {
        repr
    }
}

/// Facts about a value, most general first
pub fn inspections(value: &Val) -> Vec<(&'static str, String)> {
    let mut facts = vec![
        ("type", value.type_name().to_string()),
        ("truthy", value.is_truthy().to_string()),
    ];

    match value {
        Val::Num(n) => {
            facts.push(("integer", (n.fract() == 0.0 && n.is_finite()).to_string()));
        }
        Val::Str(s) => {
            facts.push(("length", s.chars().count().to_string()));
            facts.push(("lines", s.lines().count().to_string()));
        }
        Val::List(items) => {
            facts.push(("length", items.len().to_string()));
            let kinds: BTreeSet<&str> = items.iter().map(Val::type_name).collect();
            if !kinds.is_empty() {
                facts.push(("item types", kinds.into_iter().collect::<Vec<_>>().join(", ")));
            }
        }
        Val::Obj(map) => {
            facts.push(("length", map.len().to_string()));
            if !map.is_empty() {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                facts.push(("keys", keys.join(", ")));
            }
        }
        Val::NativeFunc(func) => facts.push(("function", func.name().to_string())),
        Val::Awaitable(Awaitable::Sleep { ms }) => {
            facts.push(("awaitable", "sleep".to_string()));
            facts.push(("duration (ms)", ms.to_string()));
        }
        Val::Awaitable(Awaitable::Host { name, args }) => {
            facts.push(("awaitable", format!("host {}", name)));
            facts.push(("arguments", args.len().to_string()));
        }
        Val::Error(info) => {
            facts.push(("code", info.code.clone()));
            facts.push(("message", info.message.clone()));
        }
        Val::Null | Val::Bool(_) => {}
    }

    facts
}
