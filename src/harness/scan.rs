//! Static declaration scan over candidate source.
//!
//! The entry function is never located by executing the candidate:
//! top-level `def` declarations are collected in order, with a
//! depth-aware parameter count, and the first publicly named one wins.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFunction {
    pub name: String,
    pub param_count: usize,
}

/// All publicly named top-level functions, in declaration order.
/// Names with a leading underscore are treated as private helpers.
pub fn scan_entry_functions(source: &str) -> Vec<EntryFunction> {
    let decl = Regex::new(r"(?m)^(?:async[ \t]+)?def[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(")
        .expect("declaration regex");

    let mut out = Vec::new();
    for caps in decl.captures_iter(source) {
        let name = &caps[1];
        if name.starts_with('_') {
            continue;
        }
        let Some(whole) = caps.get(0) else { continue };
        let open = whole.end() - 1;
        let Some(params) = capture_param_list(source, open) else { continue };
        out.push(EntryFunction {
            name: name.to_string(),
            param_count: count_params(&params),
        });
    }
    out
}

/// Text between the outer parens starting at `open`, spanning lines if
/// needed. None when the list never closes.
fn capture_param_list(source: &str, open: usize) -> Option<String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = None;

    for (i, c) in source[open..].char_indices() {
        let at = open + i;
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => {
                if depth == 0 {
                    start = Some(at + 1);
                }
                depth += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return start.map(|s| source[s..at].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn count_params(params: &str) -> usize {
    split_top_level(params)
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && *p != "*" && *p != "/")
        .count()
}

fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut current = String::new();

    for c in s.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_single_declaration() {
        let found = scan_entry_functions("def two_sum(nums, target):\n    return []\n");
        assert_eq!(
            found,
            vec![EntryFunction {
                name: "two_sum".into(),
                param_count: 2
            }]
        );
    }

    #[test]
    fn declaration_order_is_preserved() {
        let src = "def first(a):\n    pass\n\ndef second(a, b):\n    pass\n";
        let names: Vec<_> = scan_entry_functions(src)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn private_and_nested_declarations_are_skipped() {
        let src = "\
def _helper(x):
    pass

def solve(xs):
    def inner(y):
        return y
    return inner(xs)
";
        let found = scan_entry_functions(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "solve");
        assert_eq!(found[0].param_count, 1);
    }

    #[test]
    fn empty_source_yields_nothing() {
        assert!(scan_entry_functions("x = 1\n").is_empty());
    }

    #[test]
    fn defaults_with_commas_do_not_inflate_arity() {
        let found = scan_entry_functions("def f(a, b=[1, 2], c=(3, 4)):\n    pass\n");
        assert_eq!(found[0].param_count, 3);
    }

    #[test]
    fn signature_spanning_lines_is_counted() {
        let src = "def merge(\n    left,\n    right,\n):\n    pass\n";
        let found = scan_entry_functions(src);
        assert_eq!(found[0].param_count, 2);
    }

    #[test]
    fn star_args_and_markers() {
        let found = scan_entry_functions("def f(a, *, b):\n    pass\n");
        assert_eq!(found[0].param_count, 2);

        let found = scan_entry_functions("def g(*args, **kwargs):\n    pass\n");
        assert_eq!(found[0].param_count, 2);

        let found = scan_entry_functions("async def h():\n    pass\n");
        assert_eq!(found[0].param_count, 0);
    }

    #[test]
    fn string_default_containing_paren_is_handled() {
        let found = scan_entry_functions("def f(a, sep=\"),(\"):\n    pass\n");
        assert_eq!(found[0].param_count, 2);
    }
}
