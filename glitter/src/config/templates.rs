//! Interpolation of `$name` / `${name}` variables into template strings.

use crate::position::FilePos;

/// Expands `$name` and `${name}` forms in a template.
///
/// `lookup` returns the replacement for a recognised variable; for an
/// unrecognised one it returns `None` and the original text is kept
/// verbatim, `$` and braces included, so a template may intentionally emit
/// a literal `$foo`.
pub fn expand<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, '{')) => {
                chars.next();
                let name_start = i + 2;
                let mut name_end = name_start;
                let mut closed = false;
                for (j, d) in chars.by_ref() {
                    if d == '}' {
                        name_end = j;
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    // unterminated ${...}: keep the rest verbatim
                    out.push_str(&template[i..]);
                    break;
                }
                let name = &template[name_start..name_end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&template[i..name_end + 1]),
                }
            }
            Some(&(_, d)) if d.is_ascii_alphanumeric() || d == '_' => {
                let name_start = i + 1;
                let mut name_end = template.len();
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        chars.next();
                    } else {
                        name_end = j;
                        break;
                    }
                }
                let name = &template[name_start..name_end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&template[i..name_end]),
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// Fills the positional `$1` placeholder by literal first-occurrence
/// substring replacement, as used by the `StartCode`, `CodeRef` and
/// `InlineCode` templates.
pub fn expand_arg(template: &str, arg: &str) -> String {
    template.replacen("$1", arg, 1)
}

/// Expands a line-pragma template with `$lineno` and `$filename`.
pub fn line_pragma(template: &str, pos: &FilePos) -> String {
    expand(template, |name| match name {
        "lineno" => Some(pos.lineno.to_string()),
        "filename" => Some(pos.filename.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> Option<String> {
        match name {
            "blockid" => Some("7".to_string()),
            "name" => Some("scan loop".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_simple_variable() {
        assert_eq!(expand("id=$blockid.", vars), "id=7.");
    }

    #[test]
    fn test_braced_variable() {
        assert_eq!(expand("id=${blockid}8", vars), "id=78");
    }

    #[test]
    fn test_unknown_kept_verbatim() {
        assert_eq!(expand("$foo and ${bar}", vars), "$foo and ${bar}");
    }

    #[test]
    fn test_bare_dollar() {
        assert_eq!(expand("cost: 5$", vars), "cost: 5$");
        assert_eq!(expand("a $ b", vars), "a $ b");
    }

    #[test]
    fn test_unterminated_brace() {
        assert_eq!(expand("x${blockid", vars), "x${blockid");
    }

    #[test]
    fn test_adjacent_variables() {
        assert_eq!(expand("$blockid$name", vars), "7scan loop");
    }

    #[test]
    fn test_expand_arg_first_occurrence_only() {
        assert_eq!(expand_arg(r"\ref{$1}[$1]", "main"), r"\ref{main}[$1]");
    }

    #[test]
    fn test_line_pragma() {
        let pos = FilePos::new("main.gw", 12);
        assert_eq!(
            line_pragma("/*line $filename:$lineno*/", &pos),
            "/*line main.gw:12*/"
        );
        assert_eq!(
            line_pragma("%%line $lineno \"$filename\"\n", &pos),
            "%%line 12 \"main.gw\"\n"
        );
    }
}
