//! Schema qualifier normalization

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

static SCHEMA_PREFIX: OnceLock<Regex> = OnceLock::new();

fn schema_prefix() -> &'static Regex {
    SCHEMA_PREFIX.get_or_init(|| {
        Regex::new(r#"(?i)^(?P<indent>\s*)INSERT\s+INTO\s+(?:"[^".]+"|[^".\s(]+)\."#)
            .expect("schema prefix pattern is valid")
    })
}

/// Rewrite the schema of a raw INSERT line to `target_schema`.
///
/// Only the leading `INSERT INTO <schema>.` is touched; table name, columns
/// and values are left alone even when they contain the schema word. Lines
/// without a schema qualifier are returned as they are.
pub fn normalize_schema<'a>(line: &'a str, target_schema: &str) -> Cow<'a, str> {
    let re = schema_prefix();
    let Some(caps) = re.captures(line) else {
        return Cow::Borrowed(line);
    };

    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let mut normalized = String::with_capacity(line.len() + target_schema.len());
    normalized.push_str(&caps["indent"]);
    normalized.push_str("INSERT INTO ");
    normalized.push_str(target_schema);
    normalized.push('.');
    normalized.push_str(&line[whole.end..]);
    Cow::Owned(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_any_schema() {
        assert_eq!(
            normalize_schema("INSERT INTO other_schema.transaction (a) VALUES (1)", "public"),
            "INSERT INTO public.transaction (a) VALUES (1)"
        );
    }

    #[test]
    fn test_keyword_spacing_and_case() {
        assert_eq!(
            normalize_schema("  insert   into tenantA.accrual (a) VALUES (1)", "public"),
            "  INSERT INTO public.accrual (a) VALUES (1)"
        );
    }

    #[test]
    fn test_quoted_schema() {
        assert_eq!(
            normalize_schema("INSERT INTO \"Tenant A\".\"accrual\" (a) VALUES (1)", "public"),
            "INSERT INTO public.\"accrual\" (a) VALUES (1)"
        );
    }

    #[test]
    fn test_unqualified_table_unchanged() {
        let line = "INSERT INTO transaction (amount) VALUES (1.5)";
        assert!(matches!(normalize_schema(line, "public"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_schema_word_elsewhere_untouched() {
        assert_eq!(
            normalize_schema("INSERT INTO legacy.legacy (legacy) VALUES ('legacy.x')", "public"),
            "INSERT INTO public.legacy (legacy) VALUES ('legacy.x')"
        );
    }

    #[test]
    fn test_target_schema_is_idempotent() {
        let once = normalize_schema("INSERT INTO a.t (x) VALUES (1)", "public").into_owned();
        let twice = normalize_schema(&once, "public").into_owned();
        assert_eq!(once, twice);
    }
}
