//! Structured view over a rendered accessibility snapshot.
//!
//! A snapshot is parsed once per cycle into a flat list of elements
//! `(depth, role, name, ref, flags)`. Two renderings are understood:
//!
//! ```text
//! - button "Sign up for free" [ref=e5] [focused]
//! uid=1_5 button "Sign up for free" focusable focused
//! ```

use std::fmt;

/// Locator for a live element, valid only for the snapshot it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef<'s>(&'s str);

impl<'s> ElementRef<'s> {
    pub fn as_str(&self) -> &'s str {
        self.0
    }
}

impl fmt::Display for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'s> {
    pub depth: usize,
    pub role: &'s str,
    pub name: &'s str,
    pub value: &'s str,
    ref_id: Option<&'s str>,
    flags: Vec<&'s str>,
}

impl<'s> Element<'s> {
    pub fn element_ref(&self) -> Option<ElementRef<'s>> {
        self.ref_id.map(ElementRef)
    }

    /// Bare (`focused`), bracketed (`[focused]`) and keyed (`readonly=true`)
    /// flag spellings all count.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| {
            f.eq_ignore_ascii_case(flag)
                || f.split_once('=').is_some_and(|(key, value)| {
                    key.eq_ignore_ascii_case(flag) && !value.trim_matches('"').eq_ignore_ascii_case("false")
                })
        })
    }

    pub fn is_readonly(&self) -> bool {
        self.has_flag("readonly")
    }

    pub fn is_role(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }

    pub fn is_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.is_role(r))
    }
}

/// Parsed snapshot. Borrows the raw text; dropped with it at the end of a cycle.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView<'s> {
    elements: Vec<Element<'s>>,
}

impl<'s> SnapshotView<'s> {
    pub fn parse(raw: &'s str) -> Self {
        Self {
            elements: raw.lines().filter_map(parse_line).collect(),
        }
    }

    pub fn elements(&self) -> &[Element<'s>] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Any element whose accessible name or value contains `text`.
    /// Typographic apostrophes match ASCII ones.
    pub fn contains_text(&self, text: &str) -> bool {
        self.elements
            .iter()
            .any(|e| text_contains(e.name, text) || text_contains(e.value, text))
    }

    /// An element with one of `roles` whose name equals `name` exactly.
    pub fn has(&self, roles: &[&str], name: &str) -> bool {
        self.elements.iter().any(|e| e.is_any_role(roles) && e.name == name)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.elements.iter().any(|e| e.is_role(role))
    }

    /// First element in document order matching `pred` that carries a ref.
    pub fn find_ref<P>(&self, pred: P) -> Option<ElementRef<'s>>
    where
        P: Fn(&Element<'s>) -> bool,
    {
        self.elements
            .iter()
            .filter(|e| pred(*e))
            .find_map(|e| e.element_ref())
    }

    /// First element with one of `roles` whose name equals one of `names`,
    /// ignoring case.
    pub fn find_named(&self, roles: &[&str], names: &[&str]) -> Option<ElementRef<'s>> {
        self.find_ref(|e| e.is_any_role(roles) && names.iter().any(|n| names_equal(e.name, n)))
    }
}

fn normalize_apostrophes(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains('\u{2019}') {
        std::borrow::Cow::Owned(s.replace('\u{2019}', "'"))
    } else {
        std::borrow::Cow::Borrowed(s)
    }
}

pub(crate) fn text_contains(haystack: &str, needle: &str) -> bool {
    normalize_apostrophes(haystack).contains(normalize_apostrophes(needle).as_ref())
}

pub(crate) fn names_equal(a: &str, b: &str) -> bool {
    normalize_apostrophes(a.trim()).eq_ignore_ascii_case(&normalize_apostrophes(b.trim()))
}

fn parse_line(line: &str) -> Option<Element<'_>> {
    let trimmed = line.trim_start();
    let depth = (line.len() - trimmed.len()) / 2;
    let mut rest = trimmed.strip_prefix("- ").unwrap_or(trimmed).trim_end();

    let mut ref_id = None;
    if let Some(after) = rest.strip_prefix("uid=") {
        let end = after.find(char::is_whitespace).unwrap_or(after.len());
        ref_id = Some(&after[..end]);
        rest = after[end..].trim_start();
    }

    let role_end = rest
        .find(|c: char| c.is_whitespace() || c == '"')
        .unwrap_or(rest.len());
    let role = &rest[..role_end];
    if role.is_empty() || !role.chars().next().is_some_and(char::is_alphabetic) {
        return None;
    }
    rest = rest[role_end..].trim_start();

    let mut name = "";
    if let Some(quoted) = rest.strip_prefix('"') {
        let (inner, after) = split_quoted(quoted);
        name = inner;
        rest = after.trim_start();
    }

    let mut value = "";
    let mut flags = Vec::new();
    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix("value=\"") {
            let (inner, after) = split_value(quoted);
            value = inner;
            rest = after.trim_start();
            continue;
        }
        if let Some(bracketed) = rest.strip_prefix('[') {
            let end = bracketed.find(']').unwrap_or(bracketed.len());
            let token = &bracketed[..end];
            match token.strip_prefix("ref=") {
                Some(r) => ref_id = Some(r),
                None => flags.push(token),
            }
            rest = bracketed.get(end + 1..).unwrap_or("").trim_start();
            continue;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        flags.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }

    Some(Element {
        depth,
        role,
        name,
        value,
        ref_id,
        flags,
    })
}

/// Split `text"rest` at the quote that closes the name. Names may contain
/// quotes, so the closing one is the first whose remainder reads as a flag
/// section (refs, flags, `value="..."`) or is empty.
fn split_quoted(s: &str) -> (&str, &str) {
    let mut search_from = 0;
    while let Some(pos) = s[search_from..].find('"') {
        let idx = search_from + pos;
        let after = &s[idx + 1..];
        if (after.is_empty() || after.starts_with(char::is_whitespace)) && is_flag_tail(after) {
            return (&s[..idx], after);
        }
        search_from = idx + 1;
    }
    (s, "")
}

/// `value="..."` is rendered last, so the value runs to the final quote.
fn split_value(s: &str) -> (&str, &str) {
    match s.rfind('"') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

fn is_flag_tail(tail: &str) -> bool {
    let mut rest = tail.trim_start();
    while !rest.is_empty() {
        if rest.starts_with("value=\"") {
            return rest.trim_end().len() > "value=\"".len() && rest.trim_end().ends_with('"');
        }
        if let Some(bracketed) = rest.strip_prefix('[') {
            let Some(end) = bracketed.find(']') else {
                return false;
            };
            rest = bracketed[end + 1..].trim_start();
            continue;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..end];
        if token.contains('"') && !is_keyed_quoted(token) {
            return false;
        }
        rest = rest[end..].trim_start();
    }
    true
}

/// `readonly="false"` style flag.
fn is_keyed_quoted(token: &str) -> bool {
    token.split_once('=').is_some_and(|(key, value)| {
        !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && value.len() >= 2
            && value.starts_with('"')
            && value.ends_with('"')
            && !value[1..value.len() - 1].contains('"')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cdp_rendering() {
        let raw = "- RootWebArea \"Log in or sign up\" [ref=e1]\n  - textbox \"Email address\" [ref=e4] [focused] [readonly] value=\"a@b.c\"\n";
        let view = SnapshotView::parse(raw);
        let els = view.elements();
        assert_eq!(els.len(), 2);
        assert_eq!(els[0].role, "RootWebArea");
        assert_eq!(els[0].depth, 0);
        let field = &els[1];
        assert_eq!(field.depth, 1);
        assert_eq!(field.role, "textbox");
        assert_eq!(field.name, "Email address");
        assert_eq!(field.value, "a@b.c");
        assert_eq!(field.element_ref().map(|r| r.as_str()), Some("e4"));
        assert!(field.has_flag("focused"));
        assert!(field.is_readonly());
    }

    #[test]
    fn test_parse_uid_rendering() {
        let raw = "uid=5_0 RootWebArea \"Log in or sign up - OpenAI\"\n  uid=5_12 textbox \"Email address\" focusable focused";
        let view = SnapshotView::parse(raw);
        let field = &view.elements()[1];
        assert_eq!(field.element_ref().map(|r| r.as_str()), Some("5_12"));
        assert_eq!(field.name, "Email address");
        assert!(field.has_flag("focusable"));
        assert!(!field.is_readonly());
    }

    #[test]
    fn test_unnamed_and_odd_lines() {
        let raw = "\n  - paragraph [ref=e9] [editable]\n  ---\n  - StaticText \"She said \"hi\" twice\"\n";
        let view = SnapshotView::parse(raw);
        assert_eq!(view.elements().len(), 2);
        assert_eq!(view.elements()[0].name, "");
        assert!(view.elements()[0].has_flag("editable"));
        assert_eq!(view.elements()[1].name, "She said \"hi\" twice");
    }

    #[test]
    fn test_quoted_names_keep_inner_quotes() {
        let raw = "- button \"Say \"yes\" to terms\" [ref=e3] [focused]\n\
                   uid=2_4 textbox \"The \"real\" name\" focusable editable\n\
                   - textbox \"Note \"a\"\" [ref=e5] value=\"he said \"ok\"\"";
        let view = SnapshotView::parse(raw);
        let els = view.elements();
        assert_eq!(els.len(), 3);

        assert_eq!(els[0].name, "Say \"yes\" to terms");
        assert_eq!(els[0].element_ref().map(|r| r.as_str()), Some("e3"));
        assert!(els[0].has_flag("focused"));
        assert!(!els[0].has_flag("to"));

        assert_eq!(els[1].name, "The \"real\" name");
        assert_eq!(els[1].element_ref().map(|r| r.as_str()), Some("2_4"));
        assert!(els[1].has_flag("editable"));

        assert_eq!(els[2].name, "Note \"a\"");
        assert_eq!(els[2].value, "he said \"ok\"");
        assert_eq!(els[2].element_ref().map(|r| r.as_str()), Some("e5"));
    }

    #[test]
    fn test_keyed_flags() {
        let view = SnapshotView::parse("- textbox \"Email address\" readonly=\"false\"\n- textbox \"Code\" readonly=true");
        assert!(!view.elements()[0].is_readonly());
        assert!(view.elements()[1].is_readonly());
    }

    #[test]
    fn test_contains_text_normalizes_apostrophes() {
        let view = SnapshotView::parse("- heading \"You\u{2019}re all set\" [ref=e2]");
        assert!(view.contains_text("You're all set"));
        assert!(view.contains_text("You\u{2019}re all set"));
        assert!(!view.contains_text("all done"));
    }

    #[test]
    fn test_find_named_requires_ref() {
        let view = SnapshotView::parse("- button \"Continue\"\n- button \"continue\" [ref=e7]");
        assert_eq!(view.find_named(&["button"], &["Continue"]).map(|r| r.as_str()), Some("e7"));
        assert!(view.has(&["button"], "Continue"));
        assert!(!view.has(&["link"], "Continue"));
    }
}
