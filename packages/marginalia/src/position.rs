//! Position identifiers.
//!
//! A position identifier names an element by the path of `/tag[n]` steps leading to it
//! from the annotated root, where `n` is the 1-based index of the element among its
//! same-tag siblings. `/p[1]/em[2]` is the second `<em>` in the first `<p>`.
//!
//! Identifiers are decoded into `nth-of-type` selectors and resolved as chains of child
//! steps. Malformed steps are skipped rather than rejected.

use marginalia_dom::{BaseDocument, NthOfTypeSelector, NthOfTypeStep};

/// One `tag[n]` step found while scanning an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawStep<'a> {
    tag: &'a str,
    index: &'a str,
}

impl RawStep<'_> {
    fn len(&self) -> usize {
        self.tag.len() + self.index.len() + 2
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Try to match `tag[digits]` at the start of `input`
fn match_step(input: &str) -> Option<RawStep<'_>> {
    let bytes = input.as_bytes();
    let tag_len = bytes.iter().take_while(|b| is_word_byte(**b)).count();
    if tag_len == 0 || bytes.get(tag_len) != Some(&b'[') {
        return None;
    }
    let digits = &bytes[tag_len + 1..];
    let index_len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if index_len == 0 || digits.get(index_len) != Some(&b']') {
        return None;
    }
    Some(RawStep {
        tag: &input[..tag_len],
        index: &input[tag_len + 1..tag_len + 1 + index_len],
    })
}

/// Scan `input` left to right for steps, optionally requiring each to be preceded by `/`.
///
/// Anything between matches is ignored.
fn scan_steps(input: &str, leading_slash: bool) -> Vec<RawStep<'_>> {
    let mut steps = Vec::new();
    let mut pos = 0;
    while pos < input.len() {
        let rest = &input[pos..];
        let candidate = if leading_slash {
            rest.strip_prefix('/').and_then(match_step)
        } else {
            match_step(rest)
        };
        match candidate {
            Some(step) => {
                pos += step.len() + usize::from(leading_slash);
                steps.push(step);
            }
            None => {
                // Advance by one character; identifiers are ASCII but garbage may not be
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    steps
}

/// Decode a position identifier into an `nth-of-type` selector.
///
/// Returns `None` when the identifier contains no valid step.
pub fn encode(identifier: &str) -> Option<NthOfTypeSelector> {
    let mut selector = NthOfTypeSelector::new();
    for step in scan_steps(identifier, true) {
        let Ok(index) = step.index.parse::<usize>() else {
            continue;
        };
        selector.push(NthOfTypeStep::new(step.tag, index));
    }
    (!selector.is_empty()).then_some(selector)
}

/// Resolve a position identifier to an element below `root`.
///
/// The empty identifier names `root` itself.
pub fn resolve(doc: &BaseDocument, identifier: &str, root: usize) -> Option<usize> {
    if identifier.is_empty() {
        return Some(root);
    }
    encode(identifier)?.query_from(doc, root)
}

/// Build the identifier of `node` relative to `root`.
///
/// Returns the empty string for `root` itself and `None` when `node` is not an element
/// inside `root`.
pub fn identifier_for(doc: &BaseDocument, node: usize, root: usize) -> Option<String> {
    let mut steps = Vec::new();
    let mut current = node;
    while current != root {
        let element = doc.get_node(current)?;
        let tag = element.element_data()?.tag();
        let index = doc.nth_of_type_index(current)?;
        steps.push(format!("/{tag}[{index}]"));
        current = element.parent?;
    }
    steps.reverse();
    Some(steps.concat())
}

/// The block parameter used in annotation fetch URLs: the identifier's steps without
/// slashes (`/ol[2]/li[4]` becomes `ol[2]li[4]`).
pub fn block_url_param(identifier: &str) -> String {
    scan_steps(identifier, false)
        .into_iter()
        .map(|step| format!("{}[{}]", step.tag, step.index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::parse;

    #[test]
    fn encodes_nth_of_type_chain() {
        let selector = encode("/p[1]/ol[2]").unwrap();
        assert_eq!(selector.to_string(), "p:nth-of-type(1) > ol:nth-of-type(2)");
    }

    #[test]
    fn malformed_steps_are_skipped() {
        let selector = encode("/p[1]/bogus/[3]/em[x]/span[2]").unwrap();
        assert_eq!(selector.to_string(), "p:nth-of-type(1) > span:nth-of-type(2)");

        assert!(encode("").is_none());
        assert!(encode("nothing here").is_none());
    }

    #[test]
    fn resolves_identifiers_below_root() {
        let doc = parse("<p>one</p><div><p>two</p><p>three <em>x</em></p></div>");
        let body = doc.body().unwrap();

        let em = resolve(&doc, "/div[1]/p[2]/em[1]", body).unwrap();
        assert_eq!(doc.text_content(em), "x");
        assert_eq!(resolve(&doc, "", body), Some(body));
        assert_eq!(resolve(&doc, "/div[2]", body), None);

        assert_eq!(
            identifier_for(&doc, em, body).as_deref(),
            Some("/div[1]/p[2]/em[1]")
        );
        assert_eq!(identifier_for(&doc, body, body).as_deref(), Some(""));
    }

    #[test]
    fn block_param_drops_slashes() {
        assert_eq!(block_url_param("/ol[2]/li[4]"), "ol[2]li[4]");
        assert_eq!(block_url_param("/p[1]/junk"), "p[1]");
    }
}
