//! Synthetic compilation unit around a bare fragment.

pub const LICENSE_LINE: &str = "// SPDX-License-Identifier: UNLICENSED";

/// Embeds `fragment` verbatim in a minimal source unit: a license comment, a version pragma
/// and a single contract named `container`.
///
/// The fragment is never inspected. A fragment that is already a full contract is wrapped
/// all the same and fails to parse as a nested definition.
pub fn wrap_fragment_source(fragment: &str, container: &str, pragma: &str) -> String {
    format!(
        "{LICENSE_LINE}\npragma solidity {pragma};\n\n\
         contract {container} {{\n{fragment}\n}}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_text_is_embedded_verbatim() {
        let fragment = "function demo() public pure returns (uint256) {\n  return 1; // keep\n}";
        let wrapped = wrap_fragment_source(fragment, "__StitchFragment", "^0.8.0");
        assert!(wrapped.starts_with(LICENSE_LINE));
        assert!(wrapped.contains("pragma solidity ^0.8.0;"));
        assert!(wrapped.contains("contract __StitchFragment {"));
        assert!(wrapped.contains(fragment));
    }

    #[test]
    fn trailing_line_comment_cannot_swallow_the_closing_brace() {
        let wrapped = wrap_fragment_source("uint256 x; // note", "W", ">=0.8.0 <0.9.0");
        assert!(wrapped.ends_with("// note\n}\n"));
    }
}
