use crate::fixers::ts2304;
use crate::fixers::ts2305;
use crate::fixers::ts2307;
use crate::fixers::ts2613;
use crate::fixers::ts2724;
use crate::fixers::FixerFn;

/// Maps a diagnostic's `rule_id` to the fixer that knows how to address it.
/// `TS2613` and `TS2614` share the default/named shape-mismatch logic in
/// `fixers::ts2613` but are registered under their own codes since they read
/// the diagnostic message differently.
pub(crate) fn lookup(rule_id: &str) -> Option<FixerFn> {
    match rule_id {
        "TS2307" => Some(ts2307::fix),
        "TS2613" => Some(ts2613::fix),
        "TS2614" => Some(ts2613::fix_use_default_instead),
        "TS2304" => Some(ts2304::fix),
        "TS2305" => Some(ts2305::fix),
        "TS2724" => Some(ts2724::fix),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        for code in ["TS2307", "TS2613", "TS2614", "TS2304", "TS2305", "TS2724"] {
            assert!(lookup(code).is_some(), "expected a fixer for {code}");
        }
    }

    #[test]
    fn unknown_codes_have_no_fixer() {
        assert!(lookup("TS9999").is_none());
    }
}
