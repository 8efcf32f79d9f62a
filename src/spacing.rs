//! Inserts a space wherever CJK text touches Latin letters, digits, or
//! common symbols, e.g. `Hello世界test` becomes `Hello 世界 test`.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

const CJK: &str = concat!(
    r"\x{2E80}-\x{2EFF}\x{2F00}-\x{2FDF}\x{3040}-\x{309F}\x{30A0}-\x{30FA}\x{30FC}-\x{30FF}",
    r"\x{3100}-\x{312F}\x{3200}-\x{32FF}\x{3400}-\x{4DBF}\x{4E00}-\x{9FFF}\x{F900}-\x{FAFF}",
);
const ANS: &str = r"A-Za-z0-9@#$%^&*+\-=|/\\\x{00A1}-\x{00FF}\x{2150}-\x{218F}\x{2700}-\x{27BF}";

struct Rules {
    cjk_ans: Regex,
    ans_cjk: Regex,
    cjk_open: Regex,
    close_cjk: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let re = |pattern: String| Regex::new(&pattern).expect("spacing pattern is valid");
        Rules {
            cjk_ans: re(format!("([{CJK}])([{ANS}])")),
            ans_cjk: re(format!("([{ANS}])([{CJK}])")),
            cjk_open: re(format!(r"([{CJK}])([\(\[\{{<])")),
            close_cjk: re(format!(r"([\)\]\}}>])([{CJK}])")),
        }
    })
}

/// Returns `text` with spaces inserted at every CJK/Latin boundary. Text
/// without CJK characters is returned unchanged and unallocated.
pub fn spacing(text: &str) -> Cow<'_, str> {
    let rules = rules();
    if !text.chars().any(is_cjk) {
        return Cow::Borrowed(text);
    }
    let mut out = text.to_owned();
    for rule in [&rules.cjk_ans, &rules.ans_cjk, &rules.cjk_open, &rules.close_cjk] {
        // Matches don't overlap, so a second pass catches runs like `a中b中`.
        for _ in 0..2 {
            let replaced = rule.replace_all(&out, "$1 $2");
            if let Cow::Owned(s) = replaced {
                out = s;
            }
        }
    }
    Cow::Owned(out)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{2E80}'..='\u{2EFF}'
        | '\u{2F00}'..='\u{2FDF}'
        | '\u{3040}'..='\u{309F}'
        | '\u{30A0}'..='\u{30FA}'
        | '\u{30FC}'..='\u{30FF}'
        | '\u{3100}'..='\u{312F}'
        | '\u{3200}'..='\u{32FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}')
}
