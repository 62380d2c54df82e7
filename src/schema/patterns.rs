//! Ordered regex pattern families for column detection.
//!
//! Matching is case-insensitive against the whole (trimmed) column name.
//! The mapper walks table columns left to right and takes the first column
//! matching any pattern in a family, so pattern order only breaks ties
//! within a single column name, never between columns.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("invalid column pattern"))
        .collect()
}

pub static PLAYER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^athlete[\s_]?name$",
        r"^player[\s_]?name$",
        r"^player$",
        r"^athlete$",
        r"^name$",
        r"^player[\s_]?id$",
        r"^athlete[\s_]?id$",
        r"^id$",
    ])
});

pub static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^date$",
        r"^day$",
        r"^training[\s_]?date$",
        r"^session[\s_]?date$",
    ])
});

pub static LOAD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^load$",
        r"^training[\s_]?load$",
        r"^srpe$",
        r"^session[\s_]?load$",
        r"^workload$",
        r"^data$",
    ])
});

pub static RPE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^rpe$",
        r"^rating[\s_]?of[\s_]?perceived[\s_]?exertion$",
        r"^perceived[\s_]?exertion$",
    ])
});

pub static TIME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^time$",
        r"^time[\s_]?\(?mins?\)?$",
        r"^duration$",
        r"^duration[\s_]?\(?mins?\)?$",
        r"^minutes$",
        r"^session[\s_]?time$",
        r"^training[\s_]?time$",
    ])
});
