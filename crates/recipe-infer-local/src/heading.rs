//! Recognizers for section labels ("材料", "作り方", "Ingredients", ...).
//!
//! Labels like these sit right next to real recipe content and would otherwise
//! score as a material name or as a procedure step.

const MATERIAL_HEADINGS: &[&str] = &[
    "材料",
    "ざいりょう",
    "材料表",
    "材料リスト",
    "用意するもの",
    "ingredient",
    "ingredients",
    "material",
    "materials",
];

const PROCEDURE_HEADINGS: &[&str] = &[
    "作り方",
    "つくり方",
    "作りかた",
    "手順",
    "調理手順",
    "作り方の手順",
    "howto",
    "howtomake",
    "procedure",
    "procedures",
    "direction",
    "directions",
    "instruction",
    "instructions",
    "step",
    "steps",
    "method",
];

fn is_decoration(c: char) -> bool {
    matches!(
        c,
        '■' | '□'
            | '●'
            | '○'
            | '◆'
            | '◇'
            | '★'
            | '☆'
            | '・'
            | '<'
            | '>'
            | '〈'
            | '〉'
            | '《'
            | '》'
            | '「'
            | '」'
            | '『'
            | '』'
            | ':'
            | '!'
            | '.'
            | '-'
            | '*'
            | '#'
    )
}

/// Strip one trailing bracketed note, e.g. `材料(2人分)` or `材料【4個分】`.
fn strip_bracket_suffix(s: &str) -> &str {
    for (open, close) in [('(', ')'), ('【', '】'), ('[', ']')] {
        if let Some(body) = s.strip_suffix(close) {
            if let Some(idx) = body.rfind(open) {
                return &s[..idx];
            }
        }
    }
    s
}

/// Strip a trailing serving-size note without brackets, e.g. `材料2人分`.
fn strip_servings_suffix(s: &str) -> &str {
    for suffix in ["人分", "人前", "個分", "枚分"] {
        if let Some(body) = s.strip_suffix(suffix) {
            let trimmed = body.trim_end_matches(|c: char| c.is_ascii_digit() || c == '~');
            if trimmed.len() < body.len() {
                return trimmed;
            }
        }
    }
    s
}

fn heading_key(text: &str) -> String {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    let trimmed = compact.trim_matches(is_decoration);
    let trimmed = strip_bracket_suffix(trimmed);
    let trimmed = strip_servings_suffix(trimmed);
    trimmed.trim_matches(is_decoration).to_string()
}

pub fn is_material_heading(text: &str) -> bool {
    let key = heading_key(text);
    MATERIAL_HEADINGS.contains(&key.as_str())
}

pub fn is_procedure_heading(text: &str) -> bool {
    let key = heading_key(text);
    PROCEDURE_HEADINGS.contains(&key.as_str())
}
