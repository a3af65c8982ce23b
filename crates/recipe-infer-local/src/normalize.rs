//! Text canonicalization applied before tokenization.
//!
//! - full-width ASCII (U+FF01..=U+FF5E) folds to half-width
//! - half-width katakana (with voiced/semi-voiced marks) maps to full-width
//! - a few unit glyphs expand (`㌘` → `グラム`), ideographic space → ASCII space
//! - ASCII uppercase → lowercase
//! - `:` / `…` delimiters are removed unless both nearest non-space neighbors are digits

const FULL_WIDTH_OFFSET: u32 = 0xFEE0;
const VOICED_MARK: char = 'ﾞ';
const SEMI_VOICED_MARK: char = 'ﾟ';

fn is_delimiter(c: char) -> bool {
    matches!(c, ':' | '…')
}

fn voiced(base: char) -> Option<char> {
    Some(match base {
        'ｶ' => 'ガ',
        'ｷ' => 'ギ',
        'ｸ' => 'グ',
        'ｹ' => 'ゲ',
        'ｺ' => 'ゴ',
        'ｻ' => 'ザ',
        'ｼ' => 'ジ',
        'ｽ' => 'ズ',
        'ｾ' => 'ゼ',
        'ｿ' => 'ゾ',
        'ﾀ' => 'ダ',
        'ﾁ' => 'ヂ',
        'ﾂ' => 'ヅ',
        'ﾃ' => 'デ',
        'ﾄ' => 'ド',
        'ﾊ' => 'バ',
        'ﾋ' => 'ビ',
        'ﾌ' => 'ブ',
        'ﾍ' => 'ベ',
        'ﾎ' => 'ボ',
        'ｳ' => 'ヴ',
        'ﾜ' => 'ヷ',
        'ｦ' => 'ヺ',
        _ => return None,
    })
}

fn semi_voiced(base: char) -> Option<char> {
    Some(match base {
        'ﾊ' => 'パ',
        'ﾋ' => 'ピ',
        'ﾌ' => 'プ',
        'ﾍ' => 'ペ',
        'ﾎ' => 'ポ',
        _ => return None,
    })
}

fn half_width_kana(c: char) -> Option<char> {
    Some(match c {
        'ｱ' => 'ア',
        'ｲ' => 'イ',
        'ｳ' => 'ウ',
        'ｴ' => 'エ',
        'ｵ' => 'オ',
        'ｶ' => 'カ',
        'ｷ' => 'キ',
        'ｸ' => 'ク',
        'ｹ' => 'ケ',
        'ｺ' => 'コ',
        'ｻ' => 'サ',
        'ｼ' => 'シ',
        'ｽ' => 'ス',
        'ｾ' => 'セ',
        'ｿ' => 'ソ',
        'ﾀ' => 'タ',
        'ﾁ' => 'チ',
        'ﾂ' => 'ツ',
        'ﾃ' => 'テ',
        'ﾄ' => 'ト',
        'ﾅ' => 'ナ',
        'ﾆ' => 'ニ',
        'ﾇ' => 'ヌ',
        'ﾈ' => 'ネ',
        'ﾉ' => 'ノ',
        'ﾊ' => 'ハ',
        'ﾋ' => 'ヒ',
        'ﾌ' => 'フ',
        'ﾍ' => 'ヘ',
        'ﾎ' => 'ホ',
        'ﾏ' => 'マ',
        'ﾐ' => 'ミ',
        'ﾑ' => 'ム',
        'ﾒ' => 'メ',
        'ﾓ' => 'モ',
        'ﾔ' => 'ヤ',
        'ﾕ' => 'ユ',
        'ﾖ' => 'ヨ',
        'ﾗ' => 'ラ',
        'ﾘ' => 'リ',
        'ﾙ' => 'ル',
        'ﾚ' => 'レ',
        'ﾛ' => 'ロ',
        'ﾜ' => 'ワ',
        'ｦ' => 'ヲ',
        'ﾝ' => 'ン',
        'ｧ' => 'ァ',
        'ｨ' => 'ィ',
        'ｩ' => 'ゥ',
        'ｪ' => 'ェ',
        'ｫ' => 'ォ',
        'ｯ' => 'ッ',
        'ｬ' => 'ャ',
        'ｭ' => 'ュ',
        'ｮ' => 'ョ',
        '｡' => '。',
        '､' => '、',
        'ｰ' => 'ー',
        '｢' => '「',
        '｣' => '」',
        _ => return None,
    })
}

fn symbol_expansion(c: char) -> Option<&'static str> {
    Some(match c {
        '㌘' => "グラム",
        '㌔' => "キロ",
        '㏄' => "cc",
        '\u{3000}' => " ",
        _ => return None,
    })
}

fn fold_width(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
            // The whole range maps onto U+0021..=U+007E.
            if let Some(h) = char::from_u32(c as u32 - FULL_WIDTH_OFFSET) {
                out.push(h);
                continue;
            }
        }
        let combined = match chars.peek() {
            Some(&VOICED_MARK) => voiced(c),
            Some(&SEMI_VOICED_MARK) => semi_voiced(c),
            _ => None,
        };
        if let Some(k) = combined {
            chars.next();
            out.push(k);
            continue;
        }
        if let Some(k) = half_width_kana(c) {
            out.push(k);
        } else if let Some(exp) = symbol_expansion(c) {
            out.push_str(exp);
        } else {
            out.push(c);
        }
    }
    out
}

fn drop_delimiters(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        if !is_delimiter(c) {
            out.push(c);
            continue;
        }
        let left = chars[..i].iter().rev().find(|c| !c.is_whitespace());
        let right = chars[i + 1..].iter().find(|c| !c.is_whitespace());
        let between_digits = matches!(
            (left, right),
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit()
        );
        if between_digits {
            out.push(c);
        }
    }
    out
}

/// Canonicalize raw document text. Total and deterministic.
pub fn normalize(s: &str) -> String {
    let folded = fold_width(s);
    let lowered: String = folded.chars().map(|c| c.to_ascii_lowercase()).collect();
    drop_delimiters(&lowered)
}
