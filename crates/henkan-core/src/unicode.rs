//! Character-level Unicode classification for Japanese text.

/// Check the full Hiragana block (U+3040..U+309F).
pub fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

/// Check the full Katakana block (U+30A0..U+30FF).
pub fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c)
}

/// Convert a hiragana string to katakana.
/// Non-hiragana characters (ー, ASCII, etc.) are passed through unchanged.
pub fn hiragana_to_katakana(s: &str) -> String {
    s.chars()
        .map(|c| {
            // Only the letters have katakana counterparts at +0x60.
            if ('\u{3041}'..='\u{3096}').contains(&c) {
                char::from_u32(c as u32 + 0x60).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Check if a string is a valid hiragana reading.
///
/// Accepts the prolonged sound mark ー (U+30FC) which appears in readings
/// like "らーめん".
pub fn is_hiragana_reading(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| is_hiragana(c) || c == 'ー')
}

/// Kana that are easily mistyped for one another: voiced/unvoiced and
/// small/large pairs. Each group is symmetric.
static CONFUSABLE_GROUPS: &[&[char]] = &[
    &['か', 'が'],
    &['き', 'ぎ'],
    &['く', 'ぐ'],
    &['け', 'げ'],
    &['こ', 'ご'],
    &['さ', 'ざ'],
    &['し', 'じ'],
    &['す', 'ず'],
    &['せ', 'ぜ'],
    &['そ', 'ぞ'],
    &['た', 'だ'],
    &['ち', 'ぢ'],
    &['つ', 'づ', 'っ'],
    &['て', 'で'],
    &['と', 'ど'],
    &['は', 'ば', 'ぱ'],
    &['ひ', 'び', 'ぴ'],
    &['ふ', 'ぶ', 'ぷ'],
    &['へ', 'べ', 'ぺ'],
    &['ほ', 'ぼ', 'ぽ'],
    &['あ', 'ぁ'],
    &['い', 'ぃ'],
    &['う', 'ぅ', 'ゔ'],
    &['え', 'ぇ'],
    &['お', 'ぉ'],
    &['や', 'ゃ'],
    &['ゆ', 'ゅ'],
    &['よ', 'ょ'],
    &['わ', 'ゎ'],
];

/// Phonetically adjacent substitutes for `c`, excluding `c` itself.
pub fn confusable_kana(c: char) -> impl Iterator<Item = char> {
    CONFUSABLE_GROUPS
        .iter()
        .find(|group| group.contains(&c))
        .into_iter()
        .flat_map(|group| group.iter().copied())
        .filter(move |&alt| alt != c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hiragana_reading() {
        assert!(is_hiragana_reading("かんじ"));
        assert!(is_hiragana_reading("らーめん"));
        assert!(!is_hiragana_reading("カタカナ"));
        assert!(!is_hiragana_reading("abc"));
        assert!(!is_hiragana_reading(""));
    }

    #[test]
    fn test_hiragana_to_katakana() {
        assert_eq!(hiragana_to_katakana("きょうは"), "キョウハ");
        assert_eq!(hiragana_to_katakana("らーめん"), "ラーメン");
        assert_eq!(hiragana_to_katakana("abc"), "abc");
        assert_eq!(hiragana_to_katakana("カタカナ"), "カタカナ");
    }

    #[test]
    fn test_confusable_kana() {
        let alts: Vec<char> = confusable_kana('は').collect();
        assert_eq!(alts, vec!['ば', 'ぱ']);
        let alts: Vec<char> = confusable_kana('っ').collect();
        assert_eq!(alts, vec!['つ', 'づ']);
        assert_eq!(confusable_kana('ん').count(), 0);
        assert_eq!(confusable_kana('a').count(), 0);
    }
}
