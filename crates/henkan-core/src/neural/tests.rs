use super::*;

fn v3(profile: &str, topic: &str) -> PromptConfig {
    PromptConfig::V3(V3Config {
        profile: Some(profile.to_string()),
        topic: Some(topic.to_string()),
        style: None,
        preference: Some(String::new()),
        max_left_context_chars: 5,
    })
}

#[test]
fn test_v2_prediction_prompt() {
    let builder = PromptBuilder::new(PromptConfig::V2(V2Config {
        profile: Some("学生".to_string()),
        max_left_context_chars: 40,
    }));
    assert_eq!(
        builder.prediction_prompt("今日は"),
        "\u{EE03}学生\u{EE02}\u{EE00}\u{EE01}今日は"
    );
}

#[test]
fn test_prediction_framing_without_fields() {
    let builder = PromptBuilder::new(PromptConfig::V2(V2Config {
        profile: None,
        max_left_context_chars: 40,
    }));
    assert_eq!(builder.prediction_prompt(""), "\u{EE02}\u{EE00}\u{EE01}");
    assert!(!builder.prediction_prompt("").contains(CHAR_PROFILE));
}

#[test]
fn test_v3_fields_in_order_and_empty_omitted() {
    let builder = PromptBuilder::new(v3("教師", "天気"));
    let prompt = builder.prediction_prompt("");
    assert_eq!(prompt, "\u{EE03}教師\u{EE04}天気\u{EE02}\u{EE00}\u{EE01}");
    assert!(!prompt.contains(CHAR_STYLE));
    assert!(!prompt.contains(CHAR_PREFERENCE));
}

#[test]
fn test_left_context_keeps_trailing_chars() {
    let builder = PromptBuilder::new(v3("教師", "天気"));
    let prompt = builder.prediction_prompt("あいうえおかきくけこ");
    assert!(prompt.ends_with("\u{EE01}かきくけこ"));
    assert!(!prompt.contains('お'));
}

#[test]
fn test_evaluation_prompt() {
    let builder = PromptBuilder::new(PromptConfig::V2(V2Config {
        profile: None,
        max_left_context_chars: 40,
    }));
    let hints = vec![DictionaryHint {
        word: "京都".to_string(),
        ruby: "きょうと".to_string(),
    }];
    assert_eq!(
        builder.evaluation_prompt("私は", "きょうは", &hints, "今日"),
        "\u{EE07}京都：キョウト\u{EE02}私は\u{EE00}キョウハ\u{EE01}今日"
    );
    // No context, no hints: only the frame remains.
    assert_eq!(
        builder.evaluation_prompt("", "き", &[], ""),
        "\u{EE00}キ\u{EE01}"
    );
}

#[test]
fn test_markers_in_fields_are_stripped() {
    let builder = PromptBuilder::new(PromptConfig::V2(V2Config {
        profile: Some("a\u{EE01}b c".to_string()),
        max_left_context_chars: 40,
    }));
    let prompt = builder.evaluation_prompt("x\u{EE00}y", "あ", &[], "");
    assert_eq!(
        prompt,
        "\u{EE03}ab\u{3000}c\u{EE02}xy\u{EE00}ア\u{EE01}"
    );
}

#[test]
fn test_persona_fields_truncated() {
    let builder = PromptBuilder::new(v3("あいうえお", "天気")).with_max_persona_chars(3);
    assert!(builder.prediction_prompt("").starts_with("\u{EE03}あいう\u{EE04}天気"));
}

#[test]
fn test_deterministic() {
    let builder = PromptBuilder::new(v3("教師", "天気"));
    let hints = vec![
        DictionaryHint {
            word: "天気".to_string(),
            ruby: "てんき".to_string(),
        },
        DictionaryHint {
            word: "転機".to_string(),
            ruby: "てんき".to_string(),
        },
    ];
    let a = builder.evaluation_prompt("今日は", "てんき", &hints, "");
    let b = builder.evaluation_prompt("今日は", "てんき", &hints, "");
    assert_eq!(a, b);
    assert!(a.find("天気").unwrap() < a.find("転機").unwrap());
}
