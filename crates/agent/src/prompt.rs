pub const MESSAGE_PLACEHOLDER: &str = "{message_text}";

/// Asks for three short replies in fixed tones, numbered so the rendered
/// output reads as a list.
pub const PROMPT_TEMPLATE: &str = "以下のSlackメッセージに対して、3つの異なるトーンの返信案を提案してください。
各返信案は簡潔に（1-2文程度）してください。

メッセージ: {message_text}

以下の形式で返信案を提示してください：
1. プロフェッショナル：[返信案]
2. カジュアル：[返信案]
3. サポーティブ：[返信案]";

pub fn build_prompt(message_text: &str) -> String {
    PROMPT_TEMPLATE.replacen(MESSAGE_PLACEHOLDER, message_text, 1)
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, MESSAGE_PLACEHOLDER};

    #[test]
    fn prompt_embeds_message_and_all_three_tones() {
        let prompt = build_prompt("明日のリリースは予定通りですか？");

        assert!(prompt.contains("メッセージ: 明日のリリースは予定通りですか？"));
        assert!(!prompt.contains(MESSAGE_PLACEHOLDER));
        for tone in ["プロフェッショナル", "カジュアル", "サポーティブ"] {
            assert!(prompt.contains(tone), "missing tone {tone}");
        }
    }

    #[test]
    fn placeholder_text_inside_the_message_is_left_alone() {
        let prompt = build_prompt("literal {message_text} here");

        assert_eq!(prompt.matches("{message_text}").count(), 1);
    }
}
