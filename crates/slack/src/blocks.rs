use replyhint_core::domain::NotificationId;
use serde::Serialize;

pub const GENERATE_ACTION_ID: &str = "generate_reply_suggestions";
pub const DISMISS_ACTION_ID: &str = "dismiss_reply_suggestions";
pub const SUGGESTION_HEADER: &str = "💡 *返信案*";
pub const DISMISS_LABEL: &str = "閉じる";
pub const DISMISSED_TEXT: &str = "返信案を閉じました。";
/// Slack refuses section text longer than this with `invalid_blocks`.
pub const SECTION_TEXT_LIMIT: usize = 3000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), style: None, value: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// A rendered message: Block Kit blocks plus the plain `text` Slack shows in
/// notifications and clients that cannot draw blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    pub fn dismiss_value(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Actions { elements, .. } => elements
                .iter()
                .find(|element| element.action_id == DISMISS_ACTION_ID)
                .and_then(|element| element.value.as_deref()),
            _ => None,
        })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(" "))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Header, generated body and, when an id is given, a dismiss button bound to
/// it. Works the same for real suggestions and for the apology text.
pub fn render_suggestions(content: &str, dismiss_id: Option<&NotificationId>) -> MessageTemplate {
    let body = if content.trim().is_empty() { " " } else { content };
    let mut builder = MessageBuilder::new(format!("{SUGGESTION_HEADER}\n\n{content}"))
        .section("replyhint.suggestions.header.v1", |section| {
            section.mrkdwn(SUGGESTION_HEADER);
        });
    for (index, chunk) in section_chunks(body, SECTION_TEXT_LIMIT).into_iter().enumerate() {
        builder = builder.section(format!("replyhint.suggestions.body.{index}.v1"), |section| {
            section.mrkdwn(chunk);
        });
    }

    match dismiss_id {
        Some(id) => builder
            .actions("replyhint.suggestions.actions.v1", |actions| {
                actions.button(ButtonElement::new(DISMISS_ACTION_ID, DISMISS_LABEL).value(id.as_str()));
            })
            .build(),
        None => builder.build(),
    }
}

/// Splits `text` into pieces of at most `limit` chars, breaking on the last
/// newline inside each window when there is one.
fn section_chunks(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let window_end = rest.char_indices().nth(limit).map_or(rest.len(), |(index, _)| index);
        let split_at =
            rest[..window_end].rfind('\n').filter(|&index| index > 0).unwrap_or(window_end);
        chunks.push(&rest[..split_at]);
        rest = rest[split_at..].trim_start_matches('\n');
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }

    chunks
}

/// Bare text with no controls; used for the last-resort apology post.
pub fn plain_notice(text: &str) -> MessageTemplate {
    MessageBuilder::new(text)
        .section("replyhint.notice.v1", |section| {
            section.plain(text);
        })
        .build()
}

pub fn dismissal_confirmation() -> MessageTemplate {
    MessageBuilder::new(DISMISSED_TEXT)
        .context("replyhint.dismissed.v1", |context| {
            context.mrkdwn(format!(":wastebasket: {DISMISSED_TEXT}"));
        })
        .build()
}
