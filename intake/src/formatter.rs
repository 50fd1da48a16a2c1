//! Renders a submission as a Telegram message in the legacy `Markdown` dialect.

use crate::attachments::Attachment;
use crate::submission::Submission;
use crate::submission::fields::*;
use serde_json::{Map, Value};
use std::fmt::Write;

const NOT_SELECTED: &str = "Не выбран";
const YES: &str = "Да";
const NO: &str = "Нет";

/// Escapes the characters that open an entity in legacy `Markdown`.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Escapes do not work inside an entity, so brackets in link text are swapped instead.
fn link_text(text: &str) -> String {
    text.replace('[', "(").replace(']', ")")
}

fn json_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct MessageBuilder {
    text: String,
}

impl MessageBuilder {
    fn new() -> Self {
        MessageBuilder {
            text: String::new(),
        }
    }

    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    /// `*label:* value`, with the value escaped.
    fn field(&mut self, label: &str, value: &str) {
        let _ = writeln!(self.text, "*{label}:* {}", escape_markdown(value));
    }

    fn optional_field(&mut self, label: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.field(label, value);
        }
    }

    fn toggle(&mut self, label: &str, on: bool) {
        self.field(label, if on { YES } else { NO });
    }

    fn finish(self) -> String {
        self.text
    }
}

/// Builds the notification text for a validated submission.
pub fn format_message(submission: &Submission, attachments: &[Attachment]) -> String {
    let mut message = MessageBuilder::new();

    message.line("📄 *Новая заявка*:");
    message.blank();
    message.field("Имя", submission.get(NAME).unwrap_or("Не указано"));
    message.field("Телефон", submission.get(PHONE).unwrap_or("Не указан"));
    message.optional_field("Почта", submission.get(EMAIL));
    message.optional_field("Комментарий", submission.get(COMMENT));
    message.optional_field("Итого", submission.get(PRICE_SUMMARY));

    message.blank();
    message.field(
        "Вид продукции",
        submission.get(PRODUCT_TYPE).unwrap_or(NOT_SELECTED),
    );
    message.field(
        "Размер",
        &format!(
            "{} x {} мм",
            submission.get(WIDTH).unwrap_or_default(),
            submission.get(HEIGHT).unwrap_or_default()
        ),
    );
    message.optional_field("Материал", submission.get(MATERIAL));
    message.field("Количество", submission.get(QUANTITY).unwrap_or_default());

    let grommets = submission.is_on(GROMMETS);
    message.toggle("Установка люверсов", grommets);
    if grommets {
        message.field(
            "Количество люверсов",
            submission.get(GROMMET_COUNT).unwrap_or("0"),
        );
    }

    let stands = submission.is_on(STANDS);
    message.toggle("Для стендов", stands);
    if stands && let Some(details) = submission.get(STAND_DETAILS) {
        stand_details(&mut message, details);
    }

    let frame = submission.is_on(FRAME);
    message.toggle("Обрамление профилем", frame);
    if frame {
        message.optional_field("Цвет обрамления", submission.get(FRAME_COLOR));
    }

    if !attachments.is_empty() {
        message.blank();
        message.line("📎 *Файлы:*");
        for (index, attachment) in attachments.iter().enumerate() {
            message.line(&format!(
                "{}. [{}]({})",
                index + 1,
                link_text(&attachment.original_name),
                attachment.url
            ));
        }
    }

    message.finish()
}

/// Renders the details as a list when they are a JSON object, verbatim otherwise.
fn stand_details(message: &mut MessageBuilder, details: &str) {
    match serde_json::from_str::<Map<String, Value>>(details) {
        Ok(entries) => {
            message.line("*Детали стендов:*");
            for (key, value) in &entries {
                message.line(&format!(
                    " - {}: {}",
                    escape_markdown(key),
                    escape_markdown(&json_value_text(value))
                ));
            }
        }
        Err(_) => message.field("Детали стендов", details),
    }
}
