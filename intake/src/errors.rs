use crate::submission::MissingFields;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use telegram::TelegramError;
use thiserror::Error;

pub const SUCCESS_TEXT: &str = "Заявка успешно отправлена!";
pub const MISSING_FIELDS_TEXT: &str = "Пожалуйста, заполните все обязательные поля.";
pub const FAILURE_TEXT: &str = "Произошла ошибка при обработке заявки.";

/// Result type alias for intake operations
pub type Result<T, E = IntakeError> = std::result::Result<T, E>;

/// Errors that can occur while accepting and relaying a submission
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    MissingFields(#[from] MissingFields),

    #[error("malformed form data: {0}")]
    MalformedForm(String),

    #[error("too many files, at most {limit} are accepted")]
    TooManyFiles { limit: usize },

    #[error("file exceeds {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("notification failed: {0}")]
    Notification(#[from] TelegramError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            IntakeError::MissingFields(_)
            | IntakeError::MalformedForm(_)
            | IntakeError::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
            IntakeError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IntakeError::Notification(_) | IntakeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the outcome tag on submission metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            IntakeError::MissingFields(_) => "invalid",
            IntakeError::MalformedForm(_)
            | IntakeError::TooManyFiles { .. }
            | IntakeError::FileTooLarge { .. } => "rejected",
            IntakeError::Notification(_) | IntakeError::Io(_) => "failed",
        }
    }

    /// Plain text shown to the person who filled in the form.
    pub fn public_message(&self) -> String {
        match self {
            IntakeError::MissingFields(_) => MISSING_FIELDS_TEXT.to_string(),
            IntakeError::MalformedForm(_) => "Некорректные данные формы.".to_string(),
            IntakeError::TooManyFiles { limit } => {
                format!("Слишком много файлов, можно прикрепить не более {limit}.")
            }
            IntakeError::FileTooLarge { limit } => {
                format!(
                    "Файл слишком большой, максимальный размер {} МБ.",
                    limit / (1024 * 1024)
                )
            }
            IntakeError::Notification(_) | IntakeError::Io(_) => FAILURE_TEXT.to_string(),
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}
