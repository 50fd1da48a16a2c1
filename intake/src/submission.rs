//! Form fields of one submission and their validation.

use indexmap::IndexMap;

/// Form field names as posted by the order form.
pub mod fields {
    pub const NAME: &str = "Имя";
    pub const PHONE: &str = "Телефон";
    pub const EMAIL: &str = "E-mail";
    pub const COMMENT: &str = "Комментарий";
    pub const PRICE_SUMMARY: &str = "Итоговая строка калькулятора с ценой";
    pub const PRODUCT_TYPE: &str = "Вид продукции";
    pub const WIDTH: &str = "Ширина";
    pub const HEIGHT: &str = "Высота";
    pub const MATERIAL: &str = "Материал";
    pub const QUANTITY: &str = "Количество";
    pub const GROMMETS: &str = "Установка люверсов";
    pub const GROMMET_COUNT: &str = "Количество люверсов";
    pub const STANDS: &str = "Для стендов";
    pub const STAND_DETAILS: &str = "stands_details";
    pub const FRAME: &str = "Обрамление";
    pub const FRAME_COLOR: &str = "Цвет обрамления";
}

pub const REQUIRED_FIELDS: &[&str] = &[
    fields::NAME,
    fields::PHONE,
    fields::PRODUCT_TYPE,
    fields::WIDTH,
    fields::HEIGHT,
    fields::QUANTITY,
];

/// Value a checkbox posts when it is ticked.
pub const TOGGLE_ON: &str = "on";

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("missing required fields: {}", .missing.join(", "))]
pub struct MissingFields {
    pub missing: Vec<&'static str>,
}

/// Field values of one form submission, in the order they were posted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submission {
    values: IndexMap<String, String>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a field value. A repeated field name keeps its position and the last value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Trimmed value of `name`, or `None` when it is absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Whether the checkbox `name` was ticked. Only the exact untrimmed value `on` counts.
    pub fn is_on(&self, name: &str) -> bool {
        self.values.get(name).map(String::as_str) == Some(TOGGLE_ON)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn validate(&self) -> Result<(), MissingFields> {
        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingFields { missing })
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Submission
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut submission = Submission::new();
        for (name, value) in iter {
            submission.insert(name, value);
        }
        submission
    }
}
