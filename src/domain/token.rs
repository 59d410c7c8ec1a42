// Token (dashboard input) domain model
use super::search::TimeRange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Text,
    Dropdown,
    Multiselect,
    Time,
    Radio,
    Checkbox,
    Link,
}

impl TokenType {
    /// Input types that carry a choice list
    pub fn supports_choices(self) -> bool {
        matches!(
            self,
            TokenType::Dropdown
                | TokenType::Multiselect
                | TokenType::Radio
                | TokenType::Checkbox
                | TokenType::Link
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    #[default]
    Global,
    Fieldset,
    Panel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenChoice {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl TokenChoice {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
            is_default: false,
        }
    }

    pub fn default_choice(value: impl Into<String>) -> Self {
        Self {
            is_default: true,
            ..Self::new(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: TokenType,
    #[serde(default)]
    pub default: Option<String>,
    /// Declared default window for `time` inputs, read through `<name>.earliest` / `<name>.latest`
    #[serde(default)]
    pub default_range: Option<TimeRange>,
    #[serde(default)]
    pub choices: Vec<TokenChoice>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub scope: TokenScope,
}

impl TokenDefinition {
    pub fn new(name: impl Into<String>, kind: TokenType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            default_range: None,
            choices: Vec::new(),
            depends: Vec::new(),
            scope: TokenScope::Global,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_choices(mut self, choices: Vec<TokenChoice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn default_choice(&self) -> Option<&TokenChoice> {
        self.choices.iter().find(|c| c.is_default)
    }
}
