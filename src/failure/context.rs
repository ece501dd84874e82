use std::fmt;

/// One frame of a failure context: where, inside an index schema, a failure was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextFrame {
    Index(String),
    Field(String),
    Attribute(String),
    DynamicTemplate(String),
    Analyzer(String),
    Normalizer(String),
    Tokenizer(String),
    CharFilter(String),
    TokenFilter(String),
    Alias(String),
    Setting(String),
}

impl ContextFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Index(_) => "index",
            Self::Field(_) => "field",
            Self::Attribute(_) => "attribute",
            Self::DynamicTemplate(_) => "dynamic field template",
            Self::Analyzer(_) => "analyzer",
            Self::Normalizer(_) => "normalizer",
            Self::Tokenizer(_) => "tokenizer",
            Self::CharFilter(_) => "char filter",
            Self::TokenFilter(_) => "token filter",
            Self::Alias(_) => "alias",
            Self::Setting(_) => "setting",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Index(name)
            | Self::Field(name)
            | Self::Attribute(name)
            | Self::DynamicTemplate(name)
            | Self::Analyzer(name)
            | Self::Normalizer(name)
            | Self::Tokenizer(name)
            | Self::CharFilter(name)
            | Self::TokenFilter(name)
            | Self::Alias(name)
            | Self::Setting(name) => name,
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    /// Settings are reported under their fully qualified `index.` key.
    pub fn setting(key: &str) -> Self {
        if key.starts_with("index.") {
            Self::Setting(key.to_owned())
        } else {
            Self::Setting(format!("index.{key}"))
        }
    }
}

impl fmt::Display for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_kind_and_quoted_name() {
        assert_eq!(
            ContextFrame::DynamicTemplate("strings".into()).to_string(),
            "dynamic field template 'strings'"
        );
        assert_eq!(ContextFrame::field("title").to_string(), "field 'title'");
    }

    #[test]
    fn test_setting_is_prefixed_once() {
        assert_eq!(
            ContextFrame::setting("number_of_shards").name(),
            "index.number_of_shards"
        );
        assert_eq!(
            ContextFrame::setting("index.refresh_interval").name(),
            "index.refresh_interval"
        );
    }
}
