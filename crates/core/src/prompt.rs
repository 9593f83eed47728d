use crate::error::AgentError;
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub const ASSISTANT_TEMPLATE: &str = "You are Hermes, a helpful assistant. Please answer the user's question as best you can.
Question: {question}
";

pub const DOCUMENT_TEMPLATE: &str = "You are Hermes, a helpful assistant. Answer the question based only on the following context:

{context}

Question: {question}
";

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn from_template(template: impl Into<String>) -> Self {
        let template = template.into();
        let mut variables: Vec<String> = Vec::new();
        for capture in placeholder_re().captures_iter(&template) {
            let name = capture[1].to_string();
            if !variables.contains(&name) {
                variables.push(name);
            }
        }
        Self {
            template,
            variables,
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Substitutes in a single pass, so braces inside values are left alone.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, AgentError> {
        if let Some(missing) = self
            .variables
            .iter()
            .find(|name| !values.iter().any(|(key, _)| *key == name.as_str()))
        {
            return Err(AgentError::MissingVariable(missing.clone()));
        }

        let rendered = placeholder_re().replace_all(&self.template, |capture: &Captures| {
            values
                .iter()
                .find(|(key, _)| *key == &capture[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| capture[0].to_string())
        });
        Ok(rendered.into_owned())
    }
}
