//! `CREATE VIEW` statements for saving a query as a view.

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct ViewSpec {
    pub project: String,
    pub dataset: String,
    pub name: String,
    pub description: Option<String>,
    pub replace: bool,
}

impl ViewSpec {
    pub fn new(project: &str, dataset: &str, name: &str) -> Result<Self> {
        for (label, value) in [("project", project), ("dataset", dataset), ("view name", name)] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidArgument(format!("{} must not be empty", label)));
            }
            if value.contains('`') {
                return Err(AppError::InvalidArgument(format!(
                    "{} must not contain backticks: {}",
                    label, value
                )));
            }
        }

        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            name: name.to_string(),
            description: None,
            replace: false,
        })
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// `project.dataset.name`
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.name)
    }

    pub fn create_statement(&self, query: &str) -> String {
        let mut statement = if self.replace {
            format!("CREATE OR REPLACE VIEW `{}`", self.full_name())
        } else {
            format!("CREATE VIEW `{}`", self.full_name())
        };

        if let Some(description) = &self.description {
            statement.push_str(&format!(
                "\nOPTIONS(description=\"{}\")",
                escape_string_literal(description)
            ));
        }

        statement.push_str("\nAS\n");
        statement.push_str(query.trim());
        statement
    }

    /// Small query used to check the view works after creating it
    pub fn sample_query(&self) -> String {
        format!("SELECT * FROM `{}` LIMIT 5", self.full_name())
    }
}

fn escape_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
