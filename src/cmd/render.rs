use std::collections::BTreeMap;

use clap::Args;
use serde_json::Value;

use crate::domain::catalog;
use crate::error::AppResult;
use crate::workflow::tickets::{TemplateTicketInput, render_template};

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Template id, see `templates`.
    pub template: String,
    #[arg(short, long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Placeholder value, repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub values: Vec<(String, String)>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn list_templates() {
    for template in catalog::all() {
        println!(
            "{:<28} {:<10} {:<8} {}",
            template.id, template.issue_type, template.priority, template.name
        );
    }
}

pub fn run(args: RenderArgs) -> AppResult<()> {
    let replacements: BTreeMap<String, Value> = args
        .values
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let input = TemplateTicketInput {
        template_id: Some(args.template),
        title: args.title,
        description: args.description,
        replacements,
        ..Default::default()
    };

    let (template, rendered) = render_template(&input)?;
    println!("Template: {} ({})", template.name, template.id);
    println!("Type: {}  Priority: {}", template.issue_type, template.priority);
    if !template.labels.is_empty() {
        println!("Labels: {}", template.labels.join(", "));
    }
    println!("\nSummary: {}\n", rendered.summary);
    println!("{}", rendered.description);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(
            parse_assignment("browser=firefox").unwrap(),
            ("browser".to_string(), "firefox".to_string())
        );
        assert_eq!(
            parse_assignment("url=http://x?a=b").unwrap(),
            ("url".to_string(), "http://x?a=b".to_string())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn renders_known_template() {
        let args = RenderArgs {
            template: "bug-report".to_string(),
            title: Some("Login fails".to_string()),
            description: None,
            values: vec![("browser".to_string(), "webkit".to_string())],
        };
        assert!(run(args).is_ok());
    }

    #[test]
    fn unknown_template_is_an_error() {
        let args = RenderArgs {
            template: "missing".to_string(),
            title: None,
            description: None,
            values: vec![],
        };
        assert!(run(args).is_err());
    }
}
