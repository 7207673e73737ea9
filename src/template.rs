//! Template rendering and variable extraction
//!
//! Two placeholder syntaxes are bound to the same variable set:
//!
//! - `{{name}}` - structured syntax, rendered through handlebars
//! - `{name}` - simple brace token
//!
//! Simple tokens naming a known variable are rewritten into structured ones,
//! then the source is rendered once (missing variables become empty strings).
//! If the content is not valid structured syntax the renderer falls back to
//! plain token replacement, which never fails and leaves unknown tokens
//! verbatim. Either way only the template source is scanned for tokens;
//! substituted values are emitted as-is.

use crate::error::{Error, Result};
use crate::types::{Campaign, Vendor};
use handlebars::Handlebars;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Variable name to value map used for rendering
pub type TemplateVariables = BTreeMap<String, String>;

/// Result of checking a template's syntax
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateValidation {
    /// Whether the structured syntax parses
    pub valid: bool,
    /// Referenced variable names (empty when invalid)
    pub variables: Vec<String>,
    /// Parse error, if any
    pub error: Option<String>,
}

/// Result of rendering a template against a vendor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePreview {
    /// Rendered text
    pub rendered_content: String,
    /// Variable names referenced by the template
    pub variables_used: Vec<String>,
    /// False when the structured pass failed and simple substitution was used
    pub success: bool,
    /// Structured-pass error, if any
    pub error: Option<String>,
}

/// Renders `{{name}}` / `{name}` templates
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
    structured_token: Regex,
    simple_token: Regex,
    any_token: Regex,
}

impl TemplateRenderer {
    /// Create a renderer
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);

        let structured_token = Regex::new(r"\{\{\s*([^}]+)\s*\}\}")
            .map_err(|e| Error::Template(format!("invalid token pattern: {e}")))?;
        let simple_token = Regex::new(r"\{([^{}]+)\}")
            .map_err(|e| Error::Template(format!("invalid token pattern: {e}")))?;
        let any_token = Regex::new(r"\{\{([^}]+)\}\}|\{([^{}]+)\}")
            .map_err(|e| Error::Template(format!("invalid token pattern: {e}")))?;

        Ok(Self {
            registry,
            structured_token,
            simple_token,
            any_token,
        })
    }

    /// Render `content` with `variables`
    ///
    /// Pure: the same inputs always produce the same output.
    pub fn render(&self, content: &str, variables: &TemplateVariables) -> String {
        let source = self.bind_simple_tokens(content, variables);
        match self.registry.render_template(&source, variables) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::debug!(error = %e, "structured render failed, using simple substitution");
                self.render_simple(content, variables)
            }
        }
    }

    /// Plain token replacement for both syntaxes; unknown tokens stay verbatim
    pub fn render_simple(&self, content: &str, variables: &TemplateVariables) -> String {
        self.any_token
            .replace_all(content, |caps: &Captures<'_>| {
                let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().trim());
                match name.and_then(|name| variables.get(name)) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// All variable names referenced by `content`, sorted and deduplicated
    ///
    /// Expressions (names containing whitespace, a pipe or a parenthesis) and
    /// block markers (`#if`, `/if`, `else`) are excluded.
    pub fn extract_variables(&self, content: &str) -> BTreeSet<String> {
        self.structured_token
            .captures_iter(content)
            .chain(self.simple_token.captures_iter(content))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|name| is_plain_name(name))
            .map(str::to_string)
            .collect()
    }

    /// Check structured syntax and list referenced variables
    pub fn validate(&self, content: &str) -> TemplateValidation {
        match handlebars::Template::compile(content) {
            Ok(_) => TemplateValidation {
                valid: true,
                variables: self.extract_variables(content).into_iter().collect(),
                error: None,
            },
            Err(e) => TemplateValidation {
                valid: false,
                variables: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Render `content` for a vendor (a built-in sample vendor when `None`)
    pub fn preview(
        &self,
        content: &str,
        vendor: Option<&Vendor>,
        overrides: &TemplateVariables,
    ) -> TemplatePreview {
        let sample;
        let vendor = match vendor {
            Some(vendor) => vendor,
            None => {
                sample = sample_vendor();
                &sample
            }
        };
        let variables = build_variables(vendor, None, overrides);
        let error = handlebars::Template::compile(content)
            .err()
            .map(|e| e.to_string());

        TemplatePreview {
            rendered_content: self.render(content, &variables),
            variables_used: self.extract_variables(content).into_iter().collect(),
            success: error.is_none(),
            error,
        }
    }

    /// Rewrite `{name}` tokens of known variables into `{{name}}`
    ///
    /// Structured tokens are skipped whole, so `{{a}}` never yields an inner `{a}`.
    fn bind_simple_tokens(&self, content: &str, variables: &TemplateVariables) -> String {
        self.any_token
            .replace_all(content, |caps: &Captures<'_>| {
                let known = caps
                    .get(2)
                    .map(|m| m.as_str().trim())
                    .filter(|name| variables.contains_key(*name));
                match known {
                    Some(name) if is_identifier(name) => format!("{{{{{name}}}}}"),
                    Some(name) if !name.contains(']') => format!("{{{{[{name}]}}}}"),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn is_identifier(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(char::is_whitespace)
        && !name.contains('|')
        && !name.contains('(')
        && !name.starts_with(['#', '/', '!', '>', '^'])
        && name != "else"
}

/// Variables derived from a vendor record
///
/// Missing fields map to empty strings. Older templates use `industry_type`,
/// `state` and `business_size`, so those names are provided as aliases.
pub fn vendor_variables(vendor: &Vendor) -> TemplateVariables {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let industry = field(&vendor.industry);
    let region = field(&vendor.region);
    let size_class = field(&vendor.size_class);

    [
        ("vendor_name", vendor.name.clone()),
        ("vendor_code", vendor.code.clone()),
        ("company_name", field(&vendor.company_name)),
        ("contact_person", field(&vendor.contact_person)),
        ("email", field(&vendor.email)),
        ("phone", field(&vendor.phone)),
        ("whatsapp", field(&vendor.whatsapp)),
        ("industry", industry.clone()),
        ("industry_type", industry),
        ("region", region.clone()),
        ("state", region),
        ("size_class", size_class.clone()),
        ("business_size", size_class),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Variables derived from the campaign being executed
pub fn campaign_variables(campaign: &Campaign) -> TemplateVariables {
    let mut vars = TemplateVariables::new();
    vars.insert("campaign_name".to_string(), campaign.name.clone());
    vars.insert(
        "deadline".to_string(),
        campaign
            .deadline
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );
    vars
}

/// Merge variables: vendor-derived, then campaign-derived, then `overrides`
pub fn build_variables(
    vendor: &Vendor,
    campaign: Option<&Campaign>,
    overrides: &TemplateVariables,
) -> TemplateVariables {
    let mut vars = vendor_variables(vendor);
    if let Some(campaign) = campaign {
        vars.extend(campaign_variables(campaign));
    }
    vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars
}

fn sample_vendor() -> Vendor {
    Vendor {
        name: "Sample Vendor".to_string(),
        code: "VEN-0001".to_string(),
        company_name: Some("Sample Industries Pvt Ltd".to_string()),
        contact_person: Some("A. Kumar".to_string()),
        email: Some("vendor@example.com".to_string()),
        phone: Some("9876543210".to_string()),
        whatsapp: Some("9876543210".to_string()),
        industry: Some("Manufacturing".to_string()),
        region: Some("Maharashtra".to_string()),
        size_class: Some("Small".to_string()),
        ..Vendor::default()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new().unwrap()
    }

    fn vars(pairs: &[(&str, &str)]) -> TemplateVariables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extracts_both_syntaxes() {
        let names = renderer().extract_variables("{{a}} {b}");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn renders_both_syntaxes_from_one_variable_set() {
        let out = renderer().render("{{a}} {b}", &vars(&[("a", "X"), ("b", "Y")]));
        assert_eq!(out, "X Y");
        assert!(!out.contains('{') && !out.contains('}'));
    }

    #[test]
    fn extraction_skips_expressions_and_block_markers() {
        let names = renderer().extract_variables(
            "{{ vendor_name }} {{name | upper}} {{ f(x) }} {{#if deadline}}{deadline}{{/if}}",
        );
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["deadline", "vendor_name"]
        );
    }

    #[test]
    fn missing_structured_variable_renders_empty() {
        let out = renderer().render("Dear {{contact_person}},", &TemplateVariables::new());
        assert_eq!(out, "Dear ,");
    }

    #[test]
    fn unknown_simple_token_is_left_verbatim() {
        let out = renderer().render("Hi {name}, see {unknown}", &vars(&[("name", "Ravi")]));
        assert_eq!(out, "Hi Ravi, see {unknown}");
    }

    #[test]
    fn values_are_not_html_escaped() {
        let out = renderer().render("{{company_name}}", &vars(&[("company_name", "R&D <Labs>")]));
        assert_eq!(out, "R&D <Labs>");
    }

    #[test]
    fn tokens_inside_values_are_emitted_literally() {
        let r = renderer();
        let variables = vars(&[
            ("company_name", "ACME {email} {{email}}"),
            ("email", "secret@x.com"),
        ]);

        assert_eq!(
            r.render("Hello {{company_name}}", &variables),
            "Hello ACME {email} {{email}}"
        );
        assert_eq!(
            r.render("Hello {company_name}", &variables),
            "Hello ACME {email} {{email}}"
        );
        // Same guarantee on the fallback path
        assert_eq!(
            r.render("{{#if}} {company_name}", &variables),
            "{{#if}} ACME {email} {{email}}"
        );
    }

    #[test]
    fn syntax_error_falls_back_to_simple_substitution() {
        let r = renderer();
        let content = "Hello {{vendor_name}} {{#if}} {region} {{missing}}";
        let out = r.render(content, &vars(&[("vendor_name", "Acme"), ("region", "Goa")]));
        assert_eq!(out, "Hello Acme {{#if}} Goa {{missing}}");
        assert_eq!(r.render(content, &vars(&[("vendor_name", "Acme"), ("region", "Goa")])), out);
    }

    #[test]
    fn validate_reports_parse_errors() {
        let r = renderer();
        let ok = r.validate("Hi {{vendor_name}} from {state}");
        assert!(ok.valid);
        assert_eq!(ok.variables, vec!["state", "vendor_name"]);

        let bad = r.validate("{{#each items}}unterminated");
        assert!(!bad.valid);
        assert!(bad.variables.is_empty());
        assert!(bad.error.is_some());
    }

    #[test]
    fn caller_variables_override_derived_ones() {
        let vendor = Vendor {
            name: "Acme".into(),
            industry: Some("Textiles".into()),
            ..Vendor::default()
        };
        let merged = build_variables(&vendor, None, &vars(&[("vendor_name", "ACME Corp")]));
        assert_eq!(merged["vendor_name"], "ACME Corp");
        assert_eq!(merged["industry_type"], "Textiles");
        assert_eq!(merged["company_name"], "");
    }

    #[test]
    fn preview_uses_sample_vendor_when_none_given() {
        let preview = renderer().preview("Hello {{vendor_name}}", None, &TemplateVariables::new());
        assert!(preview.success);
        assert_eq!(preview.rendered_content, "Hello Sample Vendor");
        assert_eq!(preview.variables_used, vec!["vendor_name"]);
    }
}
