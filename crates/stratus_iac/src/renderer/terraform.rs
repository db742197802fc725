//! Terraform HCL renderer.
//!
//! Output follows `terraform fmt` conventions: two-space indentation and
//! `=` aligned across consecutive single-line attributes. Nested blocks
//! come after attributes, separated by a blank line.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::error::{IacError, IacResult};
use crate::mapper::{ConfigValue, MappedResource, Output, ProviderConfig, Variable};
use crate::options::OutputFormat;

use super::IacRenderer;

/// Lists longer than this are written one item per line.
const INLINE_LIST_WIDTH: usize = 80;

/// Declarations found in an HCL document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HclSummary {
    /// Resource addresses, `<type>.<name>`.
    pub resources: Vec<String>,
    pub variables: Vec<String>,
    pub outputs: Vec<String>,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Brace,
    Bracket,
    Paren,
    /// `${` or `%{` inside a string.
    Template,
}

impl Open {
    fn symbol(&self) -> &'static str {
        match self {
            Open::Brace => "{",
            Open::Bracket => "[",
            Open::Paren => "(",
            Open::Template => "${",
        }
    }
}

pub struct TerraformRenderer {
    required_version: String,
}

impl TerraformRenderer {
    pub fn new() -> Self {
        Self {
            required_version: ">= 1.5.0".to_string(),
        }
    }

    pub fn with_required_version(mut self, constraint: impl Into<String>) -> Self {
        self.required_version = constraint.into();
        self
    }

    /// List top-level declarations.
    pub fn summarize(&self, content: &str) -> IacResult<HclSummary> {
        let resource_re = Regex::new(r#"(?m)^\s*resource\s+"([^"]+)"\s+"([^"]+)""#)?;
        let variable_re = Regex::new(r#"(?m)^\s*variable\s+"([^"]+)""#)?;
        let output_re = Regex::new(r#"(?m)^\s*output\s+"([^"]+)""#)?;
        let provider_re = Regex::new(r#"(?m)^\s*provider\s+"([^"]+)""#)?;

        let names = |re: &Regex| -> Vec<String> {
            re.captures_iter(content).map(|c| c[1].to_string()).collect()
        };

        Ok(HclSummary {
            resources: resource_re
                .captures_iter(content)
                .map(|c| format!("{}.{}", &c[1], &c[2]))
                .collect(),
            variables: names(&variable_re),
            outputs: names(&output_re),
            providers: names(&provider_re),
        })
    }

    fn render_value(&self, value: &ConfigValue, depth: usize) -> IacResult<String> {
        match value {
            ConfigValue::String(s) => Ok(quote(s)),
            ConfigValue::Int(i) => Ok(i.to_string()),
            ConfigValue::Float(f) if f.is_finite() => Ok(f.to_string()),
            ConfigValue::Float(f) => Err(IacError::Render(format!("cannot render number {}", f))),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            ConfigValue::Reference(expr) if expr.trim().is_empty() => {
                Err(IacError::Render("empty reference expression".to_string()))
            }
            ConfigValue::Reference(expr) => Ok(expr.clone()),
            ConfigValue::List(items) => self.render_list(items, depth),
            ConfigValue::Map(entries) | ConfigValue::Block(entries) => self.render_object(entries, depth),
        }
    }

    fn render_list(&self, items: &[ConfigValue], depth: usize) -> IacResult<String> {
        if items.is_empty() {
            return Ok("[]".to_string());
        }

        let rendered = items
            .iter()
            .map(|item| self.render_value(item, depth + 1))
            .collect::<IacResult<Vec<_>>>()?;

        let inline = format!("[{}]", rendered.join(", "));
        if !inline.contains('\n') && inline.len() <= INLINE_LIST_WIDTH {
            return Ok(inline);
        }

        let mut out = String::from("[\n");
        for item in rendered {
            out.push_str(&format!("{}{},\n", indent(depth + 1), item));
        }
        out.push_str(&indent(depth));
        out.push(']');
        Ok(out)
    }

    fn render_object(&self, entries: &BTreeMap<String, ConfigValue>, depth: usize) -> IacResult<String> {
        if entries.is_empty() {
            return Ok("{}".to_string());
        }

        let rendered = entries
            .iter()
            .map(|(k, v)| Ok((format_key(k), self.render_value(v, depth + 1)?)))
            .collect::<IacResult<Vec<_>>>()?;

        let mut out = String::from("{\n");
        write_attributes(&mut out, &rendered, depth + 1);
        out.push_str(&indent(depth));
        out.push('}');
        Ok(out)
    }

    /// Attributes first, aligned, then nested blocks.
    fn write_body(&self, out: &mut String, entries: &[(String, ConfigValue)], depth: usize) -> IacResult<()> {
        let (blocks, attributes): (Vec<_>, Vec<_>) = entries
            .iter()
            .partition(|(_, v)| v.is_block() || v.is_block_list());

        let rendered = attributes
            .iter()
            .map(|(k, v)| Ok((format_key(k), self.render_value(v, depth)?)))
            .collect::<IacResult<Vec<_>>>()?;
        write_attributes(out, &rendered, depth);

        let mut wrote_any = !rendered.is_empty();
        for (key, value) in blocks {
            let items: Vec<&BTreeMap<String, ConfigValue>> = match value {
                ConfigValue::Block(body) => vec![body],
                ConfigValue::List(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        ConfigValue::Block(body) => Some(body),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };

            for body in items {
                if wrote_any {
                    out.push('\n');
                }
                let body: Vec<(String, ConfigValue)> =
                    body.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                self.write_block(out, key, &body, depth)?;
                wrote_any = true;
            }
        }
        Ok(())
    }

    fn write_block(
        &self,
        out: &mut String,
        header: &str,
        body: &[(String, ConfigValue)],
        depth: usize,
    ) -> IacResult<()> {
        let pad = indent(depth);
        if body.is_empty() {
            out.push_str(&format!("{}{} {{}}\n", pad, header));
            return Ok(());
        }

        out.push_str(&format!("{}{} {{\n", pad, header));
        self.write_body(out, body, depth + 1)?;
        out.push_str(&format!("{}}}\n", pad));
        Ok(())
    }
}

impl Default for TerraformRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl IacRenderer for TerraformRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Hcl
    }

    fn extension(&self) -> &'static str {
        "tf"
    }

    fn render_resource(&self, resource: &MappedResource) -> IacResult<String> {
        let header = format!(
            "resource {} {}",
            quote(&resource.resource_type),
            quote(&resource.resource_name)
        );

        let mut out = String::new();
        out.push_str(&format!("{} {{\n", header));
        if let Some(alias) = &resource.provider_alias {
            out.push_str(&format!(
                "  provider = {}.{}\n",
                resource.provider().terraform_name(),
                alias
            ));
            if !resource.configuration.is_empty() {
                out.push('\n');
            }
        }

        let body: Vec<(String, ConfigValue)> = resource
            .configuration
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.write_body(&mut out, &body, 1)
            .map_err(|e| IacError::Render(format!("{}: {}", resource.address(), e)))?;
        out.push_str("}\n");
        Ok(out)
    }

    fn render_provider(&self, config: &ProviderConfig) -> IacResult<String> {
        let mut body = Vec::new();
        if let Some(alias) = &config.alias {
            body.push(("alias".to_string(), ConfigValue::String(alias.clone())));
        }
        if let Some(key) = config.region_key.as_ref().filter(|_| !config.region.is_empty()) {
            body.push((key.clone(), ConfigValue::String(config.region.clone())));
        }
        body.extend(config.settings.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut out = String::new();
        self.write_block(&mut out, &format!("provider {}", quote(&config.name)), &body, 0)?;
        Ok(out)
    }

    fn render_variables(&self, variables: &BTreeMap<String, Variable>) -> IacResult<String> {
        let mut blocks = Vec::with_capacity(variables.len());
        for (name, variable) in variables {
            let mut body = Vec::new();
            if !variable.description.is_empty() {
                body.push(("description".to_string(), ConfigValue::String(variable.description.clone())));
            }
            body.push(("type".to_string(), ConfigValue::reference(variable.var_type.clone())));
            match (&variable.default, variable.required) {
                (Some(default), _) => body.push(("default".to_string(), default.clone())),
                (None, false) => body.push(("default".to_string(), ConfigValue::reference("null"))),
                (None, true) => {}
            }
            if variable.sensitive {
                body.push(("sensitive".to_string(), ConfigValue::Bool(true)));
            }

            let mut out = String::new();
            self.write_block(&mut out, &format!("variable {}", quote(name)), &body, 0)?;
            blocks.push(out);
        }
        Ok(blocks.join("\n"))
    }

    fn render_outputs(&self, outputs: &BTreeMap<String, Output>) -> IacResult<String> {
        let mut blocks = Vec::with_capacity(outputs.len());
        for (name, output) in outputs {
            let mut body = Vec::new();
            if !output.description.is_empty() {
                body.push(("description".to_string(), ConfigValue::String(output.description.clone())));
            }
            body.push(("value".to_string(), output.value.clone()));
            if output.sensitive {
                body.push(("sensitive".to_string(), ConfigValue::Bool(true)));
            }

            let mut out = String::new();
            self.write_block(&mut out, &format!("output {}", quote(name)), &body, 0)?;
            blocks.push(out);
        }
        Ok(blocks.join("\n"))
    }

    fn render_versions(&self, providers: &[ProviderConfig]) -> IacResult<String> {
        let mut required = BTreeMap::new();
        for config in providers {
            required.entry(config.name.clone()).or_insert_with(|| {
                ConfigValue::Map(BTreeMap::from([
                    ("source".to_string(), ConfigValue::String(config.source.clone())),
                    ("version".to_string(), ConfigValue::String(config.version.clone())),
                ]))
            });
        }

        let mut body = vec![(
            "required_version".to_string(),
            ConfigValue::String(self.required_version.clone()),
        )];
        if !required.is_empty() {
            body.push(("required_providers".to_string(), ConfigValue::Block(required)));
        }

        let mut out = String::new();
        self.write_block(&mut out, "terraform", &body, 0)?;
        Ok(out)
    }

    fn comment(&self, text: &str) -> String {
        format!("# {}", text)
    }

    fn validate_syntax(&self, content: &str) -> IacResult<()> {
        check_structure(content)?;

        let summary = self.summarize(content)?;
        let mut seen = HashSet::new();
        for address in &summary.resources {
            if !seen.insert(address.as_str()) {
                let line = declaration_line(content, address).unwrap_or(0);
                return Err(IacError::Syntax {
                    line,
                    message: format!("duplicate resource {}", address),
                });
            }
        }
        Ok(())
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Write `key = value` lines, aligning `=` within runs of single-line values.
fn write_attributes(out: &mut String, rendered: &[(String, String)], depth: usize) {
    let pad = indent(depth);
    let mut i = 0;
    while i < rendered.len() {
        if rendered[i].1.contains('\n') {
            out.push_str(&format!("{}{} = {}\n", pad, rendered[i].0, rendered[i].1));
            i += 1;
            continue;
        }

        let start = i;
        while i < rendered.len() && !rendered[i].1.contains('\n') {
            i += 1;
        }
        let width = rendered[start..i]
            .iter()
            .map(|(k, _)| k.chars().count())
            .max()
            .unwrap_or(0);
        for (key, value) in &rendered[start..i] {
            out.push_str(&format!("{}{:<width$} = {}\n", pad, key, value, width = width));
        }
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn format_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Quoted HCL string literal. Template sequences are escaped so values are
/// never interpolated.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn declaration_line(content: &str, address: &str) -> Option<usize> {
    let (resource_type, name) = address.split_once('.')?;
    let needle = format!("\"{}\" \"{}\"", resource_type, name);
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.trim_start().starts_with("resource") && line.contains(&needle))
        .nth(1)
        .map(|(i, _)| i + 1)
}

/// Balanced delimiters, closed strings and comments. Heredocs are not
/// recognised.
fn check_structure(content: &str) -> IacResult<()> {
    let mut stack: Vec<(Open, usize)> = Vec::new();
    let mut block_comment: Option<usize> = None;
    let mut in_string = false;

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if block_comment.is_some() {
                if c == '*' && next == Some('/') {
                    block_comment = None;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            if in_string {
                match (c, next) {
                    ('\\', _) => i += 2,
                    ('$', Some('$')) | ('%', Some('%')) if chars.get(i + 2) == Some(&'{') => i += 3,
                    ('$', Some('{')) | ('%', Some('{')) => {
                        stack.push((Open::Template, line_no));
                        in_string = false;
                        i += 2;
                    }
                    ('"', _) => {
                        in_string = false;
                        i += 1;
                    }
                    _ => i += 1,
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                '#' => break,
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => {
                    block_comment = Some(line_no);
                    i += 2;
                    continue;
                }
                '{' => stack.push((Open::Brace, line_no)),
                '[' => stack.push((Open::Bracket, line_no)),
                '(' => stack.push((Open::Paren, line_no)),
                '}' | ']' | ')' => {
                    let Some((open, opened_at)) = stack.pop() else {
                        return Err(IacError::Syntax {
                            line: line_no,
                            message: format!("unexpected '{}'", c),
                        });
                    };
                    let matches = matches!(
                        (open, c),
                        (Open::Brace, '}') | (Open::Template, '}') | (Open::Bracket, ']') | (Open::Paren, ')')
                    );
                    if !matches {
                        return Err(IacError::Syntax {
                            line: line_no,
                            message: format!(
                                "'{}' does not close '{}' opened at line {}",
                                c,
                                open.symbol(),
                                opened_at
                            ),
                        });
                    }
                    if open == Open::Template {
                        in_string = true;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        if in_string {
            return Err(IacError::Syntax {
                line: line_no,
                message: "unterminated string".to_string(),
            });
        }
    }

    if let Some(line) = block_comment {
        return Err(IacError::Syntax {
            line,
            message: "unterminated comment".to_string(),
        });
    }
    if let Some((open, line)) = stack.pop() {
        return Err(IacError::Syntax {
            line,
            message: format!("unclosed '{}'", open.symbol()),
        });
    }
    Ok(())
}
