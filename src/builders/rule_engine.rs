//! Rule-engine (Clash/Mihomo) YAML builder.
//!
//! The template is a YAML mapping with one `proxy-template` stanza. Each
//! visible server gets a copy of the stanza in `proxies`, at the position
//! the stanza had in the template. Any `__PROXY_NAMES__` marker elsewhere
//! in the document is replaced by the generated proxy names.

use serde_yaml::{Mapping, Value};
use std::collections::HashSet;

use super::{is_dns_placeholder, BuildError, ConfigBuilder, TemplateError};
use crate::model::{Server, UserInfo};

pub const PROXY_TEMPLATE_KEY: &str = "proxy-template";
pub const PROXIES_KEY: &str = "proxies";
pub const PROXY_NAMES_MARKER: &str = "__PROXY_NAMES__";
const REALITY_OPTS_KEY: &str = "reality-opts";

/// Validated rule-engine template.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTemplate {
    document: Mapping,
    stanza: Mapping,
    has_names_marker: bool,
}

impl RuleTemplate {
    /// Parse and validate template text.
    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| TemplateError::Syntax {
            kind: "rule-engine",
            message: e.to_string(),
        })?;

        let Value::Mapping(document) = value else {
            return Err(TemplateError::Invalid(
                "rule-engine template must be a mapping".into(),
            ));
        };

        let stanza = match document.get(PROXY_TEMPLATE_KEY) {
            Some(Value::Mapping(stanza)) => stanza.clone(),
            _ => return Err(TemplateError::MissingSection(PROXY_TEMPLATE_KEY)),
        };

        let has_names_marker = document
            .iter()
            .filter(|(k, _)| k.as_str() != Some(PROXY_TEMPLATE_KEY))
            .any(|(_, v)| contains_marker(v));

        Ok(Self {
            document,
            stanza,
            has_names_marker,
        })
    }

    /// Whether the document lists proxy names anywhere.
    pub fn has_names_marker(&self) -> bool {
        self.has_names_marker
    }

    pub fn stanza(&self) -> &Mapping {
        &self.stanza
    }
}

/// Builder for the rule-engine format.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngineBuilder;

impl ConfigBuilder for RuleEngineBuilder {
    type Template = RuleTemplate;

    fn build(
        &self,
        user: &UserInfo,
        servers: &[Server],
        template: &RuleTemplate,
    ) -> Result<String, BuildError> {
        if servers.is_empty() {
            return Err(BuildError::NoServers);
        }

        let names = unique_names(servers);
        let proxies: Vec<Value> = servers
            .iter()
            .zip(&names)
            .map(|(server, name)| Value::Mapping(render_stanza(&template.stanza, server, user, name)))
            .collect();

        let mut proxies = Some(Value::Sequence(proxies));
        let mut output = Mapping::new();
        for (key, value) in &template.document {
            match key.as_str() {
                Some(PROXY_TEMPLATE_KEY) => {
                    if let Some(p) = proxies.take() {
                        output.insert(key_of(PROXIES_KEY), p);
                    }
                }
                // the template's own list, if any, is replaced
                Some(PROXIES_KEY) => {}
                _ => {
                    output.insert(key.clone(), substitute_names(value.clone(), &names));
                }
            }
        }

        serde_yaml::to_string(&Value::Mapping(output)).map_err(|e| BuildError::Failed(e.to_string()))
    }
}

/// Display names in server order, disambiguated with a ` (n)` suffix.
pub fn unique_names(servers: &[Server]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(servers.len());
    let mut names = Vec::with_capacity(servers.len());

    for server in servers {
        let base = &server.description;
        let mut name = base.clone();
        let mut index = 2;
        while seen.contains(&name) {
            name = format!("{base} ({index})");
            index += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

fn key_of(name: &str) -> Value {
    Value::String(name.to_string())
}

fn render_stanza(stanza: &Mapping, server: &Server, user: &UserInfo, name: &str) -> Mapping {
    let mut proxy = stanza.clone();

    if !server.dns_hint.is_empty() {
        for (_, value) in proxy.iter_mut() {
            replace_dns_placeholders(value, &server.dns_hint);
        }
    }

    proxy.insert(key_of("name"), key_of(name));
    proxy.insert(key_of("server"), key_of(&server.host));
    proxy.insert(key_of("uuid"), key_of(server.effective_id(&user.identity)));
    proxy.insert(key_of("servername"), key_of(&server.sni));

    if let Some(Value::Mapping(opts)) = proxy.get_mut(REALITY_OPTS_KEY) {
        opts.insert(
            key_of("short-id"),
            key_of(server.effective_short_id(&user.short_id)),
        );
        if !server.public_key.is_empty() {
            opts.insert(key_of("public-key"), key_of(&server.public_key));
        }
    }

    proxy
}

fn replace_dns_placeholders(value: &mut Value, hint: &str) {
    match value {
        Value::String(s) if is_dns_placeholder(s) => *s = hint.to_string(),
        Value::Sequence(items) => items
            .iter_mut()
            .for_each(|v| replace_dns_placeholders(v, hint)),
        Value::Mapping(map) => map
            .iter_mut()
            .for_each(|(_, v)| replace_dns_placeholders(v, hint)),
        _ => {}
    }
}

fn is_marker(value: &Value) -> bool {
    value.as_str() == Some(PROXY_NAMES_MARKER)
}

fn contains_marker(value: &Value) -> bool {
    match value {
        Value::Sequence(items) => items.iter().any(contains_marker),
        Value::Mapping(map) => map.iter().any(|(_, v)| contains_marker(v)),
        other => is_marker(other),
    }
}

/// Replace markers: a scalar marker becomes the name list, a marker inside a
/// list is spliced in place.
fn substitute_names(value: Value, names: &[String]) -> Value {
    match value {
        v if is_marker(&v) => Value::Sequence(names.iter().cloned().map(Value::String).collect()),
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len() + names.len());
            for item in items {
                if is_marker(&item) {
                    out.extend(names.iter().cloned().map(Value::String));
                } else {
                    out.push(substitute_names(item, names));
                }
            }
            Value::Sequence(out)
        }
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, substitute_names(v, names)))
                .collect(),
        ),
        other => other,
    }
}
