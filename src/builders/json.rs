//! Plain JSON client configuration builder.
//!
//! The template is a skeleton: an array of client config blocks (a single
//! object is accepted as one block). Every block is emitted once per
//! server with the server and user fields patched in.

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{is_dns_placeholder, BuildError, ConfigBuilder, TemplateError};
use crate::model::{Server, UserInfo};
use crate::obfuscation::PathGenerator;

type Block = Map<String, Value>;

/// Validated JSON skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonTemplate {
    blocks: Vec<Block>,
}

impl JsonTemplate {
    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_str(content).map_err(|e| TemplateError::Syntax {
            kind: "json",
            message: e.to_string(),
        })?;

        let blocks = match value {
            Value::Object(block) => vec![block],
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(block) => Ok(block),
                    other => Err(TemplateError::Invalid(format!(
                        "JSON template blocks must be objects, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(TemplateError::Invalid(
                    "JSON template must be an object or an array of objects".into(),
                ))
            }
        };

        if blocks.is_empty() {
            return Err(TemplateError::MissingSection("config block"));
        }
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Builder for the JSON format.
#[derive(Debug, Clone, Default)]
pub struct JsonBuilder {
    paths: PathGenerator,
}

impl JsonBuilder {
    pub fn new(paths: PathGenerator) -> Self {
        Self { paths }
    }
}

impl ConfigBuilder for JsonBuilder {
    type Template = JsonTemplate;

    fn build(
        &self,
        user: &UserInfo,
        servers: &[Server],
        template: &JsonTemplate,
    ) -> Result<String, BuildError> {
        if servers.is_empty() {
            return Err(BuildError::NoServers);
        }

        let mut used = HashSet::with_capacity(servers.len());
        let mut configs = Vec::with_capacity(servers.len() * template.blocks.len());

        for server in servers {
            let path = if server.is_external() {
                String::new()
            } else {
                format!("/{}", self.paths.generate_into(&mut used)?)
            };
            for block in &template.blocks {
                configs.push(Value::Object(patch_block(block, server, user, &path)));
            }
        }

        serde_json::to_string_pretty(&configs).map_err(|e| BuildError::Failed(e.to_string()))
    }
}

fn patch_block(template: &Block, server: &Server, user: &UserInfo, path: &str) -> Block {
    let mut block = template.clone();

    let remarks = match block.get("remarks") {
        Some(Value::String(original)) => format!("{} | {}", server.description, original),
        _ => format!("{} | ", server.description),
    };
    block.insert("remarks".into(), Value::String(remarks));

    if !server.dns_hint.is_empty() {
        if let Some(Value::Array(dns_servers)) = block
            .get_mut("dns")
            .and_then(|dns| dns.get_mut("servers"))
        {
            for entry in dns_servers.iter_mut() {
                if entry.as_str().is_some_and(is_dns_placeholder) {
                    *entry = Value::String(server.dns_hint.clone());
                }
            }
        }
    }

    if let Some(Value::Array(outbounds)) = block.get_mut("outbounds") {
        for outbound in outbounds.iter_mut() {
            patch_outbound(outbound, server, user, path);
        }
    }

    block
}

fn patch_outbound(outbound: &mut Value, server: &Server, user: &UserInfo, path: &str) {
    if let Some(Value::Array(vnext)) = outbound
        .get_mut("settings")
        .and_then(|s| s.get_mut("vnext"))
    {
        for entry in vnext.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(Value::Array(users)) = entry.get_mut("users") {
                for u in users.iter_mut().filter_map(Value::as_object_mut) {
                    u.insert(
                        "id".into(),
                        Value::String(server.effective_id(&user.identity).to_string()),
                    );
                }
            }

            let unset = match entry.get("address") {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty() || s.eq_ignore_ascii_case("null"),
                Some(_) => false,
            };
            if unset {
                entry.insert("address".into(), Value::String(server.host.clone()));
            }
        }
    }

    let Some(stream) = outbound.get_mut("streamSettings").and_then(Value::as_object_mut) else {
        return;
    };
    let is_reality = stream
        .get("security")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("reality"));
    if !is_reality {
        return;
    }
    let Some(reality) = stream.get_mut("realitySettings").and_then(Value::as_object_mut) else {
        return;
    };

    reality.insert("serverName".into(), Value::String(server.sni.clone()));
    reality.insert(
        "shortId".into(),
        Value::String(server.effective_short_id(&user.short_id).to_string()),
    );
    reality.insert("spiderX".into(), Value::String(path.to_string()));
    if !server.public_key.is_empty() {
        reality.insert("password".into(), Value::String(server.public_key.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::fixtures;
    use serde_json::json;

    fn template() -> JsonTemplate {
        let skeleton = json!([{
            "remarks": "main",
            "dns": {"servers": ["DNS_PLACEHOLDER", "8.8.8.8"]},
            "outbounds": [{
                "protocol": "vless",
                "settings": {"vnext": [{
                    "address": null,
                    "port": 443,
                    "users": [{"id": "uuid", "encryption": "none"}]
                }]},
                "streamSettings": {
                    "security": "reality",
                    "realitySettings": {"serverName": "", "shortId": "", "spiderX": ""}
                }
            }, {"protocol": "freedom", "tag": "direct"}]
        }]);
        JsonTemplate::parse(&skeleton.to_string()).unwrap()
    }

    fn build(servers: &[Server]) -> Vec<Value> {
        let out = JsonBuilder::default()
            .build(&fixtures::user(), servers, &template())
            .unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(JsonTemplate::parse(r#"{"a": 1}"#).unwrap().len(), 1);
        assert_eq!(JsonTemplate::parse(r#"[{"a": 1}, {"b": 2}]"#).unwrap().len(), 2);
        assert!(matches!(JsonTemplate::parse("[]"), Err(TemplateError::MissingSection(_))));
        assert!(matches!(JsonTemplate::parse("[1]"), Err(TemplateError::Invalid(_))));
        assert!(matches!(JsonTemplate::parse("\"x\""), Err(TemplateError::Invalid(_))));
        assert!(matches!(JsonTemplate::parse("{"), Err(TemplateError::Syntax { .. })));
    }

    #[test]
    fn test_block_per_server() {
        let mut a = fixtures::server("a.example.com", "A");
        a.dns_hint = "https://dns.example/dns-query".into();
        let configs = build(&[a, fixtures::server("b.example.com", "B")]);
        assert_eq!(configs.len(), 2);

        let first = &configs[0];
        assert_eq!(first["remarks"], "A | main");
        assert_eq!(first["dns"]["servers"], json!(["https://dns.example/dns-query", "8.8.8.8"]));

        let vnext = &first["outbounds"][0]["settings"]["vnext"][0];
        assert_eq!(vnext["address"], "a.example.com");
        assert_eq!(vnext["users"][0]["id"], "550e8400-e29b-41d4-a716-446655440001");

        let reality = &first["outbounds"][0]["streamSettings"]["realitySettings"];
        assert_eq!(reality["serverName"], "sni.a.example.com");
        assert_eq!(reality["shortId"], "aabbccdd");
        assert_eq!(reality["password"], "pk-a.example.com");
        assert!(reality["spiderX"].as_str().unwrap().starts_with('/'));

        // no hint: placeholder left alone
        assert_eq!(configs[1]["dns"]["servers"][0], "DNS_PLACEHOLDER");
        assert_ne!(
            configs[0]["outbounds"][0]["streamSettings"]["realitySettings"]["spiderX"],
            configs[1]["outbounds"][0]["streamSettings"]["realitySettings"]["spiderX"]
        );
    }

    #[test]
    fn test_external_server() {
        let configs = build(&[fixtures::external("x.example.com", "X")]);
        let reality = &configs[0]["outbounds"][0]["streamSettings"]["realitySettings"];
        assert_eq!(reality["spiderX"], "");
        assert_eq!(reality["shortId"], "ext-short");
        assert_eq!(
            configs[0]["outbounds"][0]["settings"]["vnext"][0]["users"][0]["id"],
            "ext-uuid"
        );
    }

    #[test]
    fn test_fixed_address_kept() {
        let template = JsonTemplate::parse(
            r#"{"outbounds": [{"settings": {"vnext": [{"address": "fixed.example.com", "users": []}]}}]}"#,
        )
        .unwrap();
        let out = JsonBuilder::default()
            .build(&fixtures::user(), &[fixtures::server("a", "A")], &template)
            .unwrap();
        let configs: Vec<Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(configs[0]["outbounds"][0]["settings"]["vnext"][0]["address"], "fixed.example.com");
        assert_eq!(configs[0]["remarks"], "A | ");
    }

    #[test]
    fn test_no_servers_is_error() {
        assert!(matches!(
            JsonBuilder::default().build(&fixtures::user(), &[], &template()),
            Err(BuildError::NoServers)
        ));
    }
}
