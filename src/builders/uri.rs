//! URI subscription builder.
//!
//! The template holds one share-URI pattern per protocol, one per line.
//! Placeholders:
//!
//! | marker         | value                                      |
//! |----------------|--------------------------------------------|
//! | `<ID>`         | server identity for the user               |
//! | `<ADDRESS>`    | host                                       |
//! | `<SPIDERX>`    | obfuscation path, percent-encoded          |
//! | `<SHORTID>`    | short id                                   |
//! | `<SERVERNAME>` | SNI, percent-encoded                       |
//! | `<NAME>`       | description, percent-encoded               |
//! | `<PBK>`        | public key                                 |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashSet;

use super::{BuildError, ConfigBuilder, TemplateError};
use crate::model::{Server, UserInfo};
use crate::obfuscation::PathGenerator;

/// Separator between rendered lines.
pub const LINE_SEPARATOR: &str = "\n";

/// One protocol pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriPattern {
    pub scheme: String,
    pub pattern: String,
}

/// Validated URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    patterns: Vec<UriPattern>,
}

impl UriTemplate {
    /// Parse template text; blank lines and `#` comments are ignored.
    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        let mut patterns = Vec::new();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((scheme, _)) = line.split_once("://") else {
                return Err(TemplateError::Invalid(format!(
                    "URI template line has no scheme: {line}"
                )));
            };
            if scheme.is_empty() {
                return Err(TemplateError::Invalid(format!(
                    "URI template line has an empty scheme: {line}"
                )));
            }
            patterns.push(UriPattern {
                scheme: scheme.to_ascii_lowercase(),
                pattern: line.to_string(),
            });
        }

        if patterns.is_empty() {
            return Err(TemplateError::MissingSection("uri pattern"));
        }
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[UriPattern] {
        &self.patterns
    }
}

/// Builder for line-delimited share URIs.
#[derive(Debug, Clone, Default)]
pub struct UriBuilder {
    paths: PathGenerator,
}

impl UriBuilder {
    pub fn new(paths: PathGenerator) -> Self {
        Self { paths }
    }
}

impl ConfigBuilder for UriBuilder {
    type Template = UriTemplate;

    fn build(
        &self,
        user: &UserInfo,
        servers: &[Server],
        template: &UriTemplate,
    ) -> Result<String, BuildError> {
        if servers.is_empty() {
            return Err(BuildError::NoServers);
        }

        // collision domain is this output only
        let mut used = HashSet::with_capacity(servers.len());
        let mut lines = Vec::with_capacity(servers.len() * template.patterns.len());

        for server in servers {
            let path = if server.is_external() {
                String::new()
            } else {
                format!("/{}", self.paths.generate_into(&mut used)?)
            };
            for pattern in &template.patterns {
                lines.push(render(&pattern.pattern, server, user, &path));
            }
        }

        Ok(lines.join(LINE_SEPARATOR))
    }
}

fn render(pattern: &str, server: &Server, user: &UserInfo, path: &str) -> String {
    let replacements = [
        ("<ID>", server.effective_id(&user.identity).to_string()),
        ("<ADDRESS>", server.host.clone()),
        ("<SPIDERX>", urlencoding::encode(path).into_owned()),
        (
            "<SHORTID>",
            server.effective_short_id(&user.short_id).to_string(),
        ),
        ("<SERVERNAME>", urlencoding::encode(&server.sni).into_owned()),
        ("<NAME>", urlencoding::encode(&server.description).into_owned()),
        ("<PBK>", server.public_key.clone()),
    ];

    replacements
        .iter()
        .fold(pattern.to_string(), |link, (marker, value)| link.replace(marker, value))
}

/// Standard padded base64 of the subscription text.
pub fn encode_base64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::fixtures;

    const TEMPLATE: &str = "vless://<ID>@<ADDRESS>:443?encryption=none&security=reality&sni=<SERVERNAME>&pbk=<PBK>&sid=<SHORTID>&spx=<SPIDERX>&type=tcp#<NAME>";

    fn build(servers: &[Server]) -> String {
        let template = UriTemplate::parse(TEMPLATE).unwrap();
        UriBuilder::default()
            .build(&fixtures::user(), servers, &template)
            .unwrap()
    }

    fn spx(line: &str) -> &str {
        let start = line.find("spx=").unwrap() + 4;
        let end = line[start..].find('&').unwrap() + start;
        &line[start..end]
    }

    #[test]
    fn test_parse() {
        let t = UriTemplate::parse("# comment\n\nvless://<ID>@x\nTROJAN://<ID>@y\n").unwrap();
        let schemes: Vec<&str> = t.patterns().iter().map(|p| p.scheme.as_str()).collect();
        assert_eq!(schemes, vec!["vless", "trojan"]);

        assert!(matches!(UriTemplate::parse(""), Err(TemplateError::MissingSection(_))));
        assert!(matches!(UriTemplate::parse("no scheme"), Err(TemplateError::Invalid(_))));
        assert!(matches!(UriTemplate::parse("://x"), Err(TemplateError::Invalid(_))));
    }

    #[test]
    fn test_one_line_per_server() {
        let out = build(&[
            fixtures::server("a.example.com", "Server A"),
            fixtures::server("b.example.com", "Server B"),
        ]);
        let lines: Vec<&str> = out.split(LINE_SEPARATOR).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(
            "vless://550e8400-e29b-41d4-a716-446655440001@a.example.com:443?"
        ));
        assert!(lines[0].contains("sni=sni.a.example.com"));
        assert!(lines[0].contains("pbk=pk-a.example.com"));
        assert!(lines[0].contains("sid=aabbccdd"));
        assert!(lines[0].ends_with("#Server%20A"));
    }

    #[test]
    fn test_obfuscation_paths_unique_within_output() {
        let servers: Vec<Server> = (0..50)
            .map(|i| fixtures::server(&format!("s{i}.example.com"), &format!("S{i}")))
            .collect();
        let out = build(&servers);
        let paths: HashSet<&str> = out.lines().map(spx).collect();
        assert_eq!(paths.len(), 50);
        assert!(paths.iter().all(|p| p.starts_with("%2F")));
    }

    #[test]
    fn test_external_server_has_no_path() {
        let out = build(&[fixtures::external("x.example.com", "X")]);
        assert_eq!(spx(&out), "");
        assert!(out.starts_with("vless://ext-uuid@x.example.com"));
        assert!(out.contains("sid=ext-short"));
    }

    #[test]
    fn test_multiple_protocols() {
        let template = UriTemplate::parse("vless://<ID>@<ADDRESS>\ntrojan://<ID>@<ADDRESS>").unwrap();
        let out = UriBuilder::default()
            .build(&fixtures::user(), &[fixtures::server("a", "A")], &template)
            .unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_exhausted_space_propagates() {
        // 2^1 tokens, safe limit 1: the second internal server cannot get a path
        let builder = UriBuilder::new(PathGenerator::new("ab", 1).unwrap());
        let template = UriTemplate::parse(TEMPLATE).unwrap();
        let err = builder
            .build(
                &fixtures::user(),
                &[fixtures::server("a", "A"), fixtures::server("b", "B")],
                &template,
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::Obfuscation(_)));
    }

    #[test]
    fn test_encode_base64() {
        assert_eq!(encode_base64("vless://a\nvless://b"), "dmxlc3M6Ly9hCnZsZXNzOi8vYg==");
    }
}
