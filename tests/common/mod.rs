//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sub_stub::config::{AppConfig, CustomHeaderConfig};
use sub_stub::{CacheSet, ConfigService, HttpServer, Shutdown};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SECRET: &str = "s3cret";

pub const USERS: &str = "\
# identity | short_id | link | label | groups | template
550e8400-e29b-41d4-a716-446655440001|a1b2c3d4|alice|Alice|premium,staff|alice.yaml
550e8400-e29b-41d4-a716-446655440002|b2c3d4e5|bob|Bob||
550e8400-e29b-41d4-a716-446655440003|c3d4e5f6|dave|Dave|default|gone.yaml
";

pub const SERVERS: &str = "\
# host | sni | dns | pbk | description | groups | type | id | short
de.example.net|www.microsoft.com|1.1.1.1|pbk-de|Germany||internal
nl.example.net|www.apple.com||pbk-nl|Netherlands|premium|internal
partner.example.org|cdn.partner.org||pbk-ext|Partner|premium|external|ext-uuid|ext-sid
";

pub const RULE_TEMPLATE: &str = "\
mixed-port: 7890
dns:
  nameserver:
    - DNS_PLACEHOLDER
proxy-template:
  type: vless
  port: 443
  network: tcp
  tls: true
  flow: xtls-rprx-vision
  reality-opts: {}
proxy-groups:
  - name: PROXY
    type: select
    proxies: __PROXY_NAMES__
rules:
  - MATCH,PROXY
";

pub const URI_TEMPLATE: &str = "\
# one line per protocol
vless://<ID>@<ADDRESS>:443?security=reality&sni=<SERVERNAME>&pbk=<PBK>&sid=<SHORTID>&spx=<SPIDERX>&flow=xtls-rprx-vision#<NAME>
";

pub const JSON_TEMPLATE: &str = r#"{
  "remarks": "reality",
  "dns": { "servers": ["DNS_PLACEHOLDER", "8.8.8.8"] },
  "outbounds": [
    {
      "protocol": "vless",
      "settings": { "vnext": [ { "address": null, "port": 443, "users": [ { "id": "", "flow": "xtls-rprx-vision" } ] } ] },
      "streamSettings": { "security": "reality", "realitySettings": { "fingerprint": "chrome" } }
    }
  ]
}"#;

/// A data directory with users, servers and templates.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("templates/custom")).unwrap();
        fs::write(root.join("users"), USERS).unwrap();
        fs::write(root.join("servers"), SERVERS).unwrap();
        fs::write(root.join("templates/mihomo-template.yaml"), RULE_TEMPLATE).unwrap();
        fs::write(
            root.join("templates/custom/alice.yaml"),
            RULE_TEMPLATE.replace("MATCH,PROXY", "MATCH,DIRECT"),
        )
        .unwrap();
        fs::write(root.join("templates/v2ray-url-template.txt"), URI_TEMPLATE).unwrap();
        fs::write(root.join("templates/v2ray-template.json"), JSON_TEMPLATE).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.http.secret_path = SECRET.to_string();
        config.paths.base_dir = self.root().to_path_buf();
        config.http.custom_headers = vec![CustomHeaderConfig {
            name: "routing".into(),
            value: "happ://routing/onadd".into(),
            user_agent: Some(r"Happ/\d+\.\d+\.\d+".into()),
        }];
        config
    }

    pub fn service(&self) -> ConfigService {
        ConfigService::from_config(&self.config(), Arc::new(CacheSet::new())).unwrap()
    }
}

/// A server running on an ephemeral loopback port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}/{}", self.addr, SECRET, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn start_server(fixture: &Fixture) -> RunningServer {
    let config = fixture.config();
    let service = Arc::new(fixture.service());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, service).unwrap();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    RunningServer {
        addr,
        shutdown,
        handle,
    }
}
