use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sub_stub::builders::rule_engine::PROXY_NAMES_MARKER;
use sub_stub::config::load_config;
use sub_stub::model::groups_summary;
use sub_stub::observability::logging;
use sub_stub::{CacheSet, ConfigService};

#[derive(Parser)]
#[command(name = "substub-cli")]
#[command(about = "Offline tooling for sub-stub data and templates", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "substub.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the config a user would receive
    Render {
        link: String,
        #[arg(default_value = "json")]
        format: String,
    },
    /// List users with their groups
    Users,
    /// List the servers a user can see
    Servers { link: String },
    /// Validate config, data files and every template
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    logging::init_tracing("warn");
    let service = ConfigService::from_config(&config, Arc::new(CacheSet::new()))?;

    match cli.command {
        Commands::Render { link, format } => {
            let rendered = service.get(&link, &format)?;
            if let Some(fallback) = &rendered.template_fallback {
                eprintln!(
                    "warning: template {} unusable ({}), default used",
                    fallback.requested, fallback.reason
                );
            }
            println!("{}", rendered.body);
        }
        Commands::Users => {
            let users = service.users()?;
            println!("{:<20} {:<10} {:<24} {}", "LINK", "ID", "GROUPS", "LABEL");
            for user in users.iter() {
                println!(
                    "{:<20} {:<10} {:<24} {}",
                    user.link_segment,
                    user.identity_hint(),
                    groups_summary(&user.groups, "-"),
                    user.label
                );
            }
        }
        Commands::Servers { link } => {
            let (user, servers) = service.servers_for(&link)?;
            println!("{} ({})", user.label, groups_summary(&user.groups, "-"));
            for server in &servers {
                println!(
                    "  {:<32} {:<9} {:<20} {}",
                    server.host,
                    server.kind.as_str(),
                    groups_summary(&server.groups, "*"),
                    server.description
                );
            }
        }
        Commands::Check => return Ok(check(&service)),
    }

    Ok(ExitCode::SUCCESS)
}

fn check(service: &ConfigService) -> ExitCode {
    let templates = service.templates();
    let mut problems = Vec::new();

    match service.users() {
        Ok(users) => {
            println!("users: {} entries", users.len());
            for user in users.iter() {
                if let Some(name) = user.custom_template.as_deref() {
                    match templates.custom_rule_engine(name) {
                        Ok(t) if !t.has_names_marker() => {
                            println!("note: template {name} has no {PROXY_NAMES_MARKER} marker")
                        }
                        Ok(_) => {}
                        Err(e) => problems
                            .push(format!("user {}: template {name}: {e}", user.link_segment)),
                    }
                }
            }
        }
        Err(e) => problems.push(format!("users: {e}")),
    }
    match service.servers() {
        Ok(servers) if servers.is_empty() => problems.push("servers: registry is empty".into()),
        Ok(servers) => println!("servers: {} entries", servers.len()),
        Err(e) => problems.push(format!("servers: {e}")),
    }

    let paths = templates.paths();
    let results = [
        (&paths.rule_engine, templates.rule_engine().err().map(|e| e.to_string())),
        (&paths.uri, templates.uri().err().map(|e| e.to_string())),
        (&paths.json, templates.json().err().map(|e| e.to_string())),
    ];
    for (path, error) in results {
        match error {
            None => println!("template ok: {}", path.display()),
            Some(e) => problems.push(format!("template {}: {e}", path.display())),
        }
    }
    if templates.rule_engine().is_ok_and(|t| !t.has_names_marker()) {
        println!(
            "note: {} has no {PROXY_NAMES_MARKER} marker, proxy groups list no proxies",
            paths.rule_engine.display()
        );
    }

    if problems.is_empty() {
        println!("all checks passed");
        ExitCode::SUCCESS
    } else {
        for problem in &problems {
            eprintln!("problem: {problem}");
        }
        ExitCode::FAILURE
    }
}
