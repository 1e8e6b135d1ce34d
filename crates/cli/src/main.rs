use clap::{Parser, Subcommand};
use lib::mcp::{ConnectionManager, ServerConfig, ServerInfo};
use lib::skills::SkillManager;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Tether CLI", long_about = None)]
struct Cli {
    /// Config file path (default: TETHER_CONFIG_PATH or ~/.tether/config.json)
    #[arg(long, short, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, server settings, skills directory).
    Init,

    /// Manage tool-provider servers listed in the settings file.
    Servers {
        #[command(subcommand)]
        action: ServersAction,
    },

    /// Connect every enabled server and list the tools they advertise.
    Tools,

    /// Connect every enabled server and call one tool.
    Call {
        server: String,
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Inspect skills under the skill root.
    Skills {
        #[command(subcommand)]
        action: SkillsAction,
    },
}

#[derive(Subcommand)]
enum ServersAction {
    /// Connect every server and show its status.
    List,
    /// Add (or replace) a server and connect it.
    Add {
        name: String,
        command: String,
        /// Arguments passed to the command.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Environment override, KEY=VALUE (repeatable).
        #[arg(long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
    },
    /// Remove a server.
    Remove { name: String },
    /// Enable a disabled server and connect it.
    Enable { name: String },
    /// Disable a server.
    Disable { name: String },
}

#[derive(Subcommand)]
enum SkillsAction {
    /// Discover skills (frontmatter only).
    List,
    /// Print a skill's full instructions.
    Show { name: String },
    /// Print one resource file of a skill.
    Resource { name: String, path: String },
    /// Check every skill directory and report problems.
    Validate,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("tether {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => run_init(cli.config),
        Some(Commands::Servers { action }) => run_servers(cli.config, action).await,
        Some(Commands::Tools) => run_tools(cli.config).await,
        Some(Commands::Call { server, tool, args }) => run_call(cli.config, server, tool, args).await,
        Some(Commands::Skills { action }) => run_skills(cli.config, action).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn load_manager(config_path: Option<PathBuf>) -> anyhow::Result<ConnectionManager> {
    let (config, path) = lib::init::load_initialized(config_path)?;
    Ok(ConnectionManager::from_config(&config, &path))
}

fn load_skills(config_path: Option<PathBuf>) -> anyhow::Result<SkillManager> {
    let (config, path) = lib::init::load_initialized(config_path)?;
    Ok(SkillManager::new(lib::config::resolve_skills_dir(&config, &path)))
}

fn print_server(info: &ServerInfo) {
    let mut line = format!("{} [{}] {}", info.name, info.status, info.config.command);
    if !info.config.args.is_empty() {
        line.push(' ');
        line.push_str(&info.config.args.join(" "));
    }
    println!("{}", line);
    if let Some(err) = &info.error {
        println!("    {}", err);
    }
    for tool in &info.tools {
        println!("    - {}", tool.name);
    }
}

fn parse_env(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|p| {
            p.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("invalid --env '{}', expected KEY=VALUE", p))
        })
        .collect()
}

async fn run_servers(config_path: Option<PathBuf>, action: ServersAction) -> anyhow::Result<()> {
    let manager = load_manager(config_path)?;
    match action {
        ServersAction::List => {
            manager.initialize().await;
            let servers = manager.get_servers().await;
            if servers.is_empty() {
                println!("no servers configured in {}", manager.settings_path().await.display());
            }
            for info in &servers {
                print_server(info);
            }
        }
        ServersAction::Add {
            name,
            command,
            args,
            env,
        } => {
            manager.initialize().await;
            let config = ServerConfig {
                command,
                args,
                env: parse_env(&env)?,
                disabled: false,
            };
            let info = manager.add_server(&name, config).await?;
            print_server(&info);
        }
        ServersAction::Remove { name } => {
            manager.initialize().await;
            if manager.remove_server(&name).await? {
                println!("removed {}", name);
            } else {
                anyhow::bail!("no server named '{}'", name);
            }
        }
        ServersAction::Enable { name } => {
            manager.initialize().await;
            let info = manager.toggle_server(&name, false).await?;
            print_server(&info);
        }
        ServersAction::Disable { name } => {
            manager.initialize().await;
            let info = manager.toggle_server(&name, true).await?;
            print_server(&info);
        }
    }
    manager.shutdown().await;
    Ok(())
}

async fn run_tools(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let manager = load_manager(config_path)?;
    manager.initialize().await;
    for tool in manager.get_all_tools().await {
        match &tool.description {
            Some(d) => println!("{}__{}: {}", tool.server_name, tool.name, d),
            None => println!("{}__{}", tool.server_name, tool.name),
        }
    }
    manager.shutdown().await;
    Ok(())
}

async fn run_call(
    config_path: Option<PathBuf>,
    server: String,
    tool: String,
    args: String,
) -> anyhow::Result<()> {
    let args: serde_json::Value = serde_json::from_str(&args)
        .map_err(|e| anyhow::anyhow!("--args is not valid JSON: {}", e))?;
    let manager = load_manager(config_path)?;
    manager.initialize().await;
    let result = manager.call_tool(&server, &tool, args).await;
    manager.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.is_error() {
        anyhow::bail!("tool call failed");
    }
    Ok(())
}

async fn run_skills(config_path: Option<PathBuf>, action: SkillsAction) -> anyhow::Result<()> {
    let skills = load_skills(config_path)?;
    match action {
        SkillsAction::List => {
            for s in skills.discover_skills().await {
                println!("{}: {}", s.name, s.description);
            }
        }
        SkillsAction::Show { name } => {
            skills.discover_skills().await;
            let Some(skill) = skills.activate_skill(&name).await else {
                anyhow::bail!("skill '{}' not found", name);
            };
            println!("# {}\n\n{}\n", skill.name, skill.description);
            println!("{}", skill.content);
            let resources = skills.list_skill_resources(&name).await;
            if !resources.is_empty() {
                println!("\nResources:");
                for r in resources {
                    println!("  {}", r);
                }
            }
        }
        SkillsAction::Resource { name, path } => {
            skills.discover_skills().await;
            let Some(text) = skills.load_skill_resource(&name, &path).await else {
                anyhow::bail!("resource '{}' of skill '{}' not found", path, name);
            };
            print!("{}", text);
        }
        SkillsAction::Validate => {
            let mut problems = 0;
            let mut entries = tokio::fs::read_dir(skills.root()).await?;
            let mut dirs = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    dirs.push(entry.path());
                }
            }
            dirs.sort();
            for dir in dirs {
                for issue in lib::skills::validate_skill_dir(&dir).await {
                    problems += 1;
                    println!("{}: {}", dir.display(), issue);
                }
            }
            if problems == 0 {
                println!("all skills valid");
            }
        }
    }
    Ok(())
}
