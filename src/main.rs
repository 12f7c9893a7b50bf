use anyhow::Result;
use clap::Parser;
use colored::Colorize;

#[cfg(feature = "cli")]
use geotrace::cli::commands::{analyze, config_generate};
use geotrace::cli::{Cli, Commands, ConfigCommands};
use geotrace::config::{StaticConfig, get_config, init_config_from};
use geotrace::errors::GeoTraceError;
#[cfg(feature = "server")]
use geotrace::runtime::run_server;
use geotrace::system::init_logging;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // 生成配置不需要加载配置
    if let Some(Commands::Config {
        action: ConfigCommands::Generate { output_path, force },
    }) = cli.command
    {
        return generate_config(output_path, force);
    }

    init_config_from(cli.config.as_deref());
    let config = get_config();
    exit_on_error(config.validate())?;

    match cli.command {
        Some(Commands::Analyze { ips, json }) => {
            // CLI 输出走 stdout，日志只保留警告
            let mut logging = config.logging.clone();
            logging.level = "warn".to_string();
            let _guard = init_logging(&logging)?;
            run_analyze(&config, &ips, json).await
        }
        _ => {
            let _guard = init_logging(&config.logging)?;
            serve(&config).await
        }
    }
}

#[cfg(feature = "cli")]
fn generate_config(output_path: Option<String>, force: bool) -> Result<()> {
    exit_on_error(config_generate(output_path, force))
}

#[cfg(not(feature = "cli"))]
fn generate_config(_output_path: Option<String>, _force: bool) -> Result<()> {
    exit_on_error(Err(missing_feature("cli")))
}

#[cfg(feature = "cli")]
async fn run_analyze(config: &StaticConfig, ips: &[String], json: bool) -> Result<()> {
    exit_on_error(analyze(config, ips, json).await)
}

#[cfg(not(feature = "cli"))]
async fn run_analyze(_config: &StaticConfig, _ips: &[String], _json: bool) -> Result<()> {
    exit_on_error(Err(missing_feature("cli")))
}

#[cfg(feature = "server")]
async fn serve(config: &StaticConfig) -> Result<()> {
    run_server(config).await
}

#[cfg(not(feature = "server"))]
async fn serve(_config: &StaticConfig) -> Result<()> {
    exit_on_error(Err(missing_feature("server")))
}

#[cfg(not(all(feature = "cli", feature = "server")))]
fn missing_feature(name: &str) -> GeoTraceError {
    GeoTraceError::validation(format!(
        "geotrace was built without the `{}` feature",
        name
    ))
}

fn exit_on_error(result: Result<(), GeoTraceError>) -> Result<()> {
    if let Err(e) = result {
        eprintln!("{}", e.format_colored());
        eprintln!("{}", "Run with --help for usage.".dimmed());
        std::process::exit(1);
    }
    Ok(())
}
