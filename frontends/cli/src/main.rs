use anyhow::Result;
use rolodex_cli::{App, AppConfig, Command, Flow};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    // Logs go to ~/.config/rolodex/rolodex.log or ./rolodex.log so they
    // don't interleave with the prompt
    let log_file_path = if let Some(home) = std::env::var_os("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("rolodex");
        std::fs::create_dir_all(&path).ok();
        path.push("rolodex.log");
        path
    } else {
        PathBuf::from("rolodex.log")
    };

    let log_file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Warning: Could not open log file {:?} ({}), logging disabled",
                log_file_path, e
            );
            return;
        }
    };

    // Default to INFO level, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    // Simple argument parsing: --config <path>, --memory
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut force_memory = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => config_path = args.next().map(PathBuf::from),
            "--memory" | "-m" => force_memory = true,
            other => anyhow::bail!(
                "unknown argument '{}' (expected --config <path> or --memory)",
                other
            ),
        }
    }

    let config = AppConfig::load(config_path.as_deref())?;
    let app = App::from_config(config, force_memory)?;

    println!("rolodex - type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match app.execute(command, &mut stdout).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(())
}
