//! Massilia CLI — EVM assembly optimizer.

use anyhow::Result;
use clap::Parser;
use massilia::asm::{parse_assembly, AssemblyItem};
use massilia::optimizer::optimize_items;
use std::io::{IsTerminal, Read};

#[derive(Parser, Debug)]
#[command(
    name = "massilia",
    version,
    about = "EVM assembly optimizer — common subexpression elimination over basic blocks"
)]
struct Cli {
    /// Read the assembly listing from a file instead of stdin.
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Output format: text (default) or json.
    #[arg(short = 'o', long, default_value = "text")]
    format: String,

    /// Print the item counts before and after optimization to stderr.
    #[arg(short = 's', long)]
    stats: bool,

    /// Raise log verbosity (-v: info, -vv: debug, -vvv: trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let text = if let Some(ref path) = cli.file {
        std::fs::read_to_string(path)?
    } else if std::io::stdin().is_terminal() {
        anyhow::bail!("no assembly provided — pass a file or pipe a listing to stdin");
    } else {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    };

    let items = parse_assembly(&text)?;
    let optimized = optimize_items(&items);

    if cli.stats {
        eprintln!("{} items in, {} items out", items.len(), optimized.len());
    }

    match cli.format.as_str() {
        "json" => {
            let rendered: Vec<AssemblyItem> = optimized;
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        _ => {
            for item in &optimized {
                println!("{item}");
            }
        }
    }

    Ok(())
}
