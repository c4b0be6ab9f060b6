mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Commands};
use leafwatch::{batch, server};
use tracing::Level;

#[tokio::main]
async fn main() {
  let args = Args::parse();

  tracing_subscriber::fmt()
    .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  if let Err(e) = run(args.command).await {
    eprintln!("Error: {:#}", e);
    std::process::exit(1);
  }
}

async fn run(command: Commands) -> Result<()> {
  match command {
    Commands::Version => {
      println!("leafwatch {}", env!("CARGO_PKG_VERSION"));
    }
    Commands::Serve(serve) => {
      server::serve(serve.into_options()).await?;
    }
    Commands::Classify(classify) => {
      let options = classify.into_options();
      let top = options.top;
      let report = tokio::task::spawn_blocking(move || batch::run(options))
        .await
        .context("Classification task panicked")??;

      print!("{}", report.render(top));
      if report.images.is_empty() {
        bail!("No image could be classified");
      }
    }
  }
  Ok(())
}
