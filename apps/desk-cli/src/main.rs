use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = desk_cli::Args::parse();

	desk_cli::run(args).await
}
