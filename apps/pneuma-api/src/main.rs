use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = pneuma_api::Args::parse();
	pneuma_api::run(args).await
}
