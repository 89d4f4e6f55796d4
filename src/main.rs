mod audio;
mod cli;
mod config;
mod fetch;
mod locator;
mod outcome;
mod pipeline;
mod playback;
mod player;
mod probe;
mod session;
mod shapes;
mod status;
mod tools;
mod types;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::main().await
}
