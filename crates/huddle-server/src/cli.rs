use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "huddle-server", about = "Huddle video-meeting signaling server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/huddle.toml")]
    pub config: String,
}
