use crate::protocol::Layer;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayerArg {
    Background,
    Bottom,
    Top,
    Overlay,
}

impl From<LayerArg> for Layer {
    fn from(layer: LayerArg) -> Self {
        match layer {
            LayerArg::Background => Layer::Background,
            LayerArg::Bottom => Layer::Bottom,
            LayerArg::Top => Layer::Top,
            LayerArg::Overlay => Layer::Overlay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Position {
    Top,
    Bottom,
}

impl Default for Position {
    fn default() -> Self {
        Self::Bottom
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub layer: Layer,
    pub namespace: String,
    pub output: Option<String>,
    pub position: Position,
    /// Requested surface size; 0 lets the compositor stretch along anchors.
    pub width: u32,
    pub height: u32,
    pub color: u32,
    pub duration_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layer: Layer::Top,
            namespace: "wlr-interop".to_string(),
            output: None,
            position: Position::Bottom,
            width: 0,
            height: 64,
            color: 0x80_20_20_20,
            duration_secs: 0,
        }
    }
}

#[derive(Parser)]
#[command(name = "wlr-interop-probe")]
#[command(about = "Map a layer surface through the wlr-interop C exports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Layer to place the surface on
    #[arg(short, long, value_enum, default_value = "top")]
    pub layer: LayerArg,

    /// Namespace reported to the compositor
    #[arg(short, long, default_value = "wlr-interop")]
    pub namespace: String,

    /// Output name (e.g. eDP-1); the compositor picks one when omitted
    #[arg(short, long)]
    pub output: Option<String>,

    /// Screen edge to anchor the bar to
    #[arg(short, long, value_enum, default_value = "bottom")]
    pub position: Position,

    /// Surface width in pixels (0 = full width)
    #[arg(short = 'W', long, default_value = "0")]
    pub width: u32,

    /// Surface height in pixels
    #[arg(short = 'H', long, default_value = "64")]
    pub height: u32,

    /// Fill colour as ARGB hex (e.g. 80202020)
    #[arg(short, long, value_parser = parse_color, default_value = "80202020")]
    pub color: u32,

    /// Seconds to keep the surface mapped (0 = exit after the first frame)
    #[arg(short, long, default_value = "0")]
    pub duration: u64,

    /// Quiet mode
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_color(s: &str) -> Result<u32, String> {
    let hex = s.trim_start_matches("0x").trim_start_matches('#');
    if hex.len() != 8 {
        return Err(format!("Colour must be 8 hex digits (AARRGGBB), got: {}", s));
    }
    u32::from_str_radix(hex, 16).map_err(|_| format!("Invalid colour: {}", s))
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = Config::default();
        config.layer = cli.layer.into();
        if !cli.namespace.is_empty() {
            config.namespace = cli.namespace.clone();
        }
        config.output = cli.output.clone();
        config.position = cli.position;
        config.width = cli.width.min(16384);
        config.height = cli.height.clamp(1, 16384);
        config.color = cli.color;
        config.duration_secs = cli.duration.min(3600); // Max 1 hour
        config
    }

    pub fn log_level(cli: &Cli) -> log::LevelFilter {
        if cli.quiet {
            log::LevelFilter::Error
        } else if cli.verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        }
    }
}
