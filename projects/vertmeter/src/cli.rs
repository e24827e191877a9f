use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON settings file
    #[arg(long, global = true, env = "VERTMETER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Frame rate for stepping and frame numbers (defaults to the settings value)
    #[arg(long, global = true, env = "VERTMETER_FPS")]
    pub fps: Option<f64>,

    /// Standing reach in centimetres
    #[arg(long, global = true, env = "VERTMETER_STANDING_REACH")]
    pub reach: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute a jump from a takeoff and a landing mark
    Calculate {
        /// Takeoff mark (seconds, or frame index with --frames)
        #[arg(long, allow_negative_numbers = true)]
        start: f64,

        /// Landing mark (seconds, or frame index with --frames)
        #[arg(long, allow_negative_numbers = true)]
        end: f64,

        /// Interpret marks as frame indices at --fps
        #[arg(long)]
        frames: bool,

        /// Print the measurement snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate the frame rate of an extracted frame sequence
    EstimateFps {
        /// Directory of extracted frame images
        #[arg(long, env = "VERTMETER_FRAMES_DIR")]
        frames_dir: PathBuf,

        /// Rate the frames were extracted at
        #[arg(long, default_value_t = 30.0)]
        source_fps: f64,
    },

    /// Drive a measurement session from a command script
    Session {
        /// Directory of extracted frame images
        #[arg(long, env = "VERTMETER_FRAMES_DIR")]
        frames_dir: PathBuf,

        /// Rate the frames were extracted at
        #[arg(long, default_value_t = 30.0)]
        source_fps: f64,

        /// Script file; reads stdin when omitted
        #[arg(long)]
        script: Option<PathBuf>,

        /// Where exported images are saved
        #[arg(long, env = "VERTMETER_OUTPUT_ROOT", default_value = ".")]
        output_root: PathBuf,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
