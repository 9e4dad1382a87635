//! `face_crop <image_path>`: crop, normalize and embed the first face in an image.
//!
//! Writes `expanded_cropped_face.jpg` and `processed_face.jpg` next to the
//! input and prints progress plus both embeddings on stdout. Exits 0 once the
//! crops are saved, 1 on usage errors, missing models, or when no face could
//! be cropped.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use facecrop::{
    ArcFaceEncoder, FaceCropper, FaceEncoder, PixelEncoder, RustfaceLocator, StdoutReporter,
};

const USAGE: &str = "Usage: face_crop <image_path>";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(
    name = "face_crop",
    version,
    about = "Crop, normalize and embed the first face in an image",
    after_help = "Two model files are required. The SeetaFace detector model \
(seeta_fd_frontal_v1.0.bin from the rustface repository) and the ArcFace \
encoder model (w600k_r50.onnx from insightface) are looked up relative to the \
current directory unless --detector-model / --encoder-model or the matching \
environment variables point elsewhere."
)]
struct Args {
    /// Image to process
    image_path: PathBuf,

    /// SeetaFace frontal detector model (required)
    #[arg(
        long,
        env = "FACECROP_DETECTOR_MODEL",
        default_value = "seeta_fd_frontal_v1.0.bin"
    )]
    detector_model: PathBuf,

    /// ArcFace ONNX model used for face embeddings (required unless --pixel-encoder)
    #[arg(long, env = "FACECROP_ENCODER_MODEL", default_value = "w600k_r50.onnx")]
    encoder_model: PathBuf,

    /// Use the model-free pixel-thumbnail encoder instead of ArcFace
    #[arg(long)]
    pixel_encoder: bool,
}

fn face_encoder(args: &Args) -> Result<Box<dyn FaceEncoder>> {
    if args.pixel_encoder {
        log::warn!("using the pixel-thumbnail encoder, embeddings carry no identity features");
        return Ok(Box::new(PixelEncoder::new()));
    }
    let encoder = ArcFaceEncoder::from_path(&args.encoder_model).with_context(|| {
        format!(
            "Failed to initialize face encoder from {:?}",
            args.encoder_model
        )
    })?;
    log::info!("using encoder model {}", args.encoder_model.display());
    Ok(Box::new(encoder))
}

fn run(args: &Args) -> Result<i32> {
    let locator = RustfaceLocator::from_path(&args.detector_model).with_context(|| {
        format!(
            "Failed to initialize face locator from {:?}",
            args.detector_model
        )
    })?;
    log::info!("using detector model {}", args.detector_model.display());
    let encoder = face_encoder(args)?;

    let report = FaceCropper::new(Box::new(locator))
        .face_encoder(encoder)
        .reporter(Box::new(StdoutReporter))
        .run(&args.image_path);
    Ok(report.exit_code())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            log::debug!("argument error: {e}");
            println!("{USAGE}");
            return ExitCode::from(1);
        }
    };

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e:#}");
            println!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
