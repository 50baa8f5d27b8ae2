// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::pipeline::config::{DEFAULT_CONF, DEFAULT_NAMES_FILE};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    trt-annotate video best.engine input.mp4 640 640
    trt-annotate video best.engine input.mp4 640 640 annotated.mp4 --conf 0.4
    trt-annotate video best.engine frames/ 640 640 --workdir /tmp/run --fps 30
    trt-annotate predict --model best.onnx --source test.jpg
    trt-annotate predict --model best.onnx --source test.jpg --save false
    trt-annotate predict -m best.onnx -s clips/ --conf 0.4 --save-dir outputs --name helmets
    trt-annotate names --model best.onnx --out names.txt
    trt-annotate export --pt best.pt --onnx best.onnx --input-shape 1 3 640 640 --ultralytics"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate every frame of a video with an external inference binary
    Video(VideoArgs),
    /// Run detection inference on an image, directory, or video
    Predict(PredictArgs),
    /// Extract class names from a model into a names file
    Names(NamesArgs),
    /// Export a PyTorch checkpoint to ONNX with the Python exporter
    Export(ExportArgs),
}

/// Arguments for the video command.
#[derive(Args, Debug)]
pub struct VideoArgs {
    /// Compiled inference engine passed to the external binary
    pub engine: String,

    /// Source video file (or a directory of ordered image frames)
    pub video: PathBuf,

    /// Network input width
    pub input_w: u32,

    /// Network input height
    pub input_h: u32,

    /// Output video path [default: trt_result_video_from_frames.mp4]
    pub out_video: Option<PathBuf>,

    /// External inference binary [default: <workdir>/trt_infer_video_fix]
    #[arg(long = "bin")]
    pub binary: Option<PathBuf>,

    /// Class-names file passed to the external binary
    #[arg(long, default_value = DEFAULT_NAMES_FILE)]
    pub names: PathBuf,

    /// Confidence threshold passed to the external binary
    #[arg(long, default_value_t = DEFAULT_CONF)]
    pub conf: f32,

    /// Working directory for scratch frames and relative output paths
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Frame rate used for sources that do not report one
    #[arg(long)]
    pub fps: Option<f32>,

    /// Show progress output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Path to ONNX model file
    #[arg(short, long)]
    pub model: String,

    /// Input source (image, directory, or video)
    #[arg(short, long)]
    pub source: String,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Maximum detections per image
    #[arg(long, default_value_t = 300)]
    pub max_det: usize,

    /// Inference image size
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Intra-op threads for ONNX Runtime (0 = runtime default)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Save annotated results to <save-dir>/<name>
    #[arg(
        long,
        default_value_t = true,
        num_args = 0..=1,
        default_missing_value = "true",
        action = clap::ArgAction::Set
    )]
    pub save: bool,

    /// Root directory for saved results
    #[arg(long, default_value = "outputs")]
    pub save_dir: PathBuf,

    /// Run name under the save directory
    #[arg(long, default_value = "results")]
    pub name: String,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the names command.
#[derive(Args, Debug)]
pub struct NamesArgs {
    /// ONNX model, or a YAML/text metadata dump
    #[arg(short, long)]
    pub model: PathBuf,

    /// Output names file
    #[arg(short, long)]
    pub out: PathBuf,
}

/// Arguments for the export command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// PyTorch checkpoint (.pt)
    #[arg(long)]
    pub pt: PathBuf,

    /// Output ONNX path
    #[arg(long)]
    pub onnx: PathBuf,

    /// Dummy input shape
    #[arg(
        long,
        num_args = 4,
        value_names = ["B", "C", "H", "W"],
        default_values_t = [1, 3, 640, 640]
    )]
    pub input_shape: Vec<usize>,

    /// ONNX opset version
    #[arg(long, default_value_t = 14)]
    pub opset: u32,

    /// Export with a dynamic batch dimension
    #[arg(long)]
    pub dynamic: bool,

    /// Load the checkpoint through the ultralytics package first
    #[arg(long)]
    pub ultralytics: bool,

    /// Python interpreter with torch installed
    #[arg(long, default_value = "python3")]
    pub python: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_video_args_defaults() {
        let args = Cli::parse_from(["app", "video", "best.engine", "in.mp4", "640", "480"]);
        let Commands::Video(video) = args.command else {
            panic!("expected video command");
        };
        assert_eq!(video.engine, "best.engine");
        assert_eq!(video.video, PathBuf::from("in.mp4"));
        assert_eq!((video.input_w, video.input_h), (640, 480));
        assert!(video.out_video.is_none());
        assert!(video.binary.is_none());
        assert_eq!(video.names, PathBuf::from("names.txt"));
        assert!((video.conf - 0.25).abs() < f32::EPSILON);
        assert_eq!(video.workdir, PathBuf::from("."));
        assert!(video.fps.is_none());
        assert!(video.verbose);
    }

    #[test]
    fn test_video_args_custom() {
        let args = Cli::parse_from([
            "app",
            "video",
            "best.engine",
            "in.mp4",
            "640",
            "640",
            "out.mp4",
            "--bin",
            "/opt/infer",
            "--conf",
            "0.5",
            "--verbose",
            "false",
        ]);
        let Commands::Video(video) = args.command else {
            panic!("expected video command");
        };
        assert_eq!(video.out_video, Some(PathBuf::from("out.mp4")));
        assert_eq!(video.binary, Some(PathBuf::from("/opt/infer")));
        assert!((video.conf - 0.5).abs() < f32::EPSILON);
        assert!(!video.verbose);
    }

    #[test]
    fn test_video_args_missing_geometry_is_an_error() {
        let err =
            Cli::try_parse_from(["app", "video", "best.engine", "in.mp4", "640"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_predict_args_defaults() {
        let args = Cli::parse_from(["app", "predict", "-m", "best.onnx", "-s", "test.jpg"]);
        let Commands::Predict(predict) = args.command else {
            panic!("expected predict command");
        };
        assert_eq!(predict.model, "best.onnx");
        assert_eq!(predict.source, "test.jpg");
        assert!((predict.conf - 0.25).abs() < f32::EPSILON);
        assert!((predict.iou - 0.45).abs() < f32::EPSILON);
        assert_eq!(predict.max_det, 300);
        assert_eq!(predict.threads, 0);
        assert!(predict.save);
        assert_eq!(predict.save_dir, PathBuf::from("outputs"));
        assert_eq!(predict.name, "results");
        assert!(predict.verbose);
    }

    #[test]
    fn test_predict_save_switch() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["app", "predict", "-m", "best.onnx", "-s", "a.jpg"];
            argv.extend_from_slice(extra);
            let Commands::Predict(predict) = Cli::parse_from(argv).command else {
                panic!("expected predict command");
            };
            predict.save
        };
        assert!(parse(&["--save"]));
        assert!(parse(&["--save", "true"]));
        assert!(!parse(&["--save", "false"]));
    }

    #[test]
    fn test_names_args() {
        let args = Cli::parse_from(["app", "names", "--model", "best.onnx", "--out", "n.txt"]);
        let Commands::Names(names) = args.command else {
            panic!("expected names command");
        };
        assert_eq!(names.model, PathBuf::from("best.onnx"));
        assert_eq!(names.out, PathBuf::from("n.txt"));
    }

    #[test]
    fn test_export_args_defaults() {
        let args = Cli::parse_from(["app", "export", "--pt", "best.pt", "--onnx", "best.onnx"]);
        let Commands::Export(export) = args.command else {
            panic!("expected export command");
        };
        assert_eq!(export.pt, PathBuf::from("best.pt"));
        assert_eq!(export.onnx, PathBuf::from("best.onnx"));
        assert_eq!(export.input_shape, vec![1, 3, 640, 640]);
        assert_eq!(export.opset, 14);
        assert!(!export.dynamic);
        assert!(!export.ultralytics);
        assert_eq!(export.python, PathBuf::from("python3"));
    }

    #[test]
    fn test_export_args_custom() {
        let args = Cli::parse_from([
            "app",
            "export",
            "--pt",
            "yolov8n.pt",
            "--onnx",
            "yolov8n.onnx",
            "--input-shape",
            "4",
            "3",
            "480",
            "640",
            "--opset",
            "17",
            "--dynamic",
            "--ultralytics",
        ]);
        let Commands::Export(export) = args.command else {
            panic!("expected export command");
        };
        assert_eq!(export.input_shape, vec![4, 3, 480, 640]);
        assert_eq!(export.opset, 17);
        assert!(export.dynamic && export.ultralytics);
    }

    #[test]
    fn test_export_requires_full_shape() {
        let err = Cli::try_parse_from([
            "app",
            "export",
            "--pt",
            "best.pt",
            "--onnx",
            "best.onnx",
            "--input-shape",
            "1",
            "3",
        ])
        .unwrap_err();
        assert!(err.use_stderr());
    }
}
