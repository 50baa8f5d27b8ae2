// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::ffi::OsString;
use std::fs;
use std::process::{Command, Stdio};

use crate::cli::args::ExportArgs;
use crate::error::{AnnotateError, Result};
use crate::{info, success};

/// Exporter run by the Python interpreter.
///
/// Arguments after `-c`: `<pt> <onnx> <B> <C> <H> <W> <opset> <dynamic 0|1> <ultralytics 0|1>`.
/// Exits 3 when the checkpoint holds no module and 4 when `torch.load` fails.
const EXPORT_SCRIPT: &str = r#"
import sys

import torch

pt, onnx_path = sys.argv[1], sys.argv[2]
shape = tuple(int(v) for v in sys.argv[3:7])
opset = int(sys.argv[7])
dynamic = sys.argv[8] == "1"
use_ultralytics = sys.argv[9] == "1"

module = None
if use_ultralytics:
    try:
        from ultralytics import YOLO

        print("Loading with ultralytics YOLO")
        module = YOLO(pt).model
    except Exception as e:
        print(f"Ultralytics load failed, falling back to torch.load: {e}")

if module is None:
    try:
        loaded = torch.load(pt, map_location="cpu", weights_only=False)
    except Exception as e:
        print(f"Failed to load .pt via torch.load: {e}", file=sys.stderr)
        sys.exit(4)
    if isinstance(loaded, dict) and hasattr(loaded.get("model"), "eval"):
        module = loaded["model"]
    elif hasattr(loaded, "eval"):
        module = loaded
    else:
        print(
            "Loaded object is not an nn.Module. A state_dict must be loaded into its "
            "model architecture before export.",
            file=sys.stderr,
        )
        sys.exit(3)

module = module.float().eval()
axes = {"images": {0: "batch"}, "output": {0: "batch"}} if dynamic else None
print(f"Exporting to ONNX: {onnx_path} (opset={opset}, dynamic={dynamic})")
with torch.no_grad():
    torch.onnx.export(
        module,
        torch.randn(*shape),
        onnx_path,
        export_params=True,
        opset_version=opset,
        input_names=["images"],
        output_names=["output"],
        dynamic_axes=axes,
        do_constant_folding=True,
    )
"#;

/// Export a PyTorch checkpoint to ONNX through the Python exporter.
///
/// The checkpoint is checked before the interpreter starts. The exporter's own
/// output is passed straight through to the terminal.
///
/// # Errors
///
/// Returns [`AnnotateError::CheckpointNotFound`] for a missing `.pt` file and
/// [`AnnotateError::ExportFailed`] when the exporter exits non-zero.
pub fn run_export(args: &ExportArgs) -> Result<()> {
    if !args.pt.is_file() {
        return Err(AnnotateError::CheckpointNotFound(args.pt.clone()));
    }

    if let Some(parent) = args.onnx.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    info!(
        "Exporting {} -> {} (input {:?}, opset {})",
        args.pt.display(),
        args.onnx.display(),
        args.input_shape,
        args.opset
    );

    let status = export_command(args).status().map_err(|e| {
        AnnotateError::IoError(format!("Failed to run {}: {e}", args.python.display()))
    })?;

    if !status.success() {
        return Err(AnnotateError::ExportFailed {
            code: status.code(),
        });
    }

    success!("Exported {}", args.onnx.display());
    Ok(())
}

/// The interpreter invocation, without running it.
fn export_command(args: &ExportArgs) -> Command {
    let mut cmd = Command::new(&args.python);
    cmd.arg("-c")
        .arg(EXPORT_SCRIPT)
        .args(script_args(args))
        .stdin(Stdio::null());
    cmd
}

fn script_args(args: &ExportArgs) -> Vec<OsString> {
    let flag = |on: bool| OsString::from(if on { "1" } else { "0" });

    let mut out = vec![
        args.pt.clone().into_os_string(),
        args.onnx.clone().into_os_string(),
    ];
    out.extend(args.input_shape.iter().map(|d| OsString::from(d.to_string())));
    out.push(OsString::from(args.opset.to_string()));
    out.push(flag(args.dynamic));
    out.push(flag(args.ultralytics));
    out
}
