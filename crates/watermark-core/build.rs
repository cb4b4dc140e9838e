/// Builds the gRPC client and server code for the `watermark.proto` definition
/// using `tonic-prost-build`.
///
/// The generated modules land in the crate's `OUT_DIR` together with an
/// encoded file descriptor set, which the server registers with
/// `tonic-reflection`.
///
/// # Files and Paths
///
/// - Proto file: `proto/watermark.proto`
/// - Includes: `proto/`
/// - Descriptor: `$OUT_DIR/watermark_descriptor.bin`
///
/// # Output
///
/// Generated code is exposed as:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("watermark");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("watermark_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/watermark.proto");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/watermark.proto"],
        &["proto"],
    )?;
    Ok(())
}
