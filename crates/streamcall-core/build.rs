/// Generates the gRPC client and server bindings for the calculator and greet
/// services using `tonic-prost-build`.
///
/// Both proto files are compiled in one pass so that a single encoded file
/// descriptor set (`streamcall_descriptor.bin`) can be registered with the
/// reflection service.
///
/// # Files and Paths
///
/// - Proto files: `proto/calculator.proto`, `proto/greet.proto`
/// - Includes: `proto/`
///
/// # Output
///
/// ```rust,ignore
/// pub mod calculator {
///     tonic::include_proto!("calculator");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("streamcall_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/calculator.proto", "proto/greet.proto"],
        &["proto"],
    )?;

    Ok(())
}
