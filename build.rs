fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto");

    // Generated code is only needed by the tonic server, so protoc is only
    // required when the `grpc` feature is enabled.
    #[cfg(feature = "grpc")]
    compile_protos()?;

    Ok(())
}

#[cfg(feature = "grpc")]
fn compile_protos() -> Result<(), Box<dyn std::error::Error>> {
    use std::path::PathBuf;

    let proto_dir = PathBuf::from("proto");
    let mut proto_files: Vec<PathBuf> = Vec::new();

    for entry in std::fs::read_dir(&proto_dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "proto").unwrap_or(false) {
            proto_files.push(path);
        }
    }

    if proto_files.is_empty() {
        println!(
            "cargo:warning=No .proto files found in {}",
            proto_dir.display()
        );
    } else {
        tonic_build::configure()
            .build_client(false)
            .compile_protos(&proto_files, &["proto"])?;
    }

    Ok(())
}
