fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/aggregator.proto");
    tonic_build::configure()
        .build_client(false)
        .compile(&["proto/aggregator.proto"], &["proto"])?;
    Ok(())
}
