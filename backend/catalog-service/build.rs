// Build script for catalog-service
// Compiles user.proto and product.proto; client code is generated for the
// integration tests.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/user.proto");
    println!("cargo:rerun-if-changed=proto/product.proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/user.proto", "proto/product.proto"], &["proto"])?;

    Ok(())
}
