// ---------------------------------------------------------------------------
// Build script for the schemas crate.
//
// Compiles `proto/mpf.proto` into client and server bindings. The vendored
// protoc binary keeps builds independent of a system protobuf install.
// ---------------------------------------------------------------------------

fn main() {
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("failed to locate protoc");
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed=proto/mpf.proto");
    println!("cargo:rerun-if-changed=proto");

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(&["proto/mpf.proto"], &["proto"])
        .expect("failed to compile media controller protobufs");
}
