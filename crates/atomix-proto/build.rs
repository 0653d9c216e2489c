// ABOUTME: Build script for generating Rust code from the atomix primitive protos.
// ABOUTME: Compiles messages with tonic-build and emits gRPC method path constants per package.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use prost::Message;
use prost_types::FileDescriptorSet;

const PROTOS: &[&str] = &[
    "proto-src/atomix/primitive/v1/primitive.proto",
    "proto-src/atomix/primitive/counter/v1/counter.proto",
    "proto-src/atomix/primitive/election/v1/election.proto",
    "proto-src/atomix/primitive/indexedmap/v1/indexedmap.proto",
    "proto-src/atomix/primitive/list/v1/list.proto",
    "proto-src/atomix/primitive/lock/v1/lock.proto",
    "proto-src/atomix/primitive/map/v1/map.proto",
    "proto-src/atomix/primitive/set/v1/set.proto",
    "proto-src/atomix/primitive/value/v1/value.proto",
];

const MANAGER_SUFFIX: &str = "Manager";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("atomix_descriptor.bin");

    // Calls go through the transport seam, so only messages are generated.
    tonic_build::configure()
        .build_server(false)
        .build_client(false)
        .file_descriptor_set_path(&descriptor_path)
        .compile_protos(PROTOS, &["proto-src"])?;

    let descriptors = FileDescriptorSet::decode(std::fs::read(&descriptor_path)?.as_slice())?;
    for file in &descriptors.file {
        if file.service.is_empty() {
            continue;
        }
        let package = file.package();
        let paths = method_paths(package, file)?;
        std::fs::write(out_dir.join(format!("{package}.paths.rs")), paths)?;
    }

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    Ok(())
}

/// Renders one `pub const` per primitive method and a `SESSION` constant for
/// the package's session manager.
fn method_paths(
    package: &str,
    file: &prost_types::FileDescriptorProto,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut out = String::new();
    let mut names = BTreeSet::new();
    let mut session = None;

    for service in &file.service {
        let service_name = service.name();
        if service_name.ends_with(MANAGER_SUFFIX) {
            let path = |method: &str| -> Result<String, String> {
                service
                    .method
                    .iter()
                    .find(|m| m.name() == method)
                    .map(|m| format!("/{package}.{service_name}/{}", m.name()))
                    .ok_or_else(|| format!("{package}.{service_name} has no {method} method"))
            };
            session = Some((path("OpenSession")?, path("CloseSession")?));
            continue;
        }

        for method in &service.method {
            let name = const_name(method.name());
            if !names.insert(name.clone()) {
                return Err(format!("duplicate method constant {name} in {package}").into());
            }
            writeln!(
                out,
                "pub const {name}: &str = \"/{package}.{service_name}/{}\";",
                method.name()
            )?;
        }
    }

    let (open, close) =
        session.ok_or_else(|| format!("{package} declares no session manager service"))?;
    writeln!(
        out,
        "pub const SESSION: crate::SessionPaths = crate::SessionPaths {{ open_session: \"{open}\", close_session: \"{close}\" }};"
    )?;

    Ok(out)
}

/// `GetTerm` becomes `GET_TERM`.
fn const_name(method: &str) -> String {
    let mut name = String::with_capacity(method.len() + 4);
    for (i, ch) in method.chars().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            name.push('_');
        }
        name.push(ch.to_ascii_uppercase());
    }
    name
}
