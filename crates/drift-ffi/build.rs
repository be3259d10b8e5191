use std::env;
use std::path::PathBuf;

const HEADER: &str = "drift.h";

fn main() {
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-changed=src");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR"));
    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml"))
        .expect("cbindgen.toml is readable");

    let include = crate_dir.join("include");
    std::fs::create_dir_all(&include).expect("include/ can be created");

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(b) => b,
        Err(e) => panic!("could not generate {HEADER}: {e}"),
    };
    // Unchanged headers are left alone so dependents do not rebuild.
    bindings.write_to_file(include.join(HEADER));
}
