use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("firmware_banner.rs");

    let version = env!("CARGO_PKG_VERSION");

    fs::write(&dest_path, format!("pub const FIRMWARE_BANNER: &'static str = \"OpenSprinkler core/{} (rust)\";", version)).unwrap();
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");
}
