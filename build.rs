use std::env;
use std::path::PathBuf;

/// Common install locations of `libASICamera2`.
const LIB_CANDIDATES: [&str; 3] = ["/usr/local/lib", "/opt/asi/lib", "/usr/lib"];

fn main() {
    println!("cargo:rerun-if-env-changed=ASI_SDK_LIB_DIR");
    if env::var_os("CARGO_FEATURE_ASI_SDK").is_none() {
        return;
    }

    let dir = env::var_os("ASI_SDK_LIB_DIR").map(PathBuf::from).or_else(|| {
        LIB_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|dir| dir.join("libASICamera2.so").exists())
    });

    match dir {
        Some(dir) => println!("cargo:rustc-link-search=native={}", dir.display()),
        None => println!(
            "cargo:warning=libASICamera2 not found, set ASI_SDK_LIB_DIR to the SDK lib directory"
        ),
    }
}
