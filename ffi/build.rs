use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let Some(out_dir) = std::env::var_os("OUT_DIR").map(PathBuf::from) else {
        println!("cargo:warning=OUT_DIR not set, skipping ajax_ffi.h");
        return;
    };

    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("AJAX_FFI_H")
        .generate();

    match generated {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("ajax_ffi.h"));
        }
        Err(e) => println!("cargo:warning=could not generate ajax_ffi.h: {e}"),
    }
}
