fn main() {
    // The hosted payload P/Invokes into the executable itself, so its
    // #[no_mangle] exports have to land in the dynamic symbol table.
    match std::env::var("CARGO_CFG_TARGET_OS").as_deref() {
        Ok("linux") | Ok("android") | Ok("freebsd") => {
            println!("cargo:rustc-link-arg-bins=-Wl,--export-dynamic");
        }
        Ok("macos") => {
            println!("cargo:rustc-link-arg-bins=-Wl,-export_dynamic");
        }
        _ => {}
    }
    println!("cargo:rerun-if-changed=build.rs");
}
