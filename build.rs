fn main() {
    // macOS CLI binaries need an embedded Info.plist with
    // NSBluetoothAlwaysUsageDescription, otherwise CoreBluetooth never leaves
    // the "unauthorised" state and the scan for the strap finds nothing.
    // The plist goes into the __TEXT,__info_plist section via `-sectcreate`.
    //
    // CARGO_CFG_TARGET_OS is the target, so this also applies when
    // cross-compiling for macOS.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return;
    }

    let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR unset; Info.plist not embedded");
        return;
    };
    let plist = format!("{dir}/Info.plist");

    for arg in ["-sectcreate", "__TEXT", "__info_plist", plist.as_str()] {
        println!("cargo:rustc-link-arg-bins={arg}");
    }
    println!("cargo:rerun-if-changed=Info.plist");
}
