fn main() {
    println!("cargo:rerun-if-changed=overlay-hint.rc");
    println!("cargo:rerun-if-changed=overlay-hint.manifest");
    embed_resource::compile("overlay-hint.rc", embed_resource::NONE)
        .manifest_optional()
        .unwrap();
}
