fn main() {
    // Exposes PKG_VERSION and friends to the scaler metadata writer
    built::write_built_file().expect("Failed to generate build info");
}
