// build.rs

fn main() {
    // Emits VERGEN_BUILD_DATE, shown on the landing page
    vergen::EmitBuilder::builder()
        .all_build()
        .emit()
        .expect("Unable to generate build info");
}
