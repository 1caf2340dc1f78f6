fn main() {
    let _shadow = shadow_rs::ShadowBuilder::builder().build().expect("Failed to generate build metadata");
}
