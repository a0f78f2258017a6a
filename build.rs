use vergen::{BuildBuilder, Emitter};

fn main() {
    // build metadata is best effort, a plain build must never fail on it
    let Ok(build) = BuildBuilder::all_build() else { return };
    if let Ok(emitter) = Emitter::default().add_instructions(&build) {
        let _ = emitter.emit();
    }
}
