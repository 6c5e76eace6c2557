#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    if let Ok(cfg) = residuum_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let _ = residuum_core::EstimatorBuilder::default().from_config(&cfg).try_build();
        }
    }
});
