#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Config and state parsing must reject garbage without panicking.
    if let Ok(cfg) = toml::from_str::<spine_config::Config>(data) {
        let _ = cfg.validate();
    }
    if let Ok(state) = toml::from_str::<spine_config::PersistedState>(data) {
        let _ = state.validate();
    }
});
