fn main() {
    println!("cargo:rerun-if-env-changed=RELAY_FALLBACK_SSID");
    println!("cargo:rerun-if-env-changed=RELAY_FALLBACK_PASSWORD");

    // Host builds (unit and integration tests) have no ESP-IDF environment.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
