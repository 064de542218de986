pub mod logging;
pub mod progress;

pub mod env {
    use log::debug;

    /// Load .env if present; missing files are fine.
    pub fn load_env() {
        match dotenv::dotenv() {
            Ok(path) => debug!("Loaded environment from {:?}", path),
            Err(_) => debug!("No .env file found, using process environment"),
        }
    }
}

pub async fn get_memory_usage() -> u64 {
    use sysinfo::System;
    let mut sys = System::new_all();
    sys.refresh_memory();
    sys.used_memory() / (1024 * 1024) // Convert to MB
}
