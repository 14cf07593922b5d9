//! Code for reading the scalar model configuration.
use super::read_toml;
use crate::parameters::Config;
use anyhow::Result;
use std::path::Path;

const MODEL_FILE_NAME: &str = "model.toml";

/// Read the model configuration file from the model directory
pub fn read_config(model_dir: &Path) -> Result<Config> {
    read_toml(&model_dir.join(MODEL_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_config() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_FILE_NAME)).unwrap();
            writeln!(
                file,
                "[time]\nyears = [2025, 2030]\nmonths = 1\nhours = 24\n\n\
                 [finance]\ndiscount_rate = 0.05\ninterest_rate = 0.05"
            )
            .unwrap();
        }

        let config = read_config(dir.path()).unwrap();
        assert_eq!(config.time.years, vec![2025, 2030]);
        assert_eq!(config.time.dt, 1.0);
        assert!(!config.hydro.enabled);
        assert_eq!(config.solver.name, "highs");
    }
}
