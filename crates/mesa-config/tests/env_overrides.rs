//! Environment variables override every file layer.

use figment::Jail;
use mesa_config::{MesaConfig, StorageBackend};

#[test]
fn env_selects_the_backend() {
    Jail::expect_with(|jail| {
        jail.set_env("MESA_STORAGE__BACKEND", "libsql");
        jail.set_env("MESA_STORAGE__DATABASE_NAME", ":memory:");

        let config = MesaConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.storage.backend, StorageBackend::Libsql);
        assert!(config.storage.is_in_memory_database());
        Ok(())
    });
}

#[test]
fn env_beats_project_toml() {
    Jail::expect_with(|jail| {
        jail.create_dir(".mesa")?;
        jail.create_file(
            ".mesa/config.toml",
            r#"
[storage]
backend = "memory"
default_collection = "from-toml"
"#,
        )?;
        jail.set_env("MESA_STORAGE__DEFAULT_COLLECTION", "from-env");

        let config = MesaConfig::load().map_err(|e| e.to_string())?;
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.default_collection, "from-env");
        Ok(())
    });
}

#[test]
fn env_turns_off_row_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("MESA_GENERAL__VALIDATE_ROWS", "false");
        let config = MesaConfig::load().map_err(|e| e.to_string())?;
        assert!(!config.general.validate_rows);
        Ok(())
    });
}
