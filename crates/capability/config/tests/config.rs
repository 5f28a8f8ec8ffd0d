use lis_config::{AppConfig, ConfigError};

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("LIS_SYNC_ENABLED", "true");
        std::env::remove_var("LIS_SYNC_API_KEY");
        std::env::set_var("LIS_SYNC_BASE_URL", "tamalabs.example.id");
        std::env::set_var("LIS_LAB_ID", "LAB7");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Missing(key)) if key == "LIS_SYNC_API_KEY"
    ));

    unsafe {
        std::env::set_var("LIS_SYNC_API_KEY", "secret");
        std::env::set_var("LIS_HTTP_ADDR", "127.0.0.1:9214");
        std::env::set_var("LIS_SYNC_RETRY_MAX_ATTEMPTS", "3");
    }
    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:9214");
    assert!(config.devices_file.is_none());
    assert_eq!(config.devices_reload_interval().as_secs(), 30);
    let sync = config.sync.expect("sync enabled");
    assert_eq!(sync.base_url, "tamalabs.example.id");
    assert_eq!(sync.lab_id, "LAB7");
    assert_eq!(sync.retry_max_attempts, 3);
    assert_eq!(sync.queue_capacity, 10);
    assert_eq!(sync.observation_interval().as_secs(), 10);
    assert_eq!(sync.job_deadline().as_secs(), 120);
    assert_eq!(sync.health_timeout().as_secs(), 5);

    unsafe {
        std::env::set_var("LIS_SYNC_QUEUE_SIZE", "0");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid(key, _)) if key == "LIS_SYNC_QUEUE_SIZE"
    ));

    unsafe {
        std::env::set_var("LIS_SYNC_QUEUE_SIZE", "10");
        std::env::set_var("LIS_SYNC_RETRY_MAX_ATTEMPTS", "4294967296");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid(key, value))
            if key == "LIS_SYNC_RETRY_MAX_ATTEMPTS" && value == "4294967296"
    ));

    unsafe {
        std::env::set_var("LIS_SYNC_RETRY_MAX_ATTEMPTS", "4294967295");
    }
    let sync = AppConfig::from_env().expect("config").sync.expect("sync");
    assert_eq!(sync.retry_max_attempts, u32::MAX);

    // 空值等同未设置，保持默认开启
    unsafe {
        std::env::set_var("LIS_SYNC_ENABLED", "");
    }
    assert!(AppConfig::from_env().expect("config").sync.is_some());

    unsafe {
        std::env::set_var("LIS_SYNC_ENABLED", "yes");
    }
    assert!(AppConfig::from_env().expect("config").sync.is_some());

    unsafe {
        std::env::set_var("LIS_SYNC_ENABLED", "maybe");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid(key, _)) if key == "LIS_SYNC_ENABLED"
    ));

    unsafe {
        std::env::set_var("LIS_SYNC_ENABLED", "no");
    }
    assert!(AppConfig::from_env().expect("config").sync.is_none());

    unsafe {
        std::env::set_var("LIS_SYNC_ENABLED", "off");
    }
    let config = AppConfig::from_env().expect("config");
    assert!(config.sync.is_none());
}
