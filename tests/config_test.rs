use workherd::config::{Config, DEFAULT_ADDR, HerdConfig};

// Both cases share process-wide env vars, so they run in one test.
#[test]
fn config_from_env_defaults_and_overrides() {
    unsafe {
        std::env::remove_var("HERD_SIZE");
        std::env::remove_var("HERD_MAX_RETRIES");
        std::env::remove_var("HERD_ADDR");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.herd, HerdConfig::default());
    assert_eq!(config.addr, DEFAULT_ADDR);
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("HERD_SIZE", "12");
        std::env::set_var("HERD_MAX_RETRIES", " 4 ");
        std::env::set_var("HERD_ADDR", "0.0.0.0:2345");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.herd.herd_size, 12);
    assert_eq!(config.herd.max_retries, 4);
    assert_eq!(config.addr, "0.0.0.0:2345");

    unsafe {
        std::env::set_var("HERD_SIZE", "-3");
    }

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("HERD_SIZE"));

    // Clean up
    unsafe {
        std::env::remove_var("HERD_SIZE");
        std::env::remove_var("HERD_MAX_RETRIES");
        std::env::remove_var("HERD_ADDR");
    }
}

#[test]
fn herd_config_builder_sets_fields() {
    let config = HerdConfig::default().herd_size(10).max_retries(7);
    assert_eq!(config.herd_size, 10);
    assert_eq!(config.max_retries, 7);
}
