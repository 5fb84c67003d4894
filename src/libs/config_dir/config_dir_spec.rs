extern crate hamcrest2;

#[cfg(test)]
mod config_dir_spec {
    use std::env;
    use std::fs;
    use hamcrest2::prelude::*;
    use temp_testdir::TempDir;
    use crate::libs::config_dir::config_dir::configuration_directory;
    use std::ops::Deref;

    #[ctor::ctor]
    fn before_each() {
        env::set_var("RUST_LOG", "debug");
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[ctor::dtor]
    fn after_each() {}

    #[test]
    fn config_dir_is_created() {
        let temp = TempDir::default();
        let result = configuration_directory(Some(temp.to_path_buf()));
        assert_that!(&result, ok());
        let config_dir_path = result.unwrap();
        let config_dir = config_dir_path.deref();
        assert_that!(config_dir, path_exists());
        assert_that!(config_dir, dir_exists());
        let config_dir_str = config_dir.to_str().unwrap();
        assert_that!(config_dir_str, matches_regex("sdrvsg$"));
    }

    #[test]
    fn existing_config_dir_is_reused() {
        let temp = TempDir::default();
        let first = configuration_directory(Some(temp.to_path_buf())).unwrap();
        let second = configuration_directory(Some(temp.to_path_buf())).unwrap();
        assert_that!(first, eq(second));
    }

    #[test]
    fn no_home_dir_is_an_error() {
        assert_that!(configuration_directory(None).is_err(), equal_to(true));
    }

    #[test]
    fn missing_home_dir_is_an_error() {
        let temp = TempDir::default();
        let missing = temp.to_path_buf().join("nobody");
        assert_that!(configuration_directory(Some(missing)).is_err(), equal_to(true));
    }

    #[test]
    fn config_path_that_is_a_file_is_an_error() {
        let temp = TempDir::default();
        let first = configuration_directory(Some(temp.to_path_buf())).unwrap();
        fs::remove_dir(&first).unwrap();
        fs::write(&first, "not a directory").unwrap();
        assert_that!(configuration_directory(Some(temp.to_path_buf())).is_err(), equal_to(true));
    }
}
