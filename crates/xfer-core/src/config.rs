//! The config adapter interface: the handful of named knobs the
//! engine reads (`max-download`, `cookie`, `project-code`, ...). Backed by
//! `xfer-daemon::config::TomlConfigAdapter` in the running daemon and by a
//! plain `HashMap` in tests.

pub trait ConfigAdapter {
    fn get_int(&self, name: &str, default: i64) -> i64;
    fn get_bool(&self, name: &str, default: bool) -> bool;
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);
}
