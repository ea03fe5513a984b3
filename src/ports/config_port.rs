//! Configuration access port.

/// Section/key lookups with caller-supplied defaults for absent or
/// unparsable values.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Periods and bar counts. Negative values fall back to `default`.
    fn get_usize(&self, section: &str, key: &str, default: usize) -> usize {
        let fallback = i64::try_from(default).unwrap_or(i64::MAX);
        usize::try_from(self.get_int(section, key, fallback)).unwrap_or(default)
    }
}
