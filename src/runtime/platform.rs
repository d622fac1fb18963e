use chrono::{Local, NaiveDateTime};

/// Thin platform abstraction for the time-based natives. Tests swap in a
/// fixed clock; the binary uses the host's local time.
pub trait Platform {
    fn now(&self) -> NaiveDateTime;
}

pub struct StdPlatform;

impl Platform for StdPlatform {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
#[cfg(test)]
pub struct FixedPlatform(pub NaiveDateTime);

#[cfg(test)]
impl Platform for FixedPlatform {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
