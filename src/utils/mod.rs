pub mod constants;
pub mod default_utils;
pub mod network;
pub mod sys_utils;

pub use constants::CONSTANTS;

macro_rules! debug_if_enabled {
    ($fmt:expr, $($arg:expr),*) => {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!($fmt, $($arg),*);
        }
    };
}

pub(crate) use debug_if_enabled;
