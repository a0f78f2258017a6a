macro_rules! exit {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::exit(1);
    }};
}

pub(crate) use exit;
