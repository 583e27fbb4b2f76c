/// Emits a diagnostic line if the target runs in debug mode.
macro_rules! target_debug {
    ($target:expr, $($arg:tt)*) => {{
        let target = &$target;
        if target.config.debug() {
            target.diagnostics.emit(&format!(
                "{} {}",
                $crate::dispatch::DIAGNOSTICS_PREFIX,
                format_args!($($arg)*)
            ));
        }
    }};
}
