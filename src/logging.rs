use chrono::Local;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the logging system
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_logging(default_level: LevelFilter) {
    INIT.call_once(|| {
        let mut builder = Builder::new();
        builder.filter_level(default_level);
        builder.parse_default_env();
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });
        // Tests may have installed a logger already
        if builder.try_init().is_ok() {
            info!("Logging initialized at {}", default_level);
        }
    });
}
