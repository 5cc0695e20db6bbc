use crate::config::Settings;

pub fn setup_logging(settings: &Settings) {
    common::setup_logging(settings.log_level, settings.environment);
}
