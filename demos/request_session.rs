use std::sync::Arc;

use logone::{
    Context, ErrorValue, Logone, LogoneConfig, MaskKeyword, Payload, StdioAdapter,
};

/// One simulated HTTP request logged as a single record on stdout/stderr.
///
/// Try `LOGONE_LOG_LEVEL=warning cargo run --example request_session`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut config = LogoneConfig::from_env()?;
    if config.mask_keywords.is_none() {
        config = config.mask_keywords([MaskKeyword::exact("password"), MaskKeyword::pattern_ignore_case("token")?]);
    }
    let logone = Logone::with_config(Arc::new(StdioAdapter::new()), config);

    let session = logone.start(
        "request",
        Context::new().with("method", "POST").with("path", "/login"),
    );
    let logger = session.logger();

    logger.debug("parsing body");
    logger.info_with(
        "login attempt",
        Payload::object([("user", "ada"), ("password", "hunter2"), ("X-Token", "abc.def")]),
    );
    logger.warning_with("slow upstream", Payload::object([("ms", 840)]));
    logger.error_with(
        ErrorValue::new("AuthError", "invalid credentials").with_cause(ErrorValue::new("DbError", "row not found")),
        Payload::from("ada"),
    );

    let outcome = session.finish()?;
    tracing::info!(?outcome, "request finished");
    Ok(())
}
