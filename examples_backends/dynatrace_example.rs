use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use tracing_dynatrace_sink::init::init_tracing_from_env;

/// Reads `DT_LOGS_INGEST_URL`, `DT_API_TOKEN`, `DT_APPLICATION_ID` and the
/// other `DT_*` variables, then ships events to that environment.
#[tokio::main]
async fn main() {
    if let Err(e) = init_tracing_from_env() {
        eprintln!("cannot start Dynatrace log shipping: {}", e);
        return;
    }

    info!("starting service");
    warn!(user_id = 42, attempts = 3, "password retry limit close");
    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    sleep(Duration::from_secs(2)).await;
}
