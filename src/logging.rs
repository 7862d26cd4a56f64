use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the default log subscriber. Host shells call this once at
/// startup; later calls are no-ops.
pub fn init(level: Level) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // Ignore err if already set
}
