//! Metrics emitted by batching queues.

use metrics::{Unit, describe_counter, describe_gauge};
use std::sync::Once;

static REGISTER: Once = Once::new();

/// Label carrying the reason a batch was flushed (`capacity`, `timeout` or `close`).
pub const TRIGGER_LABEL: &str = "trigger";

/// Counter for batches handed to the handler.
pub const BATCHER_BATCHES_DISPATCHED_TOTAL: &str = "batcher_batches_dispatched_total";

/// Counter for items handed to the handler.
pub const BATCHER_ITEMS_DISPATCHED_TOTAL: &str = "batcher_items_dispatched_total";

/// Counter for items submitted after the queue was closed.
pub const BATCHER_ITEMS_DROPPED_TOTAL: &str = "batcher_items_dropped_total";

/// Gauge for handler invocations that were launched but have not returned yet.
pub const BATCHER_HANDLERS_IN_FLIGHT: &str = "batcher_handlers_in_flight";

/// Counter for handler invocations that panicked.
pub const BATCHER_HANDLER_PANICS_TOTAL: &str = "batcher_handler_panics_total";

/// Registers metric descriptions with the installed recorder. Safe to call multiple times.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        describe_counter!(
            BATCHER_BATCHES_DISPATCHED_TOTAL,
            Unit::Count,
            "Batches dispatched to the handler, labeled by flush trigger"
        );
        describe_counter!(
            BATCHER_ITEMS_DISPATCHED_TOTAL,
            Unit::Count,
            "Items dispatched to the handler, labeled by flush trigger"
        );
        describe_counter!(
            BATCHER_ITEMS_DROPPED_TOTAL,
            Unit::Count,
            "Items discarded because they were submitted after close"
        );
        describe_gauge!(
            BATCHER_HANDLERS_IN_FLIGHT,
            Unit::Count,
            "Handler invocations currently running"
        );
        describe_counter!(
            BATCHER_HANDLER_PANICS_TOTAL,
            Unit::Count,
            "Handler invocations that panicked"
        );
    });
}
