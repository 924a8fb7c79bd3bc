use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("grounded_chat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("grounded_chat.client.request_errors");
pub(crate) static CLIENT_GROUNDED_REQUESTS: Counter =
    Counter::new("grounded_chat.client.grounded_requests");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("grounded_chat.client.request_duration_seconds");

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("grounded_chat.stream.requests");
pub(crate) static STREAM_EVENTS: Counter = Counter::new("grounded_chat.stream.events");
pub(crate) static STREAM_EVENTS_SKIPPED: Counter =
    Counter::new("grounded_chat.stream.events_skipped");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("grounded_chat.stream.errors");
pub(crate) static STREAM_IDLE_TIMEOUTS: Counter =
    Counter::new("grounded_chat.stream.idle_timeouts");
pub(crate) static STREAM_TTFB: Moments = Moments::new("grounded_chat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments =
    Moments::new("grounded_chat.stream.duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("grounded_chat.session.turns");
pub(crate) static SESSION_FAILED_TURNS: Counter =
    Counter::new("grounded_chat.session.failed_turns");
pub(crate) static SESSION_CANCELLED_TURNS: Counter =
    Counter::new("grounded_chat.session.cancelled_turns");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_GROUNDED_REQUESTS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_EVENTS_SKIPPED);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_IDLE_TIMEOUTS);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_FAILED_TURNS);
    collector.register_counter(&SESSION_CANCELLED_TURNS);
}
