/// Whole milliseconds from stimulus onset to a response. A response reading
/// earlier than onset yields zero instead of wrapping.
pub fn latency_between(onset_ns: u64, response_ns: u64) -> u64 {
    match response_ns.checked_sub(onset_ns) {
        Some(delta) => delta / 1_000_000,
        None => {
            tracing::warn!(onset_ns, response_ns, "clock anomaly, latency clamped to 0");
            0
        }
    }
}
