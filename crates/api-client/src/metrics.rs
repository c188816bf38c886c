//! Client metrics
//!
//! - `api_requests_total` (counter): label `status` (HTTP status, `timeout` or `transport`)
//! - `api_refresh_exchanges_total` (counter): label `outcome`
//! - `api_refresh_waiters_total` (counter): requests queued behind a refresh
//! - `api_policy_rejections_total` (counter): requests stopped by the interceptor chain
//!
//! Without an installed recorder every call is a no-op.

pub fn record_request(status: &str) {
    metrics::counter!("api_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("api_refresh_exchanges_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh_waiter() {
    metrics::counter!("api_refresh_waiters_total").increment(1);
}

pub fn record_policy_rejection() {
    metrics::counter!("api_policy_rejections_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("200");
        record_request("timeout");
        record_refresh("success");
        record_refresh_waiter();
        record_policy_rejection();
    }
}
