use metrics::counter;
use rate_limiter_shared::internal_event::InternalEvent;

/// One answered request on a throttled route.
#[derive(Debug)]
pub struct PermitServed<'a> {
    pub route: &'static str,
    pub app_name: &'a str,
    pub granted: bool,
}

impl InternalEvent for PermitServed<'_> {
    fn emit(self) {
        if self.granted {
            info!(
                target: "pong_server::app",
                route = self.route,
                app_name = self.app_name,
                "request successful"
            );
        } else {
            info!(
                target: "pong_server::app",
                route = self.route,
                app_name = self.app_name,
                "request failed"
            );
        }
        let outcome = if self.granted { "granted" } else { "throttled" };
        counter!("pong_permit_total", "route" => self.route, "outcome" => outcome).increment(1);
    }
}
