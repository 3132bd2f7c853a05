use metrics::counter;
use rate_limiter_shared::internal_event::InternalEvent;

use crate::Error;

#[derive(Debug)]
pub struct TickSkipped<'a> {
    pub app_name: &'a str,
}

impl InternalEvent for TickSkipped<'_> {
    fn emit(self) {
        info!(target: "ping_client::scheduler", app_name = self.app_name, "Request not sent as being rate limited");
        counter!("ping_tick_total", "outcome" => "skipped").increment(1);
    }
}

#[derive(Debug)]
pub struct TickDispatched<'a> {
    pub app_name: &'a str,
}

impl InternalEvent for TickDispatched<'_> {
    fn emit(self) {
        debug!(target: "ping_client::scheduler", app_name = self.app_name, "Quota granted, dispatching request");
        counter!("ping_tick_total", "outcome" => "dispatched").increment(1);
    }
}

#[derive(Debug)]
pub enum DispatchCompleted<'a> {
    Succeeded { body: &'a str },
    Throttled { body: &'a str },
    Failed { error: &'a Error },
}

impl InternalEvent for DispatchCompleted<'_> {
    fn emit(self) {
        match self {
            DispatchCompleted::Succeeded { body } => {
                info!(target: "ping_client::scheduler", response = body, "Request sent & Pong Respond");
                counter!("ping_dispatch_total", "outcome" => "succeeded").increment(1);
            }
            DispatchCompleted::Throttled { body } => {
                info!(target: "ping_client::scheduler", response = body, "Request send & Pong throttled it");
                counter!("ping_dispatch_total", "outcome" => "throttled").increment(1);
            }
            DispatchCompleted::Failed { error } => {
                error!(target: "ping_client::scheduler", %error, "Request failed");
                counter!("ping_dispatch_total", "outcome" => "failed").increment(1);
            }
        }
    }
}
