// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The crossbar scheduler of one router output port.
//!
//! The scheduler owns the credits of the VCs of its output link. Input
//! ports send it requests for packets; it arbitrates between them and
//! grants one flit at a time. When is decided by a [`Clocking`] strategy
//! and which VC by a [`Select`](selection::Select) strategy. Granted flits
//! cross the router and are transmitted on the output link.

use std::rc::Rc;

use noc_config::RouterConfig;
use noc_engine::engine::Context;
use noc_engine::sim_error;
use noc_engine::time::simtime::SimTime;
use noc_engine::types::{SimError, SimResult};
use noc_track::entity::Entity;
use noc_track::{debug, info, trace};

use crate::stats::Accumulator;
use crate::types::{Ack, Credit, Flit, Internal, NocMsg, Request};
use crate::vc_alloc::VcSnapshot;

pub mod arbiter;
pub mod clocking;
pub mod requests;
pub mod selection;

use arbiter::VcArbiter;
use clocking::{Clocking, create_clocking};
use selection::create_select;

#[derive(Clone, Debug, Default)]
pub struct SchedulerStats {
    /// Flits transmitted after the statistics start.
    pub sends: u64,

    /// Time the output link spent transmitting after the statistics start.
    pub busy_time: SimTime,

    /// Number of used VCs, sampled when each request arrives.
    pub used_vcs: Accumulator,

    pub grants: u64,
    pub nacks: u64,
}

pub struct Scheduler {
    pub entity: Rc<Entity>,
    port: usize,
    config: RouterConfig,
    arbiter: VcArbiter,
    clocking: Option<Box<dyn Clocking>>,
    stat_start: SimTime,
    stats: SchedulerStats,
    utilization: f64,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        port: usize,
        num_in_ports: usize,
        config: &RouterConfig,
    ) -> Self {
        let entity = Rc::new(Entity::new(parent, &format!("out{port}")));
        let arbiter = VcArbiter::new(
            config.num_vcs,
            num_in_ports,
            config.request_queue(),
            create_select(config.arbitration),
        );
        Self {
            entity,
            port,
            config: config.clone(),
            arbiter,
            clocking: None,
            stat_start: SimTime::from_ns(config.stat_start_ns),
            stats: SchedulerStats::default(),
            utilization: -1.0,
        }
    }

    fn located(&self, err: SimError) -> SimError {
        SimError(format!("{}: {}", self.entity, err.0))
    }

    /// Start the clock of a connected output port.
    pub fn initialize(&mut self, ctx: &mut Context<NocMsg>) -> SimResult {
        if !ctx.is_connected(self.port) {
            debug!(self.entity ; "not connected");
            return Ok(());
        }
        let mut clocking = create_clocking(&self.config, ctx.datarate_bps(self.port))
            .map_err(|e| self.located(e))?;
        debug!(self.entity ; "{} scheduler, {}, {:?} requests",
            clocking.name(), self.arbiter.policy(), self.config.request_queue());
        if let Some(at) = clocking.start(ctx.now()) {
            ctx.schedule_self(at, NocMsg::Timer(self.port))?;
        }
        self.clocking = Some(clocking);
        Ok(())
    }

    pub fn handle_request(
        &mut self,
        ctx: &mut Context<NocMsg>,
        in_port: usize,
        request: Request,
    ) -> SimResult {
        if self.clocking.is_none() {
            return sim_error!(format!(
                "{}: {request} from input port {in_port} to an unconnected output",
                self.entity
            ));
        }
        if ctx.now() >= self.stat_start {
            self.stats.used_vcs.add(self.arbiter.num_used_vcs() as f64);
        }
        trace!(self.entity ; "{request} from ip:{in_port}");
        self.arbiter
            .add_request(in_port, request)
            .map_err(|e| self.located(e))?;
        self.after_event(ctx)
    }

    pub fn handle_ack(&mut self, ctx: &mut Context<NocMsg>, in_port: usize, ack: Ack) -> SimResult {
        if ack.ok {
            self.arbiter.ack_ok(&ack).map_err(|e| self.located(e))?;
        } else {
            trace!(self.entity ; "nack from ip:{in_port} ivc:{} ovc:{}", ack.input_vc, ack.output_vc);
            self.arbiter
                .nack(in_port, &ack)
                .map_err(|e| self.located(e))?;
            self.stats.nacks += 1;
            if let Some(clocking) = self.clocking.as_mut() {
                clocking.on_nack();
            }
        }
        self.after_event(ctx)
    }

    pub fn handle_credit(&mut self, ctx: &mut Context<NocMsg>, credit: Credit) -> SimResult {
        self.arbiter
            .add_credits(credit.vc, credit.count)
            .map_err(|e| self.located(e))?;
        self.after_event(ctx)
    }

    /// A granted flit has crossed the router: send it on the output link.
    pub fn handle_traverse(&mut self, ctx: &mut Context<NocMsg>, flit: Flit) -> SimResult {
        self.arbiter
            .flit_passed(&flit)
            .map_err(|e| self.located(e))?;

        let now = ctx.now();
        trace!(self.entity ; "send {flit}");
        ctx.send(self.port, NocMsg::Flit(flit))?;
        let finish = ctx
            .transmission_finish_time(self.port)
            .map_or(now, |t| t.max(now));
        if now >= self.stat_start {
            self.stats.sends += 1;
            self.stats.busy_time += finish.saturating_sub(now);
        }

        if let Some(at) = self.clocking.as_mut().and_then(|c| c.on_send(finish)) {
            ctx.schedule_self(at, NocMsg::Timer(self.port))?;
        }
        self.reschedule(ctx)
    }

    pub fn handle_tick(&mut self, ctx: &mut Context<NocMsg>) -> SimResult {
        let has_work = self.arbiter.has_work();
        let link_busy = ctx.is_busy(self.port);
        let Some(clocking) = self.clocking.as_mut() else {
            return sim_error!(format!("{}: timer without a clock", self.entity));
        };
        let tick = clocking.on_tick(ctx.now(), has_work, link_busy);
        if let Some(next) = tick.next {
            ctx.schedule_self(next, NocMsg::Timer(self.port))?;
        }
        if tick.arbitrate {
            self.arbitrate(ctx);
        }
        self.reschedule(ctx)
    }

    fn after_event(&mut self, ctx: &mut Context<NocMsg>) -> SimResult {
        let link_busy = ctx.is_busy(self.port);
        if self
            .clocking
            .as_mut()
            .is_some_and(|clocking| clocking.on_event(link_busy))
        {
            self.arbitrate(ctx);
        }
        self.reschedule(ctx)
    }

    fn arbitrate(&mut self, ctx: &mut Context<NocMsg>) {
        let Some((in_port, grant)) = self.arbiter.arbitrate() else {
            return;
        };
        if let Some(clocking) = self.clocking.as_mut() {
            clocking.on_grant();
        }
        self.stats.grants += 1;
        trace!(self.entity ; "grant ivc:{} ovc:{} to ip:{in_port}", grant.input_vc, grant.output_vc);
        ctx.send_self(NocMsg::Internal(Internal::Grant {
            out_port: self.port,
            in_port,
            grant,
        }));
    }

    fn reschedule(&mut self, ctx: &mut Context<NocMsg>) -> SimResult {
        let has_work = self.arbiter.has_work();
        if let Some(at) = self
            .clocking
            .as_mut()
            .and_then(|clocking| clocking.reschedule(ctx.now(), has_work))
        {
            trace!(self.entity ; "restart clock at {at}");
            ctx.schedule_self(at, NocMsg::Timer(self.port))?;
        }
        Ok(())
    }

    /// Account for a packet allocated to one of the output VCs.
    pub fn reserve_vc(&mut self, vc: usize) -> SimResult {
        self.arbiter.reserve_vc(vc).map_err(|e| self.located(e))
    }

    /// Compute the link utilisation at the end of the run.
    pub fn finish(&mut self, end: SimTime) {
        self.utilization = match self.clocking.as_ref() {
            Some(clocking) if end > self.stat_start => {
                let elapsed = end - self.stat_start;
                match clocking.period() {
                    Some(period) => {
                        let cycles = (elapsed.as_ps() as f64 / period.as_ps() as f64).round();
                        if cycles > 0.0 {
                            100.0 * self.stats.sends as f64 / cycles
                        } else {
                            -1.0
                        }
                    }
                    None => 100.0 * self.stats.busy_time.as_ps() as f64 / elapsed.as_ps() as f64,
                }
            }
            _ => -1.0,
        };
        if self.clocking.is_some() {
            info!(self.entity ; "utilization {:.2}%, {} flits sent, used VCs {}",
                self.utilization, self.stats.sends, self.stats.used_vcs);
        }
    }

    /// Link utilisation in percent, `-1` if the port was not connected or
    /// the run ended before statistics started.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        self.utilization
    }

    #[must_use]
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    #[must_use]
    pub fn arbiter(&self) -> &VcArbiter {
        &self.arbiter
    }
}

impl VcSnapshot for Scheduler {
    fn num_vcs(&self) -> usize {
        self.arbiter.num_vcs()
    }

    fn credits_for(&self, vc: usize) -> u32 {
        self.arbiter.credits_for(vc)
    }

    fn usage_for(&self, vc: usize) -> u32 {
        self.arbiter.usage_for(vc)
    }
}
