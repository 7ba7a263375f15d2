use std::{
    cell::{
        Cell,
        RefCell,
    },
    collections::HashSet,
};

use compact_str::CompactString;

use crate::host::{
    HostApi,
    ProcessId,
    Stage,
};

// the linear effect model shared by every test:
// - one weaken thread lowers security by 0.05
// - one hack thread steals 1% of max money and adds 0.002 security
// - twenty grow threads double available money; each adds 0.004 security
// - grow takes 3.2x hack time, weaken takes 4x
const WEAKEN_PER_THREAD: f64 = 0.05;
const HACK_SECURITY_PER_THREAD: f64 = 0.002;
const GROW_SECURITY_PER_THREAD: f64 = 0.004;
const HACK_MONEY_FRACTION: f64 = 0.01;
const GROW_THREADS_PER_DOUBLING: f64 = 20.;

const HACK_RAM: u64 = 160;
const GROW_RAM: u64 = 175;
const WEAKEN_RAM: u64 = 175;

#[derive(Clone, Debug)]
struct NodeState {
    name: CompactString,
    max_ram: u64,
    used_ram: u64,
    reserved_ram: u64,
}

#[derive(Clone, Debug)]
struct TargetState {
    name: CompactString,
    security: f64,
    min_security: f64,
    money: f64,
    max_money: f64,
    hack_time: f64,
}

#[derive(Clone, Debug)]
pub struct LaunchRecord {
    pub pid: ProcessId,
    pub stage: Stage,
    pub node: CompactString,
    pub threads: usize,
    pub target: CompactString,
    pub offset: f64,
    settled: bool,
    killed: bool,
}

/// Deterministic in-memory host environment.
///
/// Launches, kills and sleeps are recorded in ledgers the tests inspect.
/// Optionally the mock charges node RAM on launch and, on the next sleep,
/// settles every in-flight task: its stage effect is applied to the target
/// and its RAM is released, letting multi-pass controller tests observe the
/// target converging.
pub struct MockHost {
    nodes: RefCell<Vec<NodeState>>,
    targets: RefCell<Vec<TargetState>>,
    pub launched: RefCell<Vec<LaunchRecord>>,
    pub killed: RefCell<Vec<ProcessId>>,
    pub sleeps: RefCell<Vec<f64>>,
    pub log: RefCell<Vec<String>>,
    pub terminal: RefCell<Vec<String>>,
    fail_nodes: RefCell<HashSet<CompactString>>,
    consume_ram: Cell<bool>,
    settle_on_sleep: Cell<bool>,
    next_pid: Cell<ProcessId>,
}

impl MockHost {
    pub fn new() -> MockHost {
        MockHost {
            nodes: RefCell::new(Vec::new()),
            targets: RefCell::new(Vec::new()),
            launched: RefCell::new(Vec::new()),
            killed: RefCell::new(Vec::new()),
            sleeps: RefCell::new(Vec::new()),
            log: RefCell::new(Vec::new()),
            terminal: RefCell::new(Vec::new()),
            fail_nodes: RefCell::new(HashSet::new()),
            consume_ram: Cell::new(false),
            settle_on_sleep: Cell::new(false),
            next_pid: Cell::new(1),
        }
    }

    pub fn add_node(
        &self,
        name: &str,
        max_ram: u64,
        used_ram: u64,
        reserved_ram: u64,
    ) {
        self.nodes.borrow_mut().push(NodeState {
            name: CompactString::from(name),
            max_ram,
            used_ram,
            reserved_ram,
        });
    }

    pub fn add_target(
        &self,
        name: &str,
        security: f64,
        min_security: f64,
        money: f64,
        max_money: f64,
        hack_time: f64,
    ) {
        self.targets.borrow_mut().push(TargetState {
            name: CompactString::from(name),
            security,
            min_security,
            money,
            max_money,
            hack_time,
        });
    }

    /// Every launch attempt on this node reports no process.
    pub fn fail_launches_on(
        &self,
        node: &str,
    ) {
        self.fail_nodes
            .borrow_mut()
            .insert(CompactString::from(node));
    }

    /// Charge node RAM on launch and release it when the task settles or is
    /// killed.
    pub fn consume_ram_on_launch(&self) {
        self.consume_ram.set(true);
    }

    /// Apply the stage effects of every in-flight task at the next sleep.
    pub fn settle_on_sleep(&self) {
        self.settle_on_sleep.set(true);
    }

    pub fn running_pids(&self) -> Vec<ProcessId> {
        self.launched
            .borrow()
            .iter()
            .filter(|record| !record.settled && !record.killed)
            .map(|record| record.pid)
            .collect()
    }

    fn release_ram(
        &self,
        record: &LaunchRecord,
    ) {
        if !self.consume_ram.get() {
            return;
        }

        let mut nodes = self.nodes.borrow_mut();
        let node = nodes
            .iter_mut()
            .find(|node| node.name == record.node)
            .expect("launch recorded on unknown node");
        node.used_ram -= record.threads as u64 * stage_ram(record.stage);
    }

    fn settle_all(&self) {
        let mut launched = self.launched.borrow_mut();

        for record in launched.iter_mut() {
            if record.settled || record.killed {
                continue;
            }
            record.settled = true;

            {
                let mut targets = self.targets.borrow_mut();
                let target = targets
                    .iter_mut()
                    .find(|target| target.name == record.target)
                    .expect("launch recorded against unknown target");

                let threads = record.threads as f64;
                match record.stage {
                    Stage::Weaken => {
                        target.security = (target.security
                            - WEAKEN_PER_THREAD * threads)
                            .max(target.min_security);
                    },
                    Stage::Hack => {
                        target.money = (target.money
                            - HACK_MONEY_FRACTION * target.max_money * threads)
                            .max(0.);
                        target.security += HACK_SECURITY_PER_THREAD * threads;
                    },
                    Stage::Grow => {
                        target.money = (target.money
                            * (1. + threads / GROW_THREADS_PER_DOUBLING))
                            .min(target.max_money);
                        target.security += GROW_SECURITY_PER_THREAD * threads;
                    },
                }
            }

            self.release_ram(record);
        }
    }

    fn with_target<T>(
        &self,
        hostname: &str,
        read: impl FnOnce(&TargetState) -> T,
    ) -> T {
        let targets = self.targets.borrow();
        let target = targets
            .iter()
            .find(|target| target.name == hostname)
            .expect("query against unknown target");
        read(target)
    }

    fn with_node<T>(
        &self,
        hostname: &str,
        read: impl FnOnce(&NodeState) -> T,
    ) -> T {
        let nodes = self.nodes.borrow();
        let node = nodes
            .iter()
            .find(|node| node.name == hostname)
            .expect("query against unknown node");
        read(node)
    }
}

fn stage_ram(stage: Stage) -> u64 {
    use Stage::*;

    match stage {
        Hack => HACK_RAM,
        Grow => GROW_RAM,
        Weaken => WEAKEN_RAM,
    }
}

impl HostApi for MockHost {
    fn print(
        &self,
        text: &str,
    ) {
        self.log.borrow_mut().push(text.to_owned());
    }

    fn tprint(
        &self,
        text: &str,
    ) {
        self.terminal.borrow_mut().push(text.to_owned());
    }

    fn sleep(
        &self,
        millis: f64,
    ) {
        self.sleeps.borrow_mut().push(millis);

        if self.settle_on_sleep.get() {
            self.settle_all();
        }
    }

    fn server_exists(
        &self,
        hostname: &str,
    ) -> bool {
        self.nodes.borrow().iter().any(|node| node.name == hostname)
            || self
                .targets
                .borrow()
                .iter()
                .any(|target| target.name == hostname)
    }

    fn node_names(&self) -> Vec<CompactString> {
        self.nodes
            .borrow()
            .iter()
            .map(|node| node.name.clone())
            .collect()
    }

    fn target_names(&self) -> Vec<CompactString> {
        self.targets
            .borrow()
            .iter()
            .map(|target| target.name.clone())
            .collect()
    }

    fn max_ram_hundredths(
        &self,
        hostname: &str,
    ) -> u64 {
        self.with_node(hostname, |node| node.max_ram)
    }

    fn used_ram_hundredths(
        &self,
        hostname: &str,
    ) -> u64 {
        self.with_node(hostname, |node| node.used_ram)
    }

    fn reserved_ram_hundredths(
        &self,
        hostname: &str,
    ) -> u64 {
        self.with_node(hostname, |node| node.reserved_ram)
    }

    fn script_ram_hundredths(
        &self,
        stage: Stage,
    ) -> u64 {
        stage_ram(stage)
    }

    fn security_level(
        &self,
        hostname: &str,
    ) -> f64 {
        self.with_target(hostname, |target| target.security)
    }

    fn min_security_level(
        &self,
        hostname: &str,
    ) -> f64 {
        self.with_target(hostname, |target| target.min_security)
    }

    fn money_available(
        &self,
        hostname: &str,
    ) -> f64 {
        self.with_target(hostname, |target| target.money)
    }

    fn max_money(
        &self,
        hostname: &str,
    ) -> f64 {
        self.with_target(hostname, |target| target.max_money)
    }

    fn hack_time(
        &self,
        hostname: &str,
    ) -> f64 {
        self.with_target(hostname, |target| target.hack_time)
    }

    fn grow_time(
        &self,
        hostname: &str,
    ) -> f64 {
        self.hack_time(hostname) * 3.2
    }

    fn weaken_time(
        &self,
        hostname: &str,
    ) -> f64 {
        self.hack_time(hostname) * 4.
    }

    fn weaken_effect(
        &self,
        threads: f64,
    ) -> f64 {
        threads * WEAKEN_PER_THREAD
    }

    fn hack_security_effect(
        &self,
        threads: usize,
        _hostname: &str,
    ) -> f64 {
        threads as f64 * HACK_SECURITY_PER_THREAD
    }

    fn grow_security_effect(
        &self,
        threads: usize,
        _hostname: &str,
    ) -> f64 {
        threads as f64 * GROW_SECURITY_PER_THREAD
    }

    fn hack_chance(
        &self,
        _hostname: &str,
    ) -> f64 {
        1.
    }

    fn hack_threads_for_amount(
        &self,
        hostname: &str,
        amount: f64,
    ) -> f64 {
        let max_money = self.max_money(hostname);
        amount / (HACK_MONEY_FRACTION * max_money)
    }

    fn grow_threads_for_multiplier(
        &self,
        _hostname: &str,
        multiplier: f64,
    ) -> f64 {
        (multiplier - 1.).max(0.) * GROW_THREADS_PER_DOUBLING
    }

    fn launch(
        &self,
        stage: Stage,
        node: &str,
        threads: usize,
        target: &str,
        offset_millis: f64,
    ) -> Option<ProcessId> {
        if self.fail_nodes.borrow().contains(node) {
            return None;
        }

        if self.consume_ram.get() {
            let mut nodes = self.nodes.borrow_mut();
            let node = nodes
                .iter_mut()
                .find(|n| n.name == node)
                .expect("launch on unknown node");
            node.used_ram += threads as u64 * stage_ram(stage);
        }

        let pid = self.next_pid.get();
        self.next_pid.set(pid + 1);

        self.launched.borrow_mut().push(LaunchRecord {
            pid,
            stage,
            node: CompactString::from(node),
            threads,
            target: CompactString::from(target),
            offset: offset_millis,
            settled: false,
            killed: false,
        });

        Some(pid)
    }

    fn kill(
        &self,
        pid: ProcessId,
    ) -> bool {
        let record = {
            let mut launched = self.launched.borrow_mut();

            match launched
                .iter_mut()
                .find(|r| r.pid == pid && !r.killed && !r.settled)
            {
                Some(record) => {
                    record.killed = true;
                    record.clone()
                },
                None => return false,
            }
        };

        self.killed.borrow_mut().push(pid);
        self.release_ram(&record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_settles_effects_and_releases_ram() {
        let host = MockHost::new();
        host.add_node("worker", 6400, 0, 0);
        host.add_target("cash", 6., 5., 50., 100., 1000.);
        host.consume_ram_on_launch();
        host.settle_on_sleep();

        host.launch(Stage::Weaken, "worker", 10, "cash", 0.);
        host.launch(Stage::Grow, "worker", 20, "cash", 0.);
        assert_eq!(host.used_ram_hundredths("worker"), 30 * 175);

        host.sleep(100.);

        // weaken clamps at min security, then grow doubles money and raises
        // security by 0.08
        assert_eq!(host.security_level("cash"), 5. + 20. * 0.004);
        assert_eq!(host.money_available("cash"), 100.);
        assert_eq!(host.used_ram_hundredths("worker"), 0);
        assert!(host.running_pids().is_empty());
    }

    #[test]
    fn killed_tasks_never_settle() {
        let host = MockHost::new();
        host.add_node("worker", 6400, 0, 0);
        host.add_target("cash", 6., 5., 50., 100., 1000.);
        host.settle_on_sleep();

        let pid = host.launch(Stage::Weaken, "worker", 10, "cash", 0.).unwrap();
        assert!(host.kill(pid));
        assert!(!host.kill(pid));

        host.sleep(100.);
        assert_eq!(host.security_level("cash"), 6.);
    }
}
