use compact_str::CompactString;

use crate::host::HostApi;

/// Point-in-time capacity snapshot of one compute node.
///
/// RAM is tracked in GB-hundredths. A node's reservation is subtracted
/// additively from its total before any allocation decision; nodes with a
/// nonzero reservation form the reserved class and only participate when the
/// caller opts in.
#[derive(Clone, Debug)]
pub struct Node {
    hostname: CompactString,
    max_ram: u64,
    used_ram: u64,
    reserved_ram: u64,
}

impl Node {
    pub fn new(
        hostname: impl Into<CompactString>,
        max_ram: u64,
        used_ram: u64,
        reserved_ram: u64,
    ) -> Node {
        Node {
            hostname: hostname.into(),
            max_ram,
            used_ram,
            reserved_ram,
        }
    }

    pub fn query<H: HostApi>(
        host: &H,
        hostname: &str,
    ) -> Node {
        Node {
            hostname: CompactString::from(hostname),
            max_ram: host.max_ram_hundredths(hostname),
            used_ram: host.used_ram_hundredths(hostname),
            reserved_ram: host.reserved_ram_hundredths(hostname),
        }
    }

    pub fn get_hostname(&self) -> &str {
        &*self.hostname
    }

    pub fn get_max_ram_hundredths(&self) -> u64 {
        self.max_ram
    }

    pub fn get_used_ram_hundredths(&self) -> u64 {
        self.used_ram
    }

    pub fn get_reserved_ram_hundredths(&self) -> u64 {
        self.reserved_ram
    }

    pub fn get_free_ram_hundredths(&self) -> u64 {
        self.max_ram
            .saturating_sub(self.used_ram)
            .saturating_sub(self.reserved_ram)
    }

    pub fn is_reserved_class(&self) -> bool {
        0 < self.reserved_ram
    }
}

/// Re-queries the node pool. Capacity values are always refreshed this way
/// before a planning pass rather than trusted from a prior shadow map.
pub fn deployable_nodes<H: HostApi>(
    host: &H,
    include_reserved: bool,
) -> Vec<Node> {
    host.node_names()
        .into_iter()
        .map(|name| Node::query(host, &name))
        .filter(|node| include_reserved || !node.is_reserved_class())
        .filter(|node| 0 < node.get_max_ram_hundredths())
        .collect()
}

/// A resource-bearing machine under attack. All of its state evolves in the
/// host environment; the scheduler only reads it.
#[derive(Clone, Debug)]
pub struct Target {
    hostname: CompactString,
}

impl Target {
    pub fn new(hostname: impl Into<CompactString>) -> Target {
        Target {
            hostname: hostname.into(),
        }
    }

    pub fn get_hostname(&self) -> &str {
        &*self.hostname
    }

    pub fn get_security_level<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.security_level(self.get_hostname())
    }

    pub fn get_min_security<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.min_security_level(self.get_hostname())
    }

    pub fn get_security_gap<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        (self.get_security_level(host) - self.get_min_security(host)).max(0.)
    }

    pub fn get_money_available<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.money_available(self.get_hostname())
    }

    pub fn get_max_money<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.max_money(self.get_hostname())
    }

    pub fn get_hack_time<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.hack_time(self.get_hostname())
    }

    pub fn get_grow_time<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.grow_time(self.get_hostname())
    }

    pub fn get_weaken_time<H: HostApi>(
        &self,
        host: &H,
    ) -> f64 {
        host.weaken_time(self.get_hostname())
    }
}
