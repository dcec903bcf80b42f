//! Built-in scenarios for manual inspection, grounded line-for-line in
//! `examples/original_source/testcases/fixed.py`'s `case_simple_swap`,
//! `case_swap_with_one_temp`, `case_simple_cessation`, `case_tricky`,
//! `case_simple_deadlock`, and `case_chain6`. Random scenario generation
//! (`testcases/random.py` there) is out of scope here; these fixed cases
//! are what a reader can use to sanity-check the planner by hand.

use std::collections::HashMap;

use vmpool_core::{new_guest, new_host, reset_registries, Snapshot};

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub build: fn() -> (Snapshot, Snapshot),
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "simple-swap",
        description: "two guests on two full-size hosts trade places directly",
        build: simple_swap,
    },
    Scenario {
        name: "swap-with-temp",
        description: "a spare third host is needed to stage one guest during the swap",
        build: swap_with_one_temp,
    },
    Scenario {
        name: "cessation",
        description: "one guest shuts down while another relocates to a third host",
        build: simple_cessation,
    },
    Scenario {
        name: "tricky",
        description: "an i386-only host constrains which guest may be staged there",
        build: tricky,
    },
    Scenario {
        name: "deadlock",
        description: "two hosts, no spare capacity anywhere: no plan exists",
        build: simple_deadlock,
    },
    Scenario {
        name: "chain6",
        description: "six hosts rotate their small guests and provision a new tiny one",
        build: chain6,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

fn placement(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (guest, host) in pairs {
        map.entry(host.to_string()).or_default().push(guest.to_string());
    }
    map
}

fn simple_swap() -> (Snapshot, Snapshot) {
    reset_registries();
    new_host("host1", "x86_64", 4096, None).unwrap();
    new_host("host2", "x86_64", 4096, None).unwrap();
    new_guest("vm1", "x86_64", 256).unwrap();
    new_guest("vm2", "x86_64", 256).unwrap();

    let initial = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
    let final_state =
        Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
    (initial, final_state)
}

fn swap_with_one_temp() -> (Snapshot, Snapshot) {
    reset_registries();
    new_host("host1", "x86_64", 4096, None).unwrap();
    new_host("host2", "x86_64", 4096, None).unwrap();
    new_host("host3", "x86_64", 4096, None).unwrap();
    new_guest("vm1", "x86_64", 3256).unwrap();
    new_guest("vm2", "x86_64", 3256).unwrap();

    let initial = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
    let final_state =
        Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
    (initial, final_state)
}

fn simple_cessation() -> (Snapshot, Snapshot) {
    reset_registries();
    new_host("host1", "x86_64", 4096, None).unwrap();
    new_host("host2", "x86_64", 4096, None).unwrap();
    new_host("host3", "x86_64", 4096, None).unwrap();
    new_guest("vm1", "x86_64", 256).unwrap();
    new_guest("vm2", "x86_64", 256).unwrap();

    let initial = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
    let final_state = Snapshot::from_placement(placement(&[("vm1", "host3")])).unwrap();
    (initial, final_state)
}

fn tricky() -> (Snapshot, Snapshot) {
    reset_registries();
    new_host("host1", "x86_64", 2256, None).unwrap();
    new_host("host2", "x86_64", 2256, None).unwrap();
    new_host("host3", "i386", 2256, None).unwrap();
    new_guest("vm1", "x86_64", 1000).unwrap();
    new_guest("vm2", "x86_64", 1000).unwrap();
    new_guest("vm3", "x86_64", 900).unwrap();
    new_guest("vm4", "i386", 900).unwrap();
    new_guest("vm5", "i386", 150).unwrap();
    new_guest("vm6", "i386", 150).unwrap();

    let initial = Snapshot::from_placement(placement(&[
        ("vm1", "host1"),
        ("vm3", "host1"),
        ("vm2", "host2"),
        ("vm4", "host2"),
        ("vm5", "host3"),
        ("vm6", "host3"),
    ]))
    .unwrap();
    let final_state = Snapshot::from_placement(placement(&[
        ("vm1", "host1"),
        ("vm2", "host1"),
        ("vm3", "host2"),
        ("vm4", "host2"),
        ("vm5", "host2"),
    ]))
    .unwrap();
    (initial, final_state)
}

fn simple_deadlock() -> (Snapshot, Snapshot) {
    reset_registries();
    new_host("host1", "x86_64", 4096, None).unwrap();
    new_host("host2", "x86_64", 4096, None).unwrap();
    new_guest("vm1", "x86_64", 3256).unwrap();
    new_guest("vm2", "x86_64", 3256).unwrap();

    let initial = Snapshot::from_placement(placement(&[("vm1", "host1"), ("vm2", "host2")])).unwrap();
    let final_state =
        Snapshot::from_placement(placement(&[("vm1", "host2"), ("vm2", "host1")])).unwrap();
    (initial, final_state)
}

fn chain6() -> (Snapshot, Snapshot) {
    reset_registries();
    for i in 1..=7 {
        new_host(format!("host{i}"), "x86_64", 1256, None).unwrap();
    }
    let bigs = [500, 510, 520, 530, 540, 550];
    let smalls = [350, 360, 370, 380, 390, 400];
    for (i, ram) in bigs.iter().enumerate() {
        new_guest(format!("big{}", i + 1), "x86_64", *ram).unwrap();
    }
    for (i, ram) in smalls.iter().enumerate() {
        new_guest(format!("small{}", i + 1), "x86_64", *ram).unwrap();
    }
    for i in 1..=5 {
        new_guest(format!("tiny{i}"), "x86_64", 100).unwrap();
    }

    let mut initial_pairs: Vec<(String, String)> = Vec::new();
    for i in 1..=6 {
        initial_pairs.push((format!("big{i}"), format!("host{i}")));
        initial_pairs.push((format!("small{i}"), format!("host{i}")));
    }
    for i in 1..=4 {
        initial_pairs.push((format!("tiny{i}"), "host7".to_string()));
    }
    let initial_refs: Vec<(&str, &str)> =
        initial_pairs.iter().map(|(g, h)| (g.as_str(), h.as_str())).collect();
    let initial = Snapshot::from_placement(placement(&initial_refs)).unwrap();

    let final_pairs: Vec<(&str, &str)> = vec![
        ("big1", "host1"),
        ("small6", "host1"),
        ("tiny1", "host1"),
        ("big2", "host2"),
        ("small5", "host2"),
        ("tiny2", "host2"),
        ("big3", "host3"),
        ("small4", "host3"),
        ("tiny3", "host3"),
        ("big4", "host4"),
        ("small3", "host4"),
        ("tiny4", "host4"),
        ("big5", "host5"),
        ("small2", "host5"),
        ("tiny5", "host5"),
    ];
    let mut final_state = Snapshot::from_placement(placement(&final_pairs)).unwrap();
    final_state.init_host("host6");
    final_state.init_host("host7");
    (initial, final_state)
}
