//! Cluster state — the normalized cross-node model built from one report tree.
//!
//! Every optional subtree is an explicit `Option` rather than a missing key,
//! so read sites get their documented defaults from the type. Numeric facts
//! that may be unknown default to -1.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Package versions compared across nodes by the version-drift rule.
pub const TRACKED_PACKAGES: &[&str] = &["corosync", "pacemaker", "resource-agents", "sbd"];

/// The full cluster model for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterState {
    /// Date line from description.txt.
    pub report_date: Option<String>,
    /// Author line from description.txt.
    pub report_by: Option<String>,
    /// False when no monitor snapshot was found anywhere in the tree, or the
    /// comparison summary was missing. Derived in-sync and membership facts
    /// are unreliable when false.
    pub data_complete: bool,
    pub nodes: BTreeMap<String, NodeFacts>,
    pub stonith: StonithState,
    /// Extracted diff artifacts keyed by comparison category.
    pub diffs: BTreeMap<String, DiffArtifact>,
    pub insync: SyncFlags,
    /// Node count reported by the monitor snapshot; -1 until seen.
    pub cnt_nodes_configured: i64,
    /// Number of nodes that had their own collected subdirectory.
    pub cnt_nodes_included: u32,
    /// Resource instance count from the monitor snapshot; -1 until seen.
    pub cnt_resources_configured: i64,
    pub has_quorum: bool,
    pub cluster_maintenance: bool,
    pub nodes_online: Vec<String>,
    pub nodes_offline: Vec<String>,
    pub nodes_standby: Vec<String>,
    pub nodes_maintenance: Vec<String>,
    pub nodes_pending: Vec<String>,
    pub nodes_unclean: Vec<String>,
    /// 1 = every audited node passed, 0 = at least one failed,
    /// -1 = indeterminate (included count disagrees with configured count).
    pub permissions_valid_all_nodes: i8,
    /// CIB configuration tree; attached here when cib.xml is in sync across
    /// nodes, otherwise attached per node instead.
    pub cib: Option<CibConfig>,
    /// Cluster-wide resource operation history; same in-sync rule as `cib`.
    pub resources: Option<BTreeMap<String, LrmResource>>,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            report_date: None,
            report_by: None,
            data_complete: true,
            nodes: BTreeMap::new(),
            stonith: StonithState::default(),
            diffs: BTreeMap::new(),
            insync: SyncFlags::default(),
            cnt_nodes_configured: -1,
            cnt_nodes_included: 0,
            cnt_resources_configured: -1,
            has_quorum: false,
            cluster_maintenance: false,
            nodes_online: Vec::new(),
            nodes_offline: Vec::new(),
            nodes_standby: Vec::new(),
            nodes_maintenance: Vec::new(),
            nodes_pending: Vec::new(),
            nodes_unclean: Vec::new(),
            permissions_valid_all_nodes: 1,
            cib: None,
            resources: None,
        }
    }
}

impl ClusterState {
    /// Fetch or lazily create the facts entry for a node name. Parsers only
    /// ever add fields to an existing entry, never replace it.
    pub fn node(&mut self, name: &str) -> &mut NodeFacts {
        self.nodes.entry(name.to_string()).or_default()
    }
}

/// Per-comparison-category in-sync flags from the cluster-wide summary.
/// All default to false until the summary proves otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncFlags {
    pub members_txt: bool,
    pub crm_mon_txt: bool,
    pub corosync_conf: bool,
    pub sysinfo_txt: bool,
    pub cib_xml: bool,
}

/// One extracted diff block from the comparison summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffArtifact {
    pub path: PathBuf,
    pub count: usize,
}

/// Facts gathered for one node name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFacts {
    /// True iff the node had its own collected subdirectory. Independent of
    /// `is_running`/`is_dc_local`, which come from sentinel files inside it.
    pub is_included: bool,
    pub is_running: bool,
    pub is_dc_local: bool,
    pub is_dc_crm: bool,
    pub is_standby: bool,
    pub is_maintenance: bool,
    pub is_unclean: bool,
    pub is_pending: bool,
    /// None until a permissions audit for the node has been seen.
    pub permissions_valid: Option<bool>,
    pub sysinfo: Option<SysInfo>,
    pub sysstats: Option<SysStats>,
    /// Per-node CIB configuration when cib.xml is out of sync.
    pub cib: Option<CibConfig>,
    /// Attributes of this node's node_state element.
    pub cib_state: BTreeMap<String, String>,
    /// Transient attribute sets keyed by set id.
    pub cib_node_attrs: BTreeMap<String, BTreeMap<String, String>>,
    /// Per-node resource operation history when cib.xml is out of sync.
    pub cib_resources: Option<BTreeMap<String, LrmResource>>,
}

/// Software and OS summary from the system-info artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysInfo {
    /// Component name -> dotted core version (release segments stripped).
    pub versions: BTreeMap<String, String>,
    pub platform: Option<String>,
    pub kernel: Option<String>,
    pub arch: Option<String>,
    pub distribution: Option<String>,
    pub os_version_major: Option<String>,
    pub os_version_minor: Option<String>,
}

/// Runtime statistics from the system-statistics artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysStats {
    /// Uptime in minutes; -1 unknown.
    pub uptime_minutes: i64,
    /// Run-queue load averages over 1, 5 and 15 minutes.
    pub load_average: Vec<f64>,
    pub cpu_count: u32,
    pub tasks: TaskCounts,
    pub cpu: CpuUsage,
    pub mem: MemUsage,
    pub swap: SwapUsage,
}

impl Default for SysStats {
    fn default() -> Self {
        Self {
            uptime_minutes: -1,
            load_average: Vec::new(),
            cpu_count: 0,
            tasks: TaskCounts::default(),
            cpu: CpuUsage::default(),
            mem: MemUsage::default(),
            swap: SwapUsage::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: i64,
    pub running: i64,
    pub sleeping: i64,
    pub stopped: i64,
    pub zombie: i64,
}

impl Default for TaskCounts {
    fn default() -> Self {
        Self { total: -1, running: -1, sleeping: -1, stopped: -1, zombie: -1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuUsage {
    pub user: f64,
    pub system: f64,
    pub nice: f64,
    pub idle: f64,
    pub wait: f64,
    pub hard_int: f64,
    pub soft_int: f64,
    pub steal_time: f64,
}

impl Default for CpuUsage {
    fn default() -> Self {
        Self {
            user: -1.0,
            system: -1.0,
            nice: -1.0,
            idle: -1.0,
            wait: -1.0,
            hard_int: -1.0,
            soft_int: -1.0,
            steal_time: -1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemUsage {
    pub total: i64,
    pub used: i64,
    pub avail: i64,
    pub avail_percent: i64,
}

impl Default for MemUsage {
    fn default() -> Self {
        Self { total: -1, used: -1, avail: -1, avail_percent: -1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapUsage {
    pub total: i64,
    pub used: i64,
}

impl Default for SwapUsage {
    fn default() -> Self {
        Self { total: -1, used: -1 }
    }
}

/// Fencing configuration detected from the monitor snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StonithState {
    pub enabled: bool,
    pub sbd: SbdState,
    /// Other fencing agent types seen in the snapshot, e.g. "external/ipmi".
    pub other_types: BTreeMap<String, bool>,
}

/// Storage-based-death (shared-storage watchdog) fencing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbdState {
    pub found: bool,
    /// 1 = every observed node's slots are clear, 0 = some slot is dirty,
    /// -1 = unknown (slot dump and config not both observed yet).
    pub all_clear: i8,
    pub nodes: BTreeMap<String, SbdNode>,
    /// Devices listed in SBD_DEVICE, split on ';'.
    pub devices: Vec<String>,
    /// Remaining key/value pairs from the SBD config file.
    pub config: BTreeMap<String, String>,
}

impl Default for SbdState {
    fn default() -> Self {
        Self {
            found: false,
            all_clear: -1,
            nodes: BTreeMap::new(),
            devices: Vec::new(),
            config: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbdNode {
    /// Raw token rows from the slot dump; one row per slot line.
    pub slots: Vec<Vec<String>>,
    /// True when every slot row carries a "clear" status.
    pub is_clear: bool,
}

// ── CIB (cluster information base) ─────────────────────────

/// Configuration subtree mirrored from cib.xml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CibConfig {
    /// Attributes of the document's cib element.
    pub attributes: BTreeMap<String, String>,
    /// Cluster property sets keyed by set id.
    pub cluster_properties: BTreeMap<String, BTreeMap<String, String>>,
    /// Configured node instance attributes keyed by uname.
    pub node_attributes: BTreeMap<String, BTreeMap<String, String>>,
    pub resources: CibResources,
    pub constraints: CibConstraints,
    /// Resource defaults keyed by meta-attribute set id.
    pub rsc_defaults: BTreeMap<String, BTreeMap<String, String>>,
    /// Operation defaults keyed by meta-attribute set id.
    pub op_defaults: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CibResources {
    pub primitives: BTreeMap<String, CibPrimitive>,
    pub groups: BTreeMap<String, CibGroup>,
    pub clones: BTreeMap<String, CibClone>,
    /// Multi-state (master/slave) resources.
    pub masters: BTreeMap<String, CibClone>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CibPrimitive {
    /// Element attributes other than the id: class, provider, type.
    pub attributes: BTreeMap<String, String>,
    /// Instance attribute name/value pairs.
    pub params: BTreeMap<String, String>,
    /// Operation metadata keyed by operation name.
    pub operations: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CibGroup {
    pub attributes: BTreeMap<String, String>,
    pub meta: BTreeMap<String, String>,
    pub primitives: BTreeMap<String, CibPrimitive>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CibClone {
    pub meta: BTreeMap<String, String>,
    pub primitives: BTreeMap<String, CibPrimitive>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CibConstraints {
    pub colocations: BTreeMap<String, BTreeMap<String, String>>,
}

/// One resource's local resource manager history from the CIB status section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LrmResource {
    pub class: String,
    pub rtype: String,
    pub operations: BTreeMap<String, LrmOp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LrmOp {
    pub on_node: String,
    pub rc_code: String,
}
